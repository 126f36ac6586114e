/*
    Aero Mission, aircraft mission phase assembly
    Copyright (C) 2026 The aero-mission developers

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Mission descriptions are parameterized by the aircraft inputs first, then turned into phases.
//!
//! The two stages never interleave: every phase description is final before the first phase is
//! built.

use super::{
    GuessParameterizationSnafu, GuessUnitsSnafu, ParameterizationSnafu, Trajectory,
    TrajectoryBuilderSnafu, TrajectoryError, TrajectoryRegistrySnafu,
};
use crate::io::{MissionInfo, PhaseInfo};
use crate::md::builder::{phase_info_to_builder, BuilderContext, PhaseBuilder};
use crate::md::guesses::InitialGuess;
use crate::options::{AircraftValues, UserOption, DEFAULT_META_DATA};
use crate::units::convert;
use crate::variables::{dynamic, mission};
use snafu::prelude::*;

/// A mission description which has not been parameterized yet.
#[derive(Clone, Debug)]
pub struct MissionBuilder {
    info: MissionInfo,
}

impl MissionBuilder {
    pub fn new(info: MissionInfo) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &MissionInfo {
        &self.info
    }

    /// Lets `f` rewrite the mission description from the aircraft inputs.
    pub fn parameterize<F>(
        mut self,
        f: F,
        values: &AircraftValues,
    ) -> Result<ParameterizedMission, TrajectoryError>
    where
        F: FnOnce(&mut MissionInfo, &AircraftValues) -> Result<(), TrajectoryError>,
    {
        f(&mut self.info, values)?;
        Ok(ParameterizedMission { info: self.info })
    }

    /// Uses the mission description as is.
    pub fn skip_parameterization(self) -> ParameterizedMission {
        ParameterizedMission { info: self.info }
    }
}

/// A mission description ready to be built.
#[derive(Clone, Debug)]
pub struct ParameterizedMission {
    info: MissionInfo,
}

impl ParameterizedMission {
    pub fn info(&self) -> &MissionInfo {
        &self.info
    }

    pub fn into_info(self) -> MissionInfo {
        self.info
    }

    /// One builder per phase, in flight order.
    pub fn builders(&self, context: &BuilderContext) -> Result<Vec<PhaseBuilder>, TrajectoryError> {
        self.info
            .iter()
            .map(|(name, info)| {
                phase_info_to_builder(name, info, context).context(TrajectoryRegistrySnafu)
            })
            .collect()
    }

    /// Builds every phase and links consecutive phases on the variables their kinds share.
    pub fn build_trajectory(
        &self,
        name: &str,
        values: &AircraftValues,
        context: &BuilderContext,
    ) -> Result<(Trajectory, Vec<PhaseBuilder>), TrajectoryError> {
        let builders = self.builders(context)?;
        let mut traj = Trajectory::new(name);
        for builder in &builders {
            let phase = builder
                .build_phase_in(name, values)
                .context(TrajectoryBuilderSnafu)?;
            traj.add_phase(phase)?;
        }
        traj.link_mission_phases(&builders)?;
        info!(
            "{name}: {} phases, {} linkages",
            traj.phases().len(),
            traj.linkages().len()
        );
        Ok((traj, builders))
    }
}

/// The design input in `units`, or `None` when the aircraft keeps its default value.
fn design_value(
    values: &AircraftValues,
    name: &str,
    units: &str,
) -> Result<Option<f64>, TrajectoryError> {
    let value = values
        .get_f64_or_default(name, units, &DEFAULT_META_DATA)
        .context(ParameterizationSnafu)?;
    let default = DEFAULT_META_DATA
        .default_f64(name, units)
        .context(ParameterizationSnafu)?;
    if (value - default).abs() <= 1e-12 * value.abs().max(default.abs()) {
        debug!("{name} left at its default of {default} {units}");
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

fn set_option(info: &mut PhaseInfo, name: &str, value: f64, units: &str) {
    info.user_options
        .insert(name.to_string(), UserOption::new(value, units));
}

/// Replaces the first or last point of a state guess, creating a flat guess when there is none.
fn pin_guess(
    info: &mut PhaseInfo,
    key: &str,
    at_start: bool,
    value: f64,
    units: &str,
) -> Result<(), TrajectoryError> {
    let Some(guess) = info.initial_guesses.get(key) else {
        info.initial_guesses
            .insert(key.to_string(), InitialGuess::new(vec![value, value], units));
        return Ok(());
    };
    let mut points = guess
        .values(key)
        .context(GuessParameterizationSnafu { key })?;
    let guess_units = guess.units().to_string();
    let value = convert(value, units, &guess_units).context(GuessUnitsSnafu { key })?;
    if points.len() < 2 {
        points = vec![value, points.first().copied().unwrap_or(value)];
        if !at_start {
            points.reverse();
        }
    } else if at_start {
        points[0] = value;
    } else if let Some(last) = points.last_mut() {
        *last = value;
    }
    info.initial_guesses
        .insert(key.to_string(), InitialGuess::new(points, &guess_units));
    Ok(())
}

/// Sets the climb, cruise and descent of a height-energy mission to the design cruise condition,
/// and the mission target range to the design range.
///
/// Design inputs left at their default do not change the mission, nor do phases missing from it.
pub fn height_energy_parameterization(
    info: &mut MissionInfo,
    values: &AircraftValues,
) -> Result<(), TrajectoryError> {
    if let Some(range) = design_value(values, mission::DESIGN_RANGE, "NM")? {
        info.post_mission
            .get_or_insert_with(Default::default)
            .insert(mission::TARGET_RANGE.to_string(), (range, "NM").into());
    }

    let altitude = design_value(values, mission::CRUISE_ALTITUDE, "ft")?;
    let mach = design_value(values, mission::CRUISE_MACH, "unitless")?;
    for (phase, settings) in [
        ("climb", &["final_altitude", "final_mach"][..]),
        (
            "cruise",
            &["initial_altitude", "final_altitude", "initial_mach", "final_mach"][..],
        ),
        ("descent", &["initial_altitude", "initial_mach"][..]),
    ] {
        let Some(phase_info) = info.get_mut(phase) else {
            debug!("no {phase} phase to parameterize");
            continue;
        };
        for setting in settings {
            let (value, units) = if setting.ends_with("altitude") {
                (altitude, "ft")
            } else {
                (mach, "unitless")
            };
            if let Some(value) = value {
                set_option(phase_info, setting, value, units);
            }
        }
    }
    debug!("height-energy mission at {altitude:?} ft, Mach {mach:?}");
    Ok(())
}

/// Sets the climb target and the analytic cruise condition of a two-DOF mission, then pins the
/// mass guess of the first phase to the gross mass and the distance guess of the last phase to
/// the design range.
///
/// Design inputs left at their default do not change the mission.
pub fn two_dof_parameterization(
    info: &mut MissionInfo,
    values: &AircraftValues,
) -> Result<(), TrajectoryError> {
    let altitude = design_value(values, mission::CRUISE_ALTITUDE, "ft")?;
    let mach = design_value(values, mission::CRUISE_MACH, "unitless")?;
    let range = design_value(values, mission::DESIGN_RANGE, "NM")?;
    let gross_mass = design_value(values, mission::GROSS_MASS, "lbm")?;

    if let Some(altitude) = altitude {
        if let Some(climb) = info.get_mut("climb") {
            set_option(climb, "final_altitude", altitude, "ft");
        }
        if let Some(cruise) = info.get_mut("cruise") {
            set_option(cruise, "alt_cruise", altitude, "ft");
        }
    }
    if let (Some(mach), Some(cruise)) = (mach, info.get_mut("cruise")) {
        set_option(cruise, "mach_cruise", mach, "unitless");
    }

    let names: Vec<String> = info.phase_names().iter().map(|n| n.to_string()).collect();
    if let (Some(gross_mass), Some(first)) = (gross_mass, names.first()) {
        if let Some(phase) = info.get_mut(first) {
            pin_guess(phase, dynamic::MASS, true, gross_mass, "lbm")?;
        }
    }
    if let (Some(range), Some(last)) = (range, names.last()) {
        if let Some(phase) = info.get_mut(last) {
            pin_guess(phase, dynamic::DISTANCE, false, range, "NM")?;
        }
    }
    debug!("two-DOF mission at {altitude:?} ft, Mach {mach:?}, {gross_mass:?} lbm over {range:?} NM");
    Ok(())
}
