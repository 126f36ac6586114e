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

use super::{
    declare_bounds, declare_f64, declare_state_options, BuilderError, PhaseBuilder, PhaseKind,
    PhaseSnafu,
};
use crate::dynamics::{OdeClass, TwoDofOde};
use crate::md::guesses::{control_guess, parameter_guess, state_guess, time_guess, GuessRegistry};
use crate::md::phase::{ConstraintOptions, ControlOptions, Loc, ParameterOptions, Phase};
use crate::md::trajectory::LinkMode;
use crate::options::{OptionKind, OptionMeta, OptionsSchema};
use crate::variables::dynamic;
use lazy_static::lazy_static;
use snafu::ResultExt;
use std::sync::Arc;

lazy_static! {
    static ref SCHEMA: OptionsSchema = {
        let schema = OptionsSchema::phase_base();
        let schema = declare_state_options(schema, "velocity", "kn");
        let schema = declare_state_options(schema, "angle", "rad");
        let schema = declare_state_options(schema, "alt", "ft");
        let schema = declare_state_options(schema, "distance", "NM");
        let schema = declare_state_options(schema, "mass", "lbm");
        let schema = declare_f64(schema, "final_altitude", "ft", "altitude at the end of the phase");
        let schema = declare_f64(schema, "alt_constraint_ref", "ft", "");
        let schema = declare_f64(schema, "final_mach", "unitless", "Mach number at the end of the phase");
        let schema = declare_bounds(schema, "alpha_bounds", "deg");
        schema.declare(
            OptionMeta::builder()
                .name("throttle")
                .default(1.0)
                .kind(OptionKind::Float)
                .desc("throttle setting held over the phase")
                .build(),
        )
    };
    static ref GUESSES: GuessRegistry = GuessRegistry::new()
        .with(vec![
            ("time", time_guess(), "[initial time, duration]"),
            ("velocity", state_guess(dynamic::VELOCITY), "[initial, final] true airspeed"),
            ("flight_path_angle", state_guess(dynamic::FLIGHT_PATH_ANGLE), "[initial, final] flight path angle"),
            ("altitude", state_guess(dynamic::ALTITUDE), "[initial, final] altitude"),
            ("distance", state_guess(dynamic::DISTANCE), "[initial, final] distance"),
            ("mass", state_guess(dynamic::MASS), "[initial, final] mass"),
            ("alpha", control_guess(dynamic::ALPHA), "[initial, final] angle of attack"),
            ("throttle", parameter_guess(dynamic::THROTTLE), "throttle setting"),
        ])
        .expect("two DOF phase guesses are unique");
}

/// Point mass phase flown on angle of attack at a fixed throttle setting.
#[derive(Copy, Clone, Debug, Default)]
pub struct TwoDofPhase;

impl PhaseKind for TwoDofPhase {
    fn type_name(&self) -> &str {
        "two_dof"
    }

    fn default_name(&self) -> &str {
        "two_dof_phase"
    }

    fn options_schema(&self) -> &OptionsSchema {
        &SCHEMA
    }

    fn guess_registry(&self) -> &GuessRegistry {
        &GUESSES
    }

    fn default_ode_class(&self) -> Arc<dyn OdeClass> {
        Arc::new(TwoDofOde)
    }

    fn configure(&self, builder: &PhaseBuilder, phase: &mut Phase) -> Result<(), BuilderError> {
        builder.set_time_options(phase, &[])?;
        builder.add_velocity_state(phase)?;
        builder.add_flight_path_angle_state(phase)?;
        builder.add_altitude_state(phase)?;
        builder.add_distance_state(phase)?;
        builder.add_mass_state(phase)?;

        let (lower, upper) = builder.opt_bounds_in("alpha_bounds", "deg")?;
        phase
            .add_control(ControlOptions {
                lower,
                upper,
                ..ControlOptions::builder()
                    .name(dynamic::ALPHA)
                    .units("deg")
                    .ref_value(10.0)
                    .build()
            })
            .context(PhaseSnafu)?;
        let throttle = builder.opt_f64_in("throttle", "unitless")?.unwrap_or(1.0);
        phase
            .add_parameter(
                ParameterOptions::builder()
                    .name(dynamic::THROTTLE)
                    .val(throttle)
                    .lower(0.0)
                    .upper(1.0)
                    .build(),
            )
            .context(PhaseSnafu)?;

        builder.add_altitude_constraint(phase)?;
        if let Some(mach) = builder.opt_f64_in("final_mach", "unitless")? {
            phase
                .add_boundary_constraint(
                    ConstraintOptions::builder()
                        .name("final_mach")
                        .target(dynamic::MACH)
                        .loc(Loc::Final)
                        .equals(mach)
                        .build(),
                )
                .context(PhaseSnafu)?;
        }
        Ok(())
    }

    fn linked_variables(
        &self,
        _builder: &PhaseBuilder,
    ) -> Result<Vec<(String, LinkMode)>, BuilderError> {
        Ok([
            dynamic::TIME,
            dynamic::MASS,
            dynamic::DISTANCE,
            dynamic::ALTITUDE,
            dynamic::VELOCITY,
            dynamic::FLIGHT_PATH_ANGLE,
        ]
        .iter()
        .map(|v| (v.to_string(), LinkMode::Connected))
        .collect())
    }
}
