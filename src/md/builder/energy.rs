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
    declare_bool, declare_bounds, declare_f64, declare_state_options, BuilderError, PhaseBuilder,
    PhaseKind, PhaseSnafu,
};
use crate::dynamics::{EnergyOde, OdeClass};
use crate::md::guesses::{auto_guess, state_guess, time_guess, GuessRegistry};
use crate::md::phase::Phase;
use crate::md::trajectory::LinkMode;
use crate::options::{OptionKind, OptionMeta, OptionValue, OptionsSchema};
use crate::variables::dynamic;
use lazy_static::lazy_static;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::sync::Arc;

lazy_static! {
    static ref SCHEMA: OptionsSchema = {
        let schema = OptionsSchema::phase_base();
        let schema = declare_bool(schema, "optimize_mach", false, "optimize the Mach number profile");
        let schema = declare_bool(schema, "optimize_altitude", false, "optimize the altitude profile");
        let schema = declare_f64(schema, "initial_mach", "unitless", "");
        let schema = declare_f64(schema, "final_mach", "unitless", "");
        let schema = declare_bounds(schema, "mach_bounds", "unitless");
        let schema = declare_f64(schema, "initial_altitude", "ft", "");
        let schema = declare_f64(schema, "final_altitude", "ft", "");
        let schema = declare_bounds(schema, "altitude_bounds", "ft");
        let schema = declare_bool(schema, "constrain_final", false, "constrain the final Mach and altitude");
        let schema = declare_bool(schema, "use_polynomial_control", true, "Mach and altitude are polynomials over the phase");
        let schema = declare_bool(schema, "solve_for_distance", false, "distance follows from the dynamics rather than the optimizer");
        let schema = schema
            .declare(
                OptionMeta::builder()
                    .name("polynomial_control_order")
                    .default(3)
                    .kind(OptionKind::Int)
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("throttle_enforcement")
                    .default("path_constraint")
                    .kind(OptionKind::Str)
                    .desc("path_constraint, boundary_constraint or bounded")
                    .build(),
            );
        let schema = declare_state_options(schema, "mass", "lbm");
        declare_state_options(schema, "distance", "NM")
    };
    static ref GUESSES: GuessRegistry = GuessRegistry::new()
        .with(vec![
            ("time", time_guess(), "[initial time, duration]"),
            ("distance", state_guess(dynamic::DISTANCE), "[initial, final] distance"),
            ("mass", state_guess(dynamic::MASS), "[initial, final] mass"),
            ("mach", auto_guess(dynamic::MACH), "[initial, final] Mach number"),
            ("altitude", auto_guess(dynamic::ALTITUDE), "[initial, final] altitude"),
        ])
        .expect("energy phase guesses are unique");
}

/// Height-energy phase: Mach and altitude are controls, mass and distance are integrated.
#[derive(Copy, Clone, Debug, Default)]
pub struct EnergyPhase;

impl PhaseKind for EnergyPhase {
    fn type_name(&self) -> &str {
        "energy"
    }

    fn default_name(&self) -> &str {
        "energy_phase"
    }

    fn options_schema(&self) -> &OptionsSchema {
        &SCHEMA
    }

    fn guess_registry(&self) -> &GuessRegistry {
        &GUESSES
    }

    fn default_ode_class(&self) -> Arc<dyn OdeClass> {
        Arc::new(EnergyOde)
    }

    fn extra_ode_init_kwargs(
        &self,
        builder: &PhaseBuilder,
    ) -> Result<BTreeMap<String, OptionValue>, BuilderError> {
        let mut extras = BTreeMap::new();
        if let Some(enforcement) = builder.opt_str("throttle_enforcement")? {
            extras.insert("throttle_enforcement".to_string(), enforcement.into());
        }
        Ok(extras)
    }

    fn configure(&self, builder: &PhaseBuilder, phase: &mut Phase) -> Result<(), BuilderError> {
        builder.set_time_options(phase, &[])?;
        builder.add_mass_state(phase)?;
        let mut distance = builder.collocated_state(
            dynamic::DISTANCE,
            "distance",
            "NM",
            dynamic::DISTANCE_RATE,
        )?;
        distance.opt = !builder.opt_bool("solve_for_distance")?;
        phase.add_state(distance).context(PhaseSnafu)?;
        builder.add_mach_control(phase)?;
        builder.add_altitude_control(phase)?;
        builder.add_throttle_control(phase)
    }

    fn linked_variables(
        &self,
        builder: &PhaseBuilder,
    ) -> Result<Vec<(String, LinkMode)>, BuilderError> {
        let mut vars = vec![
            (dynamic::TIME.to_string(), LinkMode::Connected),
            (dynamic::MASS.to_string(), LinkMode::Connected),
            (dynamic::DISTANCE.to_string(), LinkMode::Connected),
        ];
        if builder.opt_bool("optimize_mach")? {
            vars.push((dynamic::MACH.to_string(), LinkMode::Constrained));
        }
        if builder.opt_bool("optimize_altitude")? {
            vars.push((dynamic::ALTITUDE.to_string(), LinkMode::Constrained));
        }
        Ok(vars)
    }
}
