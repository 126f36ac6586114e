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

use super::{declare_state_options, BuilderError, PhaseBuilder, PhaseKind, PhaseSnafu};
use crate::dynamics::{BreguetCruiseOde, OdeClass};
use crate::md::guesses::{state_guess, time_guess, GuessRegistry};
use crate::md::phase::{ParameterOptions, Phase, StateOptions};
use crate::md::trajectory::LinkMode;
use crate::options::{OptionKind, OptionMeta, OptionsSchema};
use crate::variables::dynamic;
use lazy_static::lazy_static;
use snafu::ResultExt;
use std::sync::Arc;

lazy_static! {
    static ref SCHEMA: OptionsSchema = {
        let schema = OptionsSchema::phase_base()
            .declare(
                OptionMeta::builder()
                    .name("mach_cruise")
                    .default(0.8)
                    .kind(OptionKind::Float)
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("alt_cruise")
                    .default(35_000.0)
                    .kind(OptionKind::Float)
                    .units("ft")
                    .build(),
            );
        let schema = declare_state_options(schema, "mass", "lbm");
        declare_state_options(schema, "distance", "NM")
    };
    static ref GUESSES: GuessRegistry = GuessRegistry::new()
        .with(vec![
            ("time", time_guess(), "[initial time, duration]"),
            ("mass", state_guess(dynamic::MASS), "initial mass"),
            ("distance", state_guess(dynamic::DISTANCE), "initial distance"),
        ])
        .expect("analytic cruise guesses are unique");
}

/// Cruise at constant Mach and altitude integrated in closed form on a few nodes.
#[derive(Copy, Clone, Debug, Default)]
pub struct AnalyticCruisePhase;

impl AnalyticCruisePhase {
    fn analytic_state(
        builder: &PhaseBuilder,
        name: &str,
        prefix: &str,
        units: &str,
    ) -> Result<StateOptions, BuilderError> {
        Ok(StateOptions {
            lower: builder.state_opt(prefix, "lower", units)?,
            upper: builder.state_opt(prefix, "upper", units)?,
            ref_value: builder.state_opt(prefix, "ref", units)?,
            fix_initial: builder.opt_flag_for("fix_initial", name)?,
            ..StateOptions::builder()
                .name(name)
                .units(units)
                .source(name)
                .build()
        })
    }
}

impl PhaseKind for AnalyticCruisePhase {
    fn type_name(&self) -> &str {
        "analytic_cruise"
    }

    fn default_name(&self) -> &str {
        "cruise"
    }

    fn options_schema(&self) -> &OptionsSchema {
        &SCHEMA
    }

    fn guess_registry(&self) -> &GuessRegistry {
        &GUESSES
    }

    fn default_ode_class(&self) -> Arc<dyn OdeClass> {
        Arc::new(BreguetCruiseOde)
    }

    fn is_analytic(&self) -> bool {
        true
    }

    fn default_num_nodes(&self) -> usize {
        2
    }

    fn configure(&self, builder: &PhaseBuilder, phase: &mut Phase) -> Result<(), BuilderError> {
        builder.set_time_options(phase, &[])?;
        let mach = builder.opt_f64_in("mach_cruise", "unitless")?.unwrap_or(0.8);
        let altitude = builder.opt_f64_in("alt_cruise", "ft")?.unwrap_or(35_000.0);
        phase
            .add_parameter(
                ParameterOptions::builder()
                    .name(dynamic::MACH)
                    .val(mach)
                    .build(),
            )
            .context(PhaseSnafu)?;
        phase
            .add_parameter(
                ParameterOptions::builder()
                    .name(dynamic::ALTITUDE)
                    .units("ft")
                    .val(altitude)
                    .build(),
            )
            .context(PhaseSnafu)?;
        for (name, prefix, units) in [
            (dynamic::MASS, "mass", "lbm"),
            (dynamic::DISTANCE, "distance", "NM"),
        ] {
            let state = Self::analytic_state(builder, name, prefix, units)?;
            phase.add_state(state).context(PhaseSnafu)?;
        }
        Ok(())
    }

    fn linked_variables(
        &self,
        _builder: &PhaseBuilder,
    ) -> Result<Vec<(String, LinkMode)>, BuilderError> {
        Ok([dynamic::TIME, dynamic::MASS, dynamic::DISTANCE]
            .iter()
            .map(|v| (v.to_string(), LinkMode::Connected))
            .collect())
    }
}
