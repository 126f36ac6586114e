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

//! Stock mission descriptions, meant to be parameterized before they are built.

use crate::io::{MissionInfo, PhaseInfo};
use crate::md::guesses::InitialGuess;
use crate::options::{OptionValue, UserOption};
use std::collections::BTreeMap;

fn opt<V: Into<OptionValue>>(value: V, units: &str) -> UserOption {
    UserOption::new(value, units)
}

fn guess(initial: f64, last: f64, units: &str) -> InitialGuess {
    InitialGuess::new(vec![initial, last], units)
}

/// Climb, cruise and descent of a height-energy mission.
pub fn height_energy_mission() -> MissionInfo {
    let climb = PhaseInfo::default()
        .with_option("optimize_mach", opt(false, "unitless"))
        .with_option("optimize_altitude", opt(false, "unitless"))
        .with_option("num_segments", opt(5, "unitless"))
        .with_option("order", opt(3, "unitless"))
        .with_option("initial_mach", opt(0.2, "unitless"))
        .with_option("final_mach", opt(0.79, "unitless"))
        .with_option("mach_bounds", opt((0.1, 0.8), "unitless"))
        .with_option("initial_altitude", opt(0.0, "ft"))
        .with_option("final_altitude", opt(35_000.0, "ft"))
        .with_option("altitude_bounds", opt((0.0, 35_500.0), "ft"))
        .with_option("throttle_enforcement", opt("path_constraint", "unitless"))
        .with_option("fix_initial", opt(true, "unitless"))
        .with_option("constrain_final", opt(false, "unitless"))
        .with_option("fix_duration", opt(false, "unitless"))
        .with_option("initial_bounds", opt((0.0, 0.0), "min"))
        .with_option("duration_bounds", opt((27.0, 81.0), "min"))
        .with_guess("time", guess(0.0, 54.0, "min"))
        .with_guess("mass", guess(175_000.0, 170_000.0, "lbm"))
        .with_guess("distance", guess(0.0, 150.0, "NM"))
        .with_guess("mach", guess(0.2, 0.79, "unitless"))
        .with_guess("altitude", guess(0.0, 35_000.0, "ft"));

    let cruise = PhaseInfo::default()
        .with_option("optimize_mach", opt(false, "unitless"))
        .with_option("optimize_altitude", opt(false, "unitless"))
        .with_option("num_segments", opt(5, "unitless"))
        .with_option("order", opt(3, "unitless"))
        .with_option("initial_mach", opt(0.79, "unitless"))
        .with_option("final_mach", opt(0.79, "unitless"))
        .with_option("mach_bounds", opt((0.79, 0.79), "unitless"))
        .with_option("initial_altitude", opt(35_000.0, "ft"))
        .with_option("final_altitude", opt(35_000.0, "ft"))
        .with_option("altitude_bounds", opt((35_000.0, 35_000.0), "ft"))
        .with_option("throttle_enforcement", opt("boundary_constraint", "unitless"))
        .with_option("polynomial_control_order", opt(1, "unitless"))
        .with_option("initial_bounds", opt((64.0, 192.0), "min"))
        .with_option("duration_bounds", opt((56.5, 169.5), "min"))
        .with_guess("time", guess(54.0, 306.0, "min"))
        .with_guess("mass", guess(170_000.0, 145_000.0, "lbm"))
        .with_guess("distance", guess(150.0, 2_850.0, "NM"))
        .with_guess("mach", guess(0.79, 0.79, "unitless"))
        .with_guess("altitude", guess(35_000.0, 35_000.0, "ft"));

    let descent = PhaseInfo::default()
        .with_option("optimize_mach", opt(false, "unitless"))
        .with_option("optimize_altitude", opt(false, "unitless"))
        .with_option("num_segments", opt(5, "unitless"))
        .with_option("order", opt(3, "unitless"))
        .with_option("initial_mach", opt(0.79, "unitless"))
        .with_option("final_mach", opt(0.3, "unitless"))
        .with_option("mach_bounds", opt((0.2, 0.8), "unitless"))
        .with_option("initial_altitude", opt(35_000.0, "ft"))
        .with_option("final_altitude", opt(500.0, "ft"))
        .with_option("altitude_bounds", opt((0.0, 35_500.0), "ft"))
        .with_option("throttle_enforcement", opt("path_constraint", "unitless"))
        .with_option("constrain_final", opt(true, "unitless"))
        .with_option("initial_bounds", opt((120.5, 361.5), "min"))
        .with_option("duration_bounds", opt((29.0, 87.0), "min"))
        .with_guess("time", guess(360.0, 54.0, "min"))
        .with_guess("mass", guess(145_000.0, 143_000.0, "lbm"))
        .with_guess("distance", guess(2_850.0, 3_000.0, "NM"))
        .with_guess("mach", guess(0.79, 0.3, "unitless"))
        .with_guess("altitude", guess(35_000.0, 500.0, "ft"));

    let mut info = MissionInfo::new()
        .with_phase("climb", climb)
        .with_phase("cruise", cruise)
        .with_phase("descent", descent);
    info.pre_mission = Some(BTreeMap::from([(
        "include_takeoff".to_string(),
        OptionValue::Bool(false),
    )]));
    info.post_mission = Some(BTreeMap::from([(
        "include_landing".to_string(),
        OptionValue::Bool(false),
    )]));
    info
}

/// Two-DOF climb and descent around an analytic Breguet cruise.
pub fn two_dof_mission() -> MissionInfo {
    let climb = PhaseInfo::default()
        .with_builder("two_dof")
        .with_option("num_segments", opt(3, "unitless"))
        .with_option("order", opt(3, "unitless"))
        .with_option("fix_initial", opt(true, "unitless"))
        .with_option("duration_bounds", opt((5.0, 60.0), "min"))
        .with_option("final_altitude", opt(35_000.0, "ft"))
        .with_option("alt_constraint_ref", opt(10_000.0, "ft"))
        .with_option("velocity_lower", opt(100.0, "kn"))
        .with_option("velocity_upper", opt(600.0, "kn"))
        .with_option("alt_lower", opt(0.0, "ft"))
        .with_option("alt_upper", opt(40_000.0, "ft"))
        .with_option("mass_ref", opt(150_000.0, "lbm"))
        .with_option("alpha_bounds", opt((-5.0, 15.0), "deg"))
        .with_option("throttle", opt(1.0, "unitless"))
        .with_guess("time", guess(0.0, 25.0, "min"))
        .with_guess("velocity", guess(180.0, 460.0, "kn"))
        .with_guess("flight_path_angle", guess(0.1, 0.0, "rad"))
        .with_guess("altitude", guess(500.0, 35_000.0, "ft"))
        .with_guess("distance", guess(0.0, 150.0, "NM"))
        .with_guess("mass", guess(175_000.0, 171_000.0, "lbm"))
        .with_guess("alpha", guess(5.0, 2.0, "deg"));

    let cruise = PhaseInfo::default()
        .with_option("alt_cruise", opt(35_000.0, "ft"))
        .with_option("mach_cruise", opt(0.8, "unitless"))
        .with_guess("time", guess(25.0, 335.0, "min"))
        .with_guess("mass", guess(171_000.0, 146_000.0, "lbm"))
        .with_guess("distance", guess(150.0, 2_800.0, "NM"));

    let descent = PhaseInfo::default()
        .with_builder("two_dof")
        .with_option("num_segments", opt(3, "unitless"))
        .with_option("order", opt(3, "unitless"))
        .with_option("duration_bounds", opt((10.0, 60.0), "min"))
        .with_option("final_altitude", opt(500.0, "ft"))
        .with_option("alt_constraint_ref", opt(10_000.0, "ft"))
        .with_option("alpha_bounds", opt((-5.0, 15.0), "deg"))
        .with_option("throttle", opt(0.0, "unitless"))
        .with_guess("time", guess(360.0, 30.0, "min"))
        .with_guess("velocity", guess(460.0, 200.0, "kn"))
        .with_guess("flight_path_angle", guess(-0.05, 0.0, "rad"))
        .with_guess("altitude", guess(35_000.0, 500.0, "ft"))
        .with_guess("distance", guess(2_800.0, 3_000.0, "NM"))
        .with_guess("mass", guess(146_000.0, 145_000.0, "lbm"))
        .with_guess("alpha", guess(1.0, 1.0, "deg"));

    MissionInfo::new()
        .with_phase("climb", climb)
        .with_phase("cruise", cruise)
        .with_phase("descent", descent)
}
