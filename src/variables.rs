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

//! Canonical variable names shared by the phase builders, the equations of motion and the
//! mission parameterizations.

/// Time-varying quantities computed or integrated along a phase.
pub mod dynamic {
    pub const TIME: &str = "time";
    /// Time elapsed since the start of the phase.
    pub const TIME_PHASE: &str = "time_phase";
    pub const MASS: &str = "mass";
    pub const DISTANCE: &str = "distance";
    pub const ALTITUDE: &str = "altitude";
    pub const VELOCITY: &str = "velocity";
    pub const FLIGHT_PATH_ANGLE: &str = "flight_path_angle";
    pub const MACH: &str = "mach";
    pub const THROTTLE: &str = "throttle";
    pub const ALPHA: &str = "alpha";

    pub const DISTANCE_RATE: &str = "distance_rate";
    pub const ALTITUDE_RATE: &str = "altitude_rate";
    pub const VELOCITY_RATE: &str = "velocity_rate";
    pub const FLIGHT_PATH_ANGLE_RATE: &str = "flight_path_angle_rate";
    pub const MACH_RATE: &str = "mach_rate";
    /// Rate of change of the vehicle mass, negative when burning fuel.
    pub const FUEL_FLOW_RATE_NEGATIVE_TOTAL: &str = "fuel_flow_rate_negative_total";

    pub const DENSITY: &str = "density";
    pub const SPEED_OF_SOUND: &str = "speed_of_sound";
    pub const TEMPERATURE: &str = "temperature";
    pub const STATIC_PRESSURE: &str = "static_pressure";
    pub const LIFT: &str = "lift";
    pub const DRAG: &str = "drag";
    pub const THRUST: &str = "thrust";
    pub const THRUST_REQUIRED: &str = "thrust_required";
}

/// Top level mission inputs, typically used to parameterize the phases.
pub mod mission {
    pub const DESIGN_RANGE: &str = "mission:design:range";
    pub const CRUISE_ALTITUDE: &str = "mission:design:cruise_altitude";
    pub const GROSS_MASS: &str = "mission:design:gross_mass";
    pub const CRUISE_MACH: &str = "mission:summary:cruise_mach";
    /// Key of the post mission target range, written by the parameterizations.
    pub const TARGET_RANGE: &str = "target_range";
}

/// Vehicle inputs read by the built-in equations of motion.
pub mod aircraft {
    pub const WING_AREA: &str = "aircraft:wing:area";
    pub const ZERO_LIFT_DRAG_COEFF: &str = "aircraft:design:zero_lift_drag_coefficient";
    pub const INDUCED_DRAG_FACTOR: &str = "aircraft:design:induced_drag_factor";
    pub const ZERO_ALPHA_LIFT_COEFF: &str = "aircraft:design:zero_alpha_lift_coefficient";
    pub const LIFT_CURVE_SLOPE: &str = "aircraft:design:lift_curve_slope";
    pub const MAX_THRUST: &str = "aircraft:engine:max_thrust";
    pub const TSFC: &str = "aircraft:engine:thrust_specific_fuel_consumption";
}
