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

/*! # aero-mission

Assembly of aircraft mission trajectories from declarative phase descriptions.

A mission is described as an ordered list of phases (climb, cruise, descent, ...), each with user
options in explicit units and initial guesses. Every description is recognized as a registered
phase kind, turned into a [`md::PhaseBuilder`], built into a discretized [`md::Phase`], and linked to
its neighbors in a [`md::Trajectory`] ready to hand to a nonlinear programming driver.
*/

/// Unit expressions, dimensions and conversions.
pub mod units;

/// Canonical names of the mission, aircraft and dynamic variables.
pub mod variables;

/// Declared phase options, their values in native units, and the aircraft inputs.
pub mod options;

/// Equations of motion, mission components and subsystem plug-ins.
pub mod dynamics;

/// All of the mission design tools: phases, builders, registries and trajectories.
pub mod md;

/// Phase and mission descriptions, and YAML configuration loading.
pub mod io;

/// Hand-off to nonlinear programming drivers.
pub mod opti;

mod errors;
/// Every module error converts into a [`MissionError`].
pub use self::errors::MissionError;

#[macro_use]
extern crate log;
extern crate nalgebra as na;

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

pub use self::io::{ConfigRepr, MissionInfo, PhaseInfo};
pub use self::md::{MissionBuilder, Phase, PhaseBuilder, Trajectory};
pub use self::options::{AircraftValues, UserOption};
