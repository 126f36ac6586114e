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

/// Radau and analytic grids a phase is discretized on.
pub mod transcription;

/// Discretized phases: variable declarations, values and evaluation.
pub mod phase;

pub mod guesses;

/// Phase kinds and the builders turning phase descriptions into phases.
pub mod builder;

/// Phases flown in sequence and the linkages between them.
pub mod trajectory;

pub mod default_phase_info;

pub use builder::{phase_info_to_builder, BuilderContext, PhaseBuilder, PhaseKind};
pub use guesses::{GuessRegistry, InitialGuess};
pub use phase::{Phase, PhaseEvaluation};
pub use trajectory::{LinkMode, MissionBuilder, Trajectory};
