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

use crate::dynamics::DynamicsError;
use crate::io::ConfigError;
use crate::md::builder::{BuilderError, RegistryError};
use crate::md::guesses::GuessError;
use crate::md::phase::PhaseError;
use crate::md::trajectory::TrajectoryError;
use crate::md::transcription::TranscriptionError;
use crate::opti::OptiError;
use crate::options::OptionsError;
use crate::units::UnitError;
use snafu::prelude::*;

/// Any error of the library, each module error converts into it with `?`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MissionError {
    #[snafu(context(false), display("{source}"))]
    Units { source: UnitError },
    #[snafu(context(false), display("{source}"))]
    Options { source: OptionsError },
    #[snafu(context(false), display("{source}"))]
    Guesses { source: GuessError },
    #[snafu(context(false), display("{source}"))]
    Dynamics { source: DynamicsError },
    #[snafu(context(false), display("{source}"))]
    Transcription { source: TranscriptionError },
    #[snafu(context(false), display("{source}"))]
    Phase { source: PhaseError },
    #[snafu(context(false), display("{source}"))]
    Builder { source: BuilderError },
    #[snafu(context(false), display("{source}"))]
    Registry { source: RegistryError },
    #[snafu(context(false), display("{source}"))]
    Trajectory { source: TrajectoryError },
    #[snafu(context(false), display("{source}"))]
    Opti { source: OptiError },
    #[snafu(context(false), display("{source}"))]
    Config { source: ConfigError },
}
