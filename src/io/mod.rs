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

use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::prelude::*;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub mod phase_info;

pub use phase_info::{MissionInfo, PhaseInfo};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read configuration file {}: {source}", path.display()))]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to parse YAML configuration: {source}"))]
    ParseError { source: serde_yaml::Error },
    #[snafu(display("failed to write YAML configuration: {source}"))]
    WriteError { source: serde_yaml::Error },
}

impl PartialEq for ConfigError {
    /// No two configuration errors match
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

fn open<P: AsRef<Path>>(path: P) -> Result<BufReader<File>, ConfigError> {
    let file = File::open(path.as_ref()).context(ReadSnafu {
        path: path.as_ref().to_path_buf(),
    })?;
    Ok(BufReader::new(file))
}

pub trait ConfigRepr: Debug + Sized + Serialize + DeserializeOwned {
    /// Reads a description from a YAML file.
    fn load<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        serde_yaml::from_reader(open(path)?).context(ParseSnafu)
    }

    /// Reads a description from a YAML document.
    fn loads(data: &str) -> Result<Self, ConfigError> {
        debug!("Loading YAML:\n{data}");
        serde_yaml::from_str(data).context(ParseSnafu)
    }

    /// Writes this description as a YAML document.
    fn dumps(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).context(WriteSnafu)
    }
}
