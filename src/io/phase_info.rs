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

use super::ConfigRepr;
use crate::md::guesses::InitialGuess;
use crate::options::{OptionValue, UserOption};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserializer, Serializer};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The declarative description of one phase of a mission.
///
/// ```yaml
/// subsystem_options:
///   core_aerodynamics: {method: computed}
/// user_options:
///   optimize_mach: false
///   duration_bounds: [[0.5, 1.5], h]
/// initial_guesses:
///   time: [[0, 2], h]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseInfo {
    #[serde(default)]
    pub subsystem_options: BTreeMap<String, BTreeMap<String, OptionValue>>,
    #[serde(default)]
    pub user_options: BTreeMap<String, UserOption>,
    #[serde(default)]
    pub initial_guesses: BTreeMap<String, InitialGuess>,
    /// Names of subsystems, resolved through a catalog when the phase is built.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_subsystems: Vec<String>,
    /// Kind of phase, when the description names it rather than relying on recognition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,
}

impl PhaseInfo {
    pub fn with_option(mut self, name: &str, option: UserOption) -> Self {
        self.user_options.insert(name.to_string(), option);
        self
    }

    pub fn with_guess(mut self, name: &str, guess: InitialGuess) -> Self {
        self.initial_guesses.insert(name.to_string(), guess);
        self
    }

    pub fn with_builder(mut self, builder: &str) -> Self {
        self.builder = Some(builder.to_string());
        self
    }

    /// Returns a copy where every user option has the `[value, units]` form.
    pub fn normalized(&self) -> Self {
        let mut me = self.clone();
        for option in me.user_options.values_mut() {
            *option = option.normalized();
        }
        me
    }

    pub fn is_normalized(&self) -> bool {
        self.user_options.values().all(|o| o.is_normalized())
    }
}

impl ConfigRepr for PhaseInfo {}

const PRE_MISSION: &str = "pre_mission";
const POST_MISSION: &str = "post_mission";

/// A whole mission: its phases in flight order, and the options of what comes before and after.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MissionInfo {
    pub pre_mission: Option<BTreeMap<String, OptionValue>>,
    phases: Vec<(String, PhaseInfo)>,
    pub post_mission: Option<BTreeMap<String, OptionValue>>,
}

impl MissionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a phase, or replaces the phase of the same name where it stands.
    pub fn push(&mut self, name: &str, info: PhaseInfo) {
        match self.phases.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = info,
            None => self.phases.push((name.to_string(), info)),
        }
    }

    pub fn with_phase(mut self, name: &str, info: PhaseInfo) -> Self {
        self.push(name, info);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PhaseInfo> {
        self.phases.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PhaseInfo> {
        self.phases
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PhaseInfo)> {
        self.phases.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut PhaseInfo)> {
        self.phases.iter_mut().map(|(n, p)| (n.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

impl serde::Serialize for MissionInfo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let extra = usize::from(self.pre_mission.is_some()) + usize::from(self.post_mission.is_some());
        let mut map = serializer.serialize_map(Some(self.phases.len() + extra))?;
        if let Some(pre) = &self.pre_mission {
            map.serialize_entry(PRE_MISSION, pre)?;
        }
        for (name, info) in &self.phases {
            map.serialize_entry(name, info)?;
        }
        if let Some(post) = &self.post_mission {
            map.serialize_entry(POST_MISSION, post)?;
        }
        map.end()
    }
}

struct MissionInfoVisitor;

impl<'de> Visitor<'de> for MissionInfoVisitor {
    type Value = MissionInfo;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a mapping of phase names to phase descriptions")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut mission = MissionInfo::new();
        while let Some(key) = access.next_key::<String>()? {
            match key.as_str() {
                PRE_MISSION => mission.pre_mission = Some(access.next_value()?),
                POST_MISSION => mission.post_mission = Some(access.next_value()?),
                _ => {
                    if mission.get(&key).is_some() {
                        return Err(serde::de::Error::custom(format!(
                            "phase `{key}` is described twice"
                        )));
                    }
                    let info: PhaseInfo = access.next_value()?;
                    mission.push(&key, info);
                }
            }
        }
        Ok(mission)
    }
}

impl<'de> serde::Deserialize<'de> for MissionInfo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(MissionInfoVisitor)
    }
}

impl ConfigRepr for MissionInfo {}
