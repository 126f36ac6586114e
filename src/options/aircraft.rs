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
    InvalidOptionValueSnafu, MissingValueSnafu, OptionKind, OptionValue, OptionsError,
    UnitMismatchSnafu, UnknownOptionSnafu,
};
use crate::units::conversion_factor;
use crate::variables::{aircraft, mission};
use lazy_static::lazy_static;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

lazy_static! {
    /// Metadata of every aircraft and mission input known to the built-in models.
    pub static ref DEFAULT_META_DATA: Arc<MetaData> = Arc::new(MetaData::default());
}

/// Native units, default value and description of an aircraft or mission input.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableMeta {
    pub units: String,
    pub default: OptionValue,
    pub desc: String,
}

/// Variable metadata table, keyed by the variable name.
#[derive(Clone, Debug, PartialEq)]
pub struct MetaData {
    vars: BTreeMap<String, VariableMeta>,
}

impl MetaData {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            vars: BTreeMap::new(),
        }
    }

    pub fn with<V: Into<OptionValue>>(mut self, name: &str, units: &str, default: V, desc: &str) -> Self {
        self.vars.insert(
            name.to_string(),
            VariableMeta {
                units: units.to_string(),
                default: default.into(),
                desc: desc.to_string(),
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&VariableMeta> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Default of the provided variable, converted into the requested units.
    pub fn default_f64(&self, name: &str, units: &str) -> Result<f64, OptionsError> {
        let meta = self.get(name).context(UnknownOptionSnafu { name })?;
        let value = meta.default.as_f64().context(InvalidOptionValueSnafu {
            name,
            expected: OptionKind::Float,
            value: meta.default.to_string(),
        })?;
        Ok(value * conversion_factor(&meta.units, units).context(UnitMismatchSnafu { name, units })?)
    }
}

impl Default for MetaData {
    /// A representative single aisle transport.
    fn default() -> Self {
        Self::empty()
            .with(aircraft::WING_AREA, "ft**2", 1370.0, "reference wing area")
            .with(
                aircraft::ZERO_LIFT_DRAG_COEFF,
                "unitless",
                0.0235,
                "parasite drag coefficient of the drag polar",
            )
            .with(
                aircraft::INDUCED_DRAG_FACTOR,
                "unitless",
                0.043,
                "induced drag factor k in CD = CD0 + k CL^2",
            )
            .with(
                aircraft::ZERO_ALPHA_LIFT_COEFF,
                "unitless",
                0.25,
                "lift coefficient at zero angle of attack",
            )
            .with(aircraft::LIFT_CURVE_SLOPE, "1/rad", 5.2, "lift curve slope")
            .with(
                aircraft::MAX_THRUST,
                "lbf",
                54_000.0,
                "total sea level static thrust",
            )
            .with(
                aircraft::TSFC,
                "lbm/h/lbf",
                0.6,
                "thrust specific fuel consumption",
            )
            .with(mission::DESIGN_RANGE, "NM", 3_000.0, "design mission range")
            .with(
                mission::CRUISE_ALTITUDE,
                "ft",
                35_000.0,
                "design mission cruise altitude",
            )
            .with(mission::GROSS_MASS, "lbm", 175_000.0, "design gross mass")
            .with(mission::CRUISE_MACH, "unitless", 0.78, "design cruise Mach number")
    }
}

/// Aircraft and mission inputs, each stored as the value and units it was set with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AircraftValues {
    values: BTreeMap<String, (OptionValue, String)>,
}

impl AircraftValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_val<V: Into<OptionValue>>(&mut self, name: &str, value: V, units: &str) {
        self.values
            .insert(name.to_string(), (value.into(), units.to_string()));
    }

    /// Returns the value converted into the requested units.
    pub fn get_val(&self, name: &str, units: &str) -> Result<OptionValue, OptionsError> {
        let (value, stored_units) = self.values.get(name).context(MissingValueSnafu { name })?;
        let factor =
            conversion_factor(stored_units, units).context(UnitMismatchSnafu { name, units })?;
        Ok(value.scaled(factor))
    }

    pub fn get_f64(&self, name: &str, units: &str) -> Result<f64, OptionsError> {
        let value = self.get_val(name, units)?;
        value.as_f64().context(InvalidOptionValueSnafu {
            name,
            expected: OptionKind::Float,
            value: value.to_string(),
        })
    }

    /// Returns the value if set, else the metadata default.
    pub fn get_f64_or_default(
        &self,
        name: &str,
        units: &str,
        meta: &MetaData,
    ) -> Result<f64, OptionsError> {
        if self.contains(name) {
            self.get_f64(name, units)
        } else {
            meta.default_f64(name, units)
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &(OptionValue, String))> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Checks that every value is declared in the metadata with compatible units.
    pub fn validate(&self, meta: &MetaData) -> Result<(), OptionsError> {
        for (name, (_, units)) in &self.values {
            let Some(var) = meta.get(name) else {
                error!("`{name}` is not declared in the variable metadata");
                return UnknownOptionSnafu { name }.fail();
            };
            conversion_factor(units, &var.units).context(UnitMismatchSnafu {
                name,
                units: units.as_str(),
            })?;
        }
        Ok(())
    }
}
