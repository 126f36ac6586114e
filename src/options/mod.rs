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

use crate::units::{conversion_factor, UnitError, UNITLESS};
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use typed_builder::TypedBuilder;

mod aircraft;
pub use aircraft::{AircraftValues, MetaData, VariableMeta, DEFAULT_META_DATA};

/// Errors raised by the options model and the aircraft value store.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum OptionsError {
    #[snafu(display("unknown option `{name}`"))]
    UnknownOption { name: String },
    #[snafu(display("option `{name}` cannot be expressed in `{units}`: {source}"))]
    UnitMismatch {
        name: String,
        units: String,
        source: UnitError,
    },
    #[snafu(display("option `{name}` expects {expected} but got `{value}`"))]
    InvalidOptionValue {
        name: String,
        expected: OptionKind,
        value: String,
    },
    #[snafu(display("no value set for `{name}`"))]
    MissingValue { name: String },
}

/// A dynamically typed option value, as found in a phase description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<OptionValue>),
    Map(BTreeMap<String, OptionValue>),
}

impl OptionValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns this value as a float, integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[OptionValue]> {
        match self {
            Self::Seq(s) => Some(s.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, OptionValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns this value as a list of floats: a scalar is a list of one, nulls are skipped.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Self::Seq(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| item.as_f64())
                .collect(),
            other => other.as_f64().map(|v| vec![v]),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Multiplies every number in this value by `factor`, recursing into sequences.
    ///
    /// Nulls, flags, strings and mappings are returned unchanged. Integers are kept as integers
    /// when the factor is exactly one.
    pub fn scaled(&self, factor: f64) -> Self {
        match self {
            Self::Int(i) if factor != 1.0 => Self::Float(*i as f64 * factor),
            Self::Float(f) => Self::Float(f * factor),
            Self::Seq(items) => Self::Seq(items.iter().map(|item| item.scaled(factor)).collect()),
            other => other.clone(),
        }
    }
}

impl Default for OptionValue {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Seq(items) => {
                let parts: Vec<String> = items.iter().map(|i| format!("{i}")).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<usize> for OptionValue {
    fn from(value: usize) -> Self {
        Self::Int(value as i64)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<OptionValue>> From<Option<T>> for OptionValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

impl<T: Into<OptionValue>> From<Vec<T>> for OptionValue {
    fn from(value: Vec<T>) -> Self {
        Self::Seq(value.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<OptionValue>, B: Into<OptionValue>> From<(A, B)> for OptionValue {
    fn from(value: (A, B)) -> Self {
        Self::Seq(vec![value.0.into(), value.1.into()])
    }
}

impl From<BTreeMap<String, OptionValue>> for OptionValue {
    fn from(value: BTreeMap<String, OptionValue>) -> Self {
        Self::Map(value)
    }
}

/// A user option as written in a phase description: either `[value, units]` or a bare value.
///
/// A bare value is equivalent to `[value, "unitless"]`, and so is a null unit.
/// A bare two element list whose second item is a string or null is read as `[value, units]`,
/// so bounds with an open upper end must spell their units out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserOption {
    WithUnits(OptionValue, Option<String>),
    Bare(OptionValue),
}

impl UserOption {
    pub fn new<V: Into<OptionValue>>(value: V, units: &str) -> Self {
        Self::WithUnits(value.into(), Some(units.to_string()))
    }

    pub fn bare<V: Into<OptionValue>>(value: V) -> Self {
        Self::Bare(value.into())
    }

    pub fn value(&self) -> &OptionValue {
        match self {
            Self::WithUnits(v, _) | Self::Bare(v) => v,
        }
    }

    pub fn units(&self) -> &str {
        match self {
            Self::WithUnits(_, Some(units)) => units.as_str(),
            _ => UNITLESS,
        }
    }

    /// Returns the `[value, units]` form of this option.
    pub fn normalized(&self) -> Self {
        Self::WithUnits(self.value().clone(), Some(self.units().to_string()))
    }

    pub fn is_normalized(&self) -> bool {
        matches!(self, Self::WithUnits(_, Some(_)))
    }
}

/// The shape of value an option accepts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    /// A float or null.
    Float,
    /// A `[lower, upper]` pair where either end may be null.
    Bounds,
    FloatSeq,
    /// A single integer or one integer per entry, e.g. one collocation order per segment.
    IntOrIntSeq,
    /// A flag applied to every variable or a mapping from variable name to flag.
    BoolOrBoolMap,
    /// A string or null.
    Str,
    Map,
    Any,
}

impl OptionKind {
    pub fn accepts(&self, value: &OptionValue) -> bool {
        use OptionValue as V;
        match self {
            Self::Bool => matches!(value, V::Bool(_)),
            Self::Int => matches!(value, V::Int(_)),
            Self::Float => matches!(value, V::Int(_) | V::Float(_) | V::Null),
            Self::Bounds => match value {
                V::Seq(items) => {
                    items.len() == 2
                        && items
                            .iter()
                            .all(|item| matches!(item, V::Null | V::Int(_) | V::Float(_)))
                }
                _ => false,
            },
            Self::FloatSeq => match value {
                V::Seq(items) => items.iter().all(|item| item.is_numeric()),
                _ => false,
            },
            Self::IntOrIntSeq => match value {
                V::Int(i) => *i >= 0,
                V::Seq(items) => items.iter().all(|item| matches!(item, V::Int(i) if *i >= 0)),
                _ => false,
            },
            Self::BoolOrBoolMap => match value {
                V::Bool(_) => true,
                V::Map(map) => map.values().all(|v| matches!(v, V::Bool(_))),
                _ => false,
            },
            Self::Str => matches!(value, V::Str(_) | V::Null),
            Self::Map => matches!(value, V::Map(_)),
            Self::Any => true,
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Bool => "a boolean",
            Self::Int => "an integer",
            Self::Float => "a number or null",
            Self::Bounds => "a [lower, upper] pair",
            Self::FloatSeq => "a list of numbers",
            Self::IntOrIntSeq => "a non-negative integer or a list of them",
            Self::BoolOrBoolMap => "a boolean or a mapping of names to booleans",
            Self::Str => "a string or null",
            Self::Map => "a mapping",
            Self::Any => "any value",
        };
        write!(f, "{repr}")
    }
}

/// Declaration of a single option: its default, accepted shape and native units.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
#[builder(doc)]
pub struct OptionMeta {
    #[builder(setter(into))]
    pub name: String,
    #[builder(setter(into))]
    pub default: OptionValue,
    pub kind: OptionKind,
    /// Native units, every value is stored in these units.
    #[builder(default = UNITLESS.to_string(), setter(into))]
    pub units: String,
    #[builder(default, setter(into))]
    pub desc: String,
}

/// An ordered set of option declarations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptionsSchema {
    entries: Vec<OptionMeta>,
}

impl OptionsSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option declaration, replacing any earlier declaration of the same name in place.
    pub fn declare(mut self, meta: OptionMeta) -> Self {
        match self.entries.iter_mut().find(|e| e.name == meta.name) {
            Some(existing) => *existing = meta,
            None => self.entries.push(meta),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&OptionMeta> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionMeta> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Options shared by every phase kind: transcription, time handling and user constraints.
    pub fn phase_base() -> Self {
        let open = || OptionValue::Seq(vec![OptionValue::Null, OptionValue::Null]);
        Self::new()
            .declare(
                OptionMeta::builder()
                    .name("num_segments")
                    .default(5)
                    .kind(OptionKind::Int)
                    .desc("number of collocation segments")
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("order")
                    .default(3)
                    .kind(OptionKind::IntOrIntSeq)
                    .desc("collocation order, for every segment or per segment")
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("fix_initial")
                    .default(false)
                    .kind(OptionKind::BoolOrBoolMap)
                    .desc("fix the initial time and states, or only those named")
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("fix_final")
                    .default(false)
                    .kind(OptionKind::BoolOrBoolMap)
                    .desc("fix the final states, or only those named")
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("fix_duration")
                    .default(false)
                    .kind(OptionKind::Bool)
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("input_initial")
                    .default(false)
                    .kind(OptionKind::Bool)
                    .desc("the initial time is connected from elsewhere")
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("initial_bounds")
                    .default(open())
                    .kind(OptionKind::Bounds)
                    .units("s")
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("initial_ref")
                    .default(1.0)
                    .kind(OptionKind::Float)
                    .units("s")
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("duration_bounds")
                    .default(open())
                    .kind(OptionKind::Bounds)
                    .units("s")
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("duration_ref")
                    .default(1.0)
                    .kind(OptionKind::Float)
                    .units("s")
                    .build(),
            )
            .declare(
                OptionMeta::builder()
                    .name("constraints")
                    .default(OptionValue::Map(BTreeMap::new()))
                    .kind(OptionKind::Map)
                    .desc("user defined boundary and path constraints")
                    .build(),
            )
    }
}

/// Validated options of a single phase, stored in their native units.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseOptions {
    schema: OptionsSchema,
    values: BTreeMap<String, OptionValue>,
    explicit: BTreeMap<String, UserOption>,
}

impl PhaseOptions {
    /// Builds the options from a partial mapping, every missing option takes its default.
    pub fn new(
        schema: &OptionsSchema,
        partial: &BTreeMap<String, UserOption>,
    ) -> Result<Self, OptionsError> {
        let mut me = Self {
            schema: schema.clone(),
            values: schema
                .iter()
                .map(|meta| (meta.name.clone(), meta.default.clone()))
                .collect(),
            explicit: BTreeMap::new(),
        };
        for (name, option) in partial {
            me.set(name, option.clone())?;
        }
        Ok(me)
    }

    /// Sets an option from a user value, converting it into the native units.
    pub fn set(&mut self, name: &str, option: UserOption) -> Result<(), OptionsError> {
        let meta = self.meta(name)?;
        if !meta.kind.accepts(option.value()) {
            error!("option `{name}` rejected value {}", option.value());
            return Err(OptionsError::InvalidOptionValue {
                name: name.to_string(),
                expected: meta.kind,
                value: option.value().to_string(),
            });
        }
        let factor = conversion_factor(option.units(), &meta.units).context(UnitMismatchSnafu {
            name,
            units: option.units(),
        })?;
        let native = option.value().scaled(factor);
        debug!("option `{name}` = {native} {}", meta.units);
        self.values.insert(name.to_string(), native);
        self.explicit.insert(name.to_string(), option.normalized());
        Ok(())
    }

    pub fn schema(&self) -> &OptionsSchema {
        &self.schema
    }

    fn meta(&self, name: &str) -> Result<&OptionMeta, OptionsError> {
        match self.schema.get(name) {
            Some(meta) => Ok(meta),
            None => {
                error!("unknown option `{name}`");
                UnknownOptionSnafu { name }.fail()
            }
        }
    }

    /// Native units of the provided option.
    pub fn units_of(&self, name: &str) -> Result<&str, OptionsError> {
        Ok(self.meta(name)?.units.as_str())
    }

    /// Returns the value in native units.
    pub fn get(&self, name: &str) -> Result<&OptionValue, OptionsError> {
        self.meta(name)?;
        self.values.get(name).context(MissingValueSnafu { name })
    }

    /// Returns the value converted into the requested units.
    pub fn get_in(&self, name: &str, units: &str) -> Result<OptionValue, OptionsError> {
        let meta = self.meta(name)?;
        let factor =
            conversion_factor(&meta.units, units).context(UnitMismatchSnafu { name, units })?;
        Ok(self.get(name)?.scaled(factor))
    }

    fn invalid(&self, name: &str, expected: OptionKind) -> OptionsError {
        OptionsError::InvalidOptionValue {
            name: name.to_string(),
            expected,
            value: self
                .values
                .get(name)
                .map(|v| v.to_string())
                .unwrap_or_default(),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, OptionsError> {
        self.get(name)?
            .as_bool()
            .ok_or_else(|| self.invalid(name, OptionKind::Bool))
    }

    /// Returns the flag of `var` from an option which is either a flag or a mapping of flags.
    pub fn get_flag_for(&self, name: &str, var: &str) -> Result<bool, OptionsError> {
        match self.get(name)? {
            OptionValue::Bool(b) => Ok(*b),
            OptionValue::Map(map) => Ok(map.get(var).and_then(|v| v.as_bool()).unwrap_or(false)),
            _ => Err(self.invalid(name, OptionKind::BoolOrBoolMap)),
        }
    }

    /// Returns a scalar converted into the requested units, `None` if the option is null.
    pub fn get_f64_in(&self, name: &str, units: &str) -> Result<Option<f64>, OptionsError> {
        match self.get_in(name, units)? {
            OptionValue::Null => Ok(None),
            value => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(name, OptionKind::Float)),
        }
    }

    /// Returns a scalar in its native units.
    pub fn get_f64(&self, name: &str) -> Result<Option<f64>, OptionsError> {
        let units = self.units_of(name)?.to_string();
        self.get_f64_in(name, &units)
    }

    pub fn get_usize(&self, name: &str) -> Result<usize, OptionsError> {
        match self.get(name)?.as_i64() {
            Some(i) if i >= 0 => Ok(i as usize),
            _ => Err(self.invalid(name, OptionKind::Int)),
        }
    }

    /// Returns an integer list, a single integer is returned as a list of one.
    pub fn get_usize_list(&self, name: &str) -> Result<Vec<usize>, OptionsError> {
        match self.get(name)? {
            OptionValue::Int(i) if *i >= 0 => Ok(vec![*i as usize]),
            OptionValue::Seq(items) => items
                .iter()
                .map(|item| match item.as_i64() {
                    Some(i) if i >= 0 => Ok(i as usize),
                    _ => Err(self.invalid(name, OptionKind::IntOrIntSeq)),
                })
                .collect(),
            _ => Err(self.invalid(name, OptionKind::IntOrIntSeq)),
        }
    }

    /// Returns a `(lower, upper)` pair converted into the requested units.
    pub fn get_bounds_in(
        &self,
        name: &str,
        units: &str,
    ) -> Result<(Option<f64>, Option<f64>), OptionsError> {
        match self.get_in(name, units)? {
            OptionValue::Seq(items) if items.len() == 2 => Ok((items[0].as_f64(), items[1].as_f64())),
            _ => Err(self.invalid(name, OptionKind::Bounds)),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<Option<&str>, OptionsError> {
        match self.get(name)? {
            OptionValue::Null => Ok(None),
            OptionValue::Str(s) => Ok(Some(s.as_str())),
            _ => Err(self.invalid(name, OptionKind::Str)),
        }
    }

    pub fn get_map(&self, name: &str) -> Result<&BTreeMap<String, OptionValue>, OptionsError> {
        self.get(name)?
            .as_map()
            .ok_or_else(|| self.invalid(name, OptionKind::Map))
    }

    /// Whether this option was provided by the user rather than defaulted.
    pub fn is_explicit(&self, name: &str) -> bool {
        self.explicit.contains_key(name)
    }

    /// Returns the user provided options, each as `[value, units]` exactly as given.
    pub fn to_phase_info(&self) -> BTreeMap<String, UserOption> {
        self.explicit.clone()
    }
}
