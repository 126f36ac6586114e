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

use crate::units::UNITLESS;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use typed_builder::TypedBuilder;

/// Location of a boundary value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loc {
    Initial,
    Final,
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Final => write!(f, "final"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, TypedBuilder)]
#[builder(doc)]
pub struct TimeOptions {
    #[builder(default)]
    pub fix_initial: bool,
    #[builder(default)]
    pub fix_duration: bool,
    /// The initial time is connected from another phase.
    #[builder(default)]
    pub input_initial: bool,
    #[builder(default)]
    pub initial_bounds: (Option<f64>, Option<f64>),
    #[builder(default)]
    pub duration_bounds: (Option<f64>, Option<f64>),
    #[builder(default, setter(strip_option))]
    pub initial_ref: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub duration_ref: Option<f64>,
    #[builder(default = "s".to_string(), setter(into))]
    pub units: String,
    /// ODE inputs fed with the time, defaults to `time` when the ODE has such an input.
    #[builder(default)]
    pub targets: Vec<String>,
}

impl Default for TimeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Declaration of a state of a phase.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
#[builder(doc)]
pub struct StateOptions {
    #[builder(setter(into))]
    pub name: String,
    #[builder(setter(into))]
    pub units: String,
    #[builder(default, setter(strip_option))]
    pub lower: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub upper: Option<f64>,
    /// Value scaled to one
    #[builder(default, setter(strip_option))]
    pub ref_value: Option<f64>,
    /// Value scaled to zero
    #[builder(default, setter(strip_option))]
    pub ref0: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub defect_ref: Option<f64>,
    #[builder(default)]
    pub fix_initial: bool,
    #[builder(default)]
    pub fix_final: bool,
    /// The initial value is connected from another phase.
    #[builder(default)]
    pub input_initial: bool,
    /// ODE output, control or parameter providing the time derivative of a collocated state.
    #[builder(default, setter(strip_option, into))]
    pub rate_source: Option<String>,
    /// ODE output providing the value of a state in an analytic phase.
    #[builder(default, setter(strip_option, into))]
    pub source: Option<String>,
    #[builder(default)]
    pub targets: Vec<String>,
    #[builder(default = true)]
    pub opt: bool,
}

/// Declaration of a control of a phase.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
#[builder(doc)]
pub struct ControlOptions {
    #[builder(setter(into))]
    pub name: String,
    #[builder(default = UNITLESS.to_string(), setter(into))]
    pub units: String,
    #[builder(default, setter(strip_option))]
    pub lower: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub upper: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub ref_value: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub ref0: Option<f64>,
    #[builder(default = true)]
    pub opt: bool,
    #[builder(default)]
    pub targets: Vec<String>,
    /// ODE inputs fed with the time derivative, defaults to `<name>_rate` when the ODE has it.
    #[builder(default)]
    pub rate_targets: Vec<String>,
    /// Polynomial order when the control is a single polynomial over the whole phase.
    #[builder(default, setter(strip_option))]
    pub order: Option<usize>,
}

/// Declaration of a parameter, constant over the phase.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
#[builder(doc)]
pub struct ParameterOptions {
    #[builder(setter(into))]
    pub name: String,
    #[builder(default = UNITLESS.to_string(), setter(into))]
    pub units: String,
    #[builder(default)]
    pub val: f64,
    #[builder(default)]
    pub opt: bool,
    #[builder(default, setter(strip_option))]
    pub lower: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub upper: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub ref_value: Option<f64>,
    #[builder(default)]
    pub targets: Vec<String>,
}

/// A boundary or path constraint on a phase quantity.
///
/// `name` is the name the constraint is known by, `target` the constrained quantity when it
/// differs from the name.
#[derive(Clone, Debug, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[builder(doc)]
#[serde(deny_unknown_fields)]
pub struct ConstraintOptions {
    #[builder(setter(into))]
    pub name: String,
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Required for boundary constraints.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Loc>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<f64>,
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_value: Option<f64>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref0: Option<f64>,
    /// Nodes a path constraint applies to, every node if unset.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<Vec<usize>>,
    #[builder(default)]
    #[serde(default)]
    pub linear: bool,
}

impl ConstraintOptions {
    /// The constrained quantity.
    pub fn quantity(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.name)
    }
}

/// The quantity minimized by the problem, taken at a boundary of a phase.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
#[builder(doc)]
pub struct ObjectiveOptions {
    #[builder(setter(into))]
    pub name: String,
    #[builder(default = Loc::Final)]
    pub loc: Loc,
    #[builder(default = 1.0)]
    pub ref_value: f64,
    #[builder(default, setter(strip_option, into))]
    pub units: Option<String>,
}
