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

use crate::dynamics::{DynamicsError, NodeValues, Ode};
use crate::md::transcription::{interp_tau, Grid, Transcription, TranscriptionError};
use crate::units::{conversion_factor, UnitError};
use nalgebra::DVector;
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fmt;

mod options;
pub use options::{
    ConstraintOptions, ControlOptions, Loc, ObjectiveOptions, ParameterOptions, StateOptions,
    TimeOptions,
};

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PhaseError {
    #[snafu(display("{phase}: `{name}` is already declared"))]
    DuplicateVariable { phase: String, name: String },
    #[snafu(display("{phase}: {source}"))]
    BadTranscription {
        phase: String,
        source: TranscriptionError,
    },
    #[snafu(display("{phase}: no variable named `{name}`"))]
    UnknownVariable { phase: String, name: String },
    #[snafu(display("{phase}: `{variable}` targets `{target}` which is not an input of {ode}"))]
    UnknownTarget {
        phase: String,
        variable: String,
        target: String,
        ode: String,
    },
    #[snafu(display("{phase}: state `{state}` has no {what}"))]
    MissingSource {
        phase: String,
        state: String,
        what: &'static str,
    },
    #[snafu(display("{phase}: `{source_name}` feeding `{variable}` is neither an ODE output nor a phase variable"))]
    UnknownSource {
        phase: String,
        variable: String,
        source_name: String,
    },
    #[snafu(display("{phase}: units of `{variable}` do not match its connection: {source}"))]
    IncompatibleUnits {
        phase: String,
        variable: String,
        source: UnitError,
    },
    #[snafu(display("{phase}: `{name}` expects {expected} values, got {got}"))]
    BadValueShape {
        phase: String,
        name: String,
        expected: usize,
        got: usize,
    },
    #[snafu(display("{phase}: constraint `{name}` {reason}"))]
    InvalidPhaseConstraint {
        phase: String,
        name: String,
        reason: String,
    },
    #[snafu(display("{phase} must be set up before it is evaluated"))]
    NotSetUp { phase: String },
    #[snafu(display("{phase}: ODE evaluation failed: {source}"))]
    OdeEvaluation {
        phase: String,
        source: DynamicsError,
    },
}

/// The kind of a phase variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarKind {
    Time,
    State,
    Control,
    Parameter,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time => write!(f, "time"),
            Self::State => write!(f, "state"),
            Self::Control => write!(f, "control"),
            Self::Parameter => write!(f, "parameter"),
        }
    }
}

/// Current values of the phase design variables.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseValues {
    pub t_initial: f64,
    pub t_duration: f64,
    /// Collocated states at the state input nodes, analytic states hold their initial value only.
    pub states: BTreeMap<String, DVector<f64>>,
    /// Controls at every node, or at the polynomial points of polynomial controls.
    pub controls: BTreeMap<String, DVector<f64>>,
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, PartialEq)]
enum Feed {
    Time,
    TimePhase,
    State(String),
    StateInitial(String),
    Control(String),
    ControlRate(String),
    Parameter(String),
}

#[derive(Clone, Debug, PartialEq)]
struct Wire {
    target: String,
    feed: Feed,
    factor: f64,
}

#[derive(Clone, Debug, PartialEq)]
enum RateFeed {
    Output(String),
    Control(String),
    Parameter(String),
}

#[derive(Clone, Debug, PartialEq)]
struct Wiring {
    inputs: Vec<Wire>,
    /// Rate of every collocated state, with the factor into state units per time unit.
    rates: BTreeMap<String, (RateFeed, f64)>,
    /// Output and factor of every analytic state.
    sources: BTreeMap<String, (String, f64)>,
}

/// Value of a constraint at the nodes it applies to.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintValue {
    pub name: String,
    pub values: DVector<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub equals: Option<f64>,
}

impl ConstraintValue {
    /// Largest violation of the bounds, zero when satisfied.
    pub fn violation(&self) -> f64 {
        self.values
            .iter()
            .map(|v| {
                let mut worst: f64 = 0.0;
                if let Some(eq) = self.equals {
                    worst = worst.max((v - eq).abs());
                }
                if let Some(lo) = self.lower {
                    worst = worst.max(lo - v);
                }
                if let Some(hi) = self.upper {
                    worst = worst.max(v - hi);
                }
                worst
            })
            .fold(0.0, f64::max)
    }
}

/// Result of evaluating a phase at its current values.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseEvaluation {
    pub time: DVector<f64>,
    /// States at every node, in state units.
    pub states: BTreeMap<String, DVector<f64>>,
    pub controls: BTreeMap<String, DVector<f64>>,
    pub control_rates: BTreeMap<String, DVector<f64>>,
    /// ODE outputs in the units the ODE declares.
    pub outputs: NodeValues,
    /// Collocation defects of each collocated state, in state units.
    pub defects: BTreeMap<String, DVector<f64>>,
    /// Segment boundary mismatch of each state, only for uncompressed transcriptions.
    pub continuity: BTreeMap<String, Vec<f64>>,
    pub boundary_constraints: Vec<ConstraintValue>,
    pub path_constraints: Vec<ConstraintValue>,
    pub objective: Option<f64>,
}

impl PhaseEvaluation {
    pub fn max_defect(&self) -> f64 {
        self.defects
            .values()
            .map(|d| d.amax())
            .chain(self.continuity.values().flatten().map(|c| c.abs()))
            .fold(0.0, f64::max)
    }
}

/// A discretized phase: its variables, constraints and current values.
#[derive(Debug)]
pub struct Phase {
    name: String,
    transcription: Transcription,
    grid: Grid,
    ode: Box<dyn Ode>,
    time: TimeOptions,
    states: Vec<StateOptions>,
    controls: Vec<ControlOptions>,
    parameters: Vec<ParameterOptions>,
    boundary_constraints: Vec<ConstraintOptions>,
    path_constraints: Vec<ConstraintOptions>,
    objective: Option<ObjectiveOptions>,
    values: PhaseValues,
    wiring: Option<Wiring>,
}

impl Phase {
    pub fn new(name: &str, transcription: Transcription, ode: Box<dyn Ode>) -> Result<Self, PhaseError> {
        transcription
            .validate()
            .context(BadTranscriptionSnafu { phase: name })?;
        let grid = transcription.grid();
        ensure!(
            ode.num_nodes() == grid.num_nodes(),
            BadValueShapeSnafu {
                phase: name,
                name: ode.name(),
                expected: grid.num_nodes(),
                got: ode.num_nodes(),
            }
        );
        Ok(Self {
            name: name.to_string(),
            transcription,
            grid,
            ode,
            time: TimeOptions::default(),
            states: Vec::new(),
            controls: Vec::new(),
            parameters: Vec::new(),
            boundary_constraints: Vec::new(),
            path_constraints: Vec::new(),
            objective: None,
            values: PhaseValues {
                t_initial: 0.0,
                t_duration: 1.0,
                states: BTreeMap::new(),
                controls: BTreeMap::new(),
                parameters: BTreeMap::new(),
            },
            wiring: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transcription(&self) -> &Transcription {
        &self.transcription
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn ode(&self) -> &dyn Ode {
        self.ode.as_ref()
    }

    pub fn is_analytic(&self) -> bool {
        !self.grid.collocated
    }

    pub fn time_options(&self) -> &TimeOptions {
        &self.time
    }

    pub fn states(&self) -> &[StateOptions] {
        &self.states
    }

    pub fn state(&self, name: &str) -> Option<&StateOptions> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn controls(&self) -> &[ControlOptions] {
        &self.controls
    }

    pub fn control(&self, name: &str) -> Option<&ControlOptions> {
        self.controls.iter().find(|c| c.name == name)
    }

    pub fn parameters(&self) -> &[ParameterOptions] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterOptions> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn boundary_constraints(&self) -> &[ConstraintOptions] {
        &self.boundary_constraints
    }

    pub fn path_constraints(&self) -> &[ConstraintOptions] {
        &self.path_constraints
    }

    pub fn objective(&self) -> Option<&ObjectiveOptions> {
        self.objective.as_ref()
    }

    pub fn values(&self) -> &PhaseValues {
        &self.values
    }

    pub fn is_set_up(&self) -> bool {
        self.wiring.is_some()
    }

    /// Kind of the variable with the provided name, if declared.
    pub fn var_kind(&self, name: &str) -> Option<VarKind> {
        if name == crate::variables::dynamic::TIME {
            Some(VarKind::Time)
        } else if self.state(name).is_some() {
            Some(VarKind::State)
        } else if self.control(name).is_some() {
            Some(VarKind::Control)
        } else if self.parameter(name).is_some() {
            Some(VarKind::Parameter)
        } else {
            None
        }
    }

    /// Units of a declared variable.
    pub fn var_units(&self, name: &str) -> Option<&str> {
        match self.var_kind(name)? {
            VarKind::Time => Some(self.time.units.as_str()),
            VarKind::State => self.state(name).map(|s| s.units.as_str()),
            VarKind::Control => self.control(name).map(|c| c.units.as_str()),
            VarKind::Parameter => self.parameter(name).map(|p| p.units.as_str()),
        }
    }

    fn ensure_new_name(&self, name: &str) -> Result<(), PhaseError> {
        if self.var_kind(name).is_some() {
            error!("{}: `{name}` declared twice", self.name);
            return DuplicateVariableSnafu {
                phase: &self.name,
                name,
            }
            .fail();
        }
        Ok(())
    }

    pub fn set_time_options(&mut self, options: TimeOptions) {
        self.time = options;
        self.wiring = None;
    }

    pub fn add_state(&mut self, state: StateOptions) -> Result<(), PhaseError> {
        self.ensure_new_name(&state.name)?;
        let len = if self.is_analytic() {
            1
        } else {
            self.grid.num_state_inputs
        };
        self.values
            .states
            .insert(state.name.clone(), DVector::zeros(len));
        self.states.push(state);
        self.wiring = None;
        Ok(())
    }

    pub fn add_control(&mut self, control: ControlOptions) -> Result<(), PhaseError> {
        self.ensure_new_name(&control.name)?;
        let len = match control.order {
            Some(order) => order + 1,
            None => self.grid.num_nodes(),
        };
        self.values
            .controls
            .insert(control.name.clone(), DVector::zeros(len));
        self.controls.push(control);
        self.wiring = None;
        Ok(())
    }

    pub fn add_parameter(&mut self, parameter: ParameterOptions) -> Result<(), PhaseError> {
        self.ensure_new_name(&parameter.name)?;
        self.values
            .parameters
            .insert(parameter.name.clone(), parameter.val);
        self.parameters.push(parameter);
        self.wiring = None;
        Ok(())
    }

    fn check_constraint(&self, constraint: &ConstraintOptions) -> Result<(), PhaseError> {
        let invalid = |reason: &str| PhaseError::InvalidPhaseConstraint {
            phase: self.name.clone(),
            name: constraint.name.clone(),
            reason: reason.to_string(),
        };
        if constraint.equals.is_some() && (constraint.lower.is_some() || constraint.upper.is_some())
        {
            return Err(invalid("cannot have both an equality and bounds"));
        }
        if let (Some(lo), Some(hi)) = (constraint.lower, constraint.upper) {
            if lo > hi {
                return Err(invalid("has a lower bound above its upper bound"));
            }
        }
        Ok(())
    }

    pub fn add_boundary_constraint(&mut self, constraint: ConstraintOptions) -> Result<(), PhaseError> {
        self.check_constraint(&constraint)?;
        if constraint.loc.is_none() {
            return InvalidPhaseConstraintSnafu {
                phase: &self.name,
                name: &constraint.name,
                reason: "needs a location, initial or final",
            }
            .fail();
        }
        if let Some(indices) = &constraint.indices {
            if indices.iter().any(|i| *i != 0) {
                return InvalidPhaseConstraintSnafu {
                    phase: &self.name,
                    name: &constraint.name,
                    reason: "indexes a scalar quantity beyond its first element",
                }
                .fail();
            }
        }
        self.boundary_constraints.push(constraint);
        self.wiring = None;
        Ok(())
    }

    pub fn add_path_constraint(&mut self, constraint: ConstraintOptions) -> Result<(), PhaseError> {
        self.check_constraint(&constraint)?;
        if let Some(indices) = &constraint.indices {
            if let Some(bad) = indices.iter().find(|i| **i >= self.grid.num_nodes()) {
                return InvalidPhaseConstraintSnafu {
                    phase: &self.name,
                    name: &constraint.name,
                    reason: format!("node index {bad} is out of range"),
                }
                .fail();
            }
        }
        self.path_constraints.push(constraint);
        self.wiring = None;
        Ok(())
    }

    pub fn add_objective(&mut self, objective: ObjectiveOptions) {
        self.objective = Some(objective);
        self.wiring = None;
    }

    /// Resolves the connections between the phase variables and the ODE, checking units.
    pub fn setup(&mut self) -> Result<(), PhaseError> {
        let ode_inputs = self.ode.inputs();
        let ode_outputs = self.ode.outputs();
        let input_units = |target: &str| {
            ode_inputs
                .iter()
                .find(|i| i.name == target)
                .map(|i| i.units.clone())
        };
        let output_units = |source: &str| {
            ode_outputs
                .iter()
                .find(|o| o.name == source)
                .map(|o| o.units.clone())
        };
        let phase = self.name.clone();
        let ode_name = self.ode.name().to_string();
        let factor = |variable: &str, from: &str, to: &str| {
            conversion_factor(from, to).context(IncompatibleUnitsSnafu {
                phase: &phase,
                variable,
            })
        };

        // Explicit targets must exist, implicit ones are connected when the ODE has them
        let resolve = |variable: &str,
                       explicit: &[String],
                       implicit: &str|
         -> Result<Vec<(String, String)>, PhaseError> {
            if explicit.is_empty() {
                return Ok(input_units(implicit)
                    .map(|u| vec![(implicit.to_string(), u)])
                    .unwrap_or_default());
            }
            explicit
                .iter()
                .map(|target| match input_units(target) {
                    Some(units) => Ok((target.clone(), units)),
                    None => UnknownTargetSnafu {
                        phase: &phase,
                        variable,
                        target,
                        ode: &ode_name,
                    }
                    .fail(),
                })
                .collect()
        };

        let mut wiring = Wiring {
            inputs: Vec::new(),
            rates: BTreeMap::new(),
            sources: BTreeMap::new(),
        };

        let time_name = crate::variables::dynamic::TIME;
        for (target, units) in resolve(time_name, &self.time.targets, time_name)? {
            wiring.inputs.push(Wire {
                factor: factor(time_name, &self.time.units, &units)?,
                target,
                feed: Feed::Time,
            });
        }
        let time_phase = crate::variables::dynamic::TIME_PHASE;
        if let Some(units) = input_units(time_phase) {
            wiring.inputs.push(Wire {
                factor: factor(time_phase, &self.time.units, &units)?,
                target: time_phase.to_string(),
                feed: Feed::TimePhase,
            });
        }

        for state in &self.states {
            if self.grid.collocated {
                for (target, units) in resolve(&state.name, &state.targets, &state.name)? {
                    wiring.inputs.push(Wire {
                        factor: factor(&state.name, &state.units, &units)?,
                        target,
                        feed: Feed::State(state.name.clone()),
                    });
                }
                let rate_source = state.rate_source.as_deref().context(MissingSourceSnafu {
                    phase: &phase,
                    state: &state.name,
                    what: "rate source",
                })?;
                let rate_units = format!("{}/{}", state.units, self.time.units);
                let (feed, units) = if let Some(units) = output_units(rate_source) {
                    (RateFeed::Output(rate_source.to_string()), units)
                } else if let Some(control) = self.control(rate_source) {
                    (RateFeed::Control(rate_source.to_string()), control.units.clone())
                } else if let Some(param) = self.parameter(rate_source) {
                    (RateFeed::Parameter(rate_source.to_string()), param.units.clone())
                } else {
                    error!("{phase}: rate source `{rate_source}` of `{}` not found", state.name);
                    return UnknownSourceSnafu {
                        phase: &phase,
                        variable: &state.name,
                        source_name: rate_source,
                    }
                    .fail();
                };
                let f = factor(&state.name, &units, &rate_units)?;
                wiring.rates.insert(state.name.clone(), (feed, f));
            } else {
                let source = state.source.as_deref().context(MissingSourceSnafu {
                    phase: &phase,
                    state: &state.name,
                    what: "source output",
                })?;
                let units = output_units(source).context(UnknownSourceSnafu {
                    phase: &phase,
                    variable: &state.name,
                    source_name: source,
                })?;
                let f = factor(&state.name, &units, &state.units)?;
                wiring
                    .sources
                    .insert(state.name.clone(), (source.to_string(), f));
                let initial = format!("{}_initial", state.name);
                if let Some(units) = input_units(&initial) {
                    wiring.inputs.push(Wire {
                        factor: factor(&state.name, &state.units, &units)?,
                        target: initial,
                        feed: Feed::StateInitial(state.name.clone()),
                    });
                }
            }
        }

        for control in &self.controls {
            for (target, units) in resolve(&control.name, &control.targets, &control.name)? {
                wiring.inputs.push(Wire {
                    factor: factor(&control.name, &control.units, &units)?,
                    target,
                    feed: Feed::Control(control.name.clone()),
                });
            }
            let rate_units = format!("{}/{}", control.units, self.time.units);
            let rate_name = format!("{}_rate", control.name);
            for (target, units) in resolve(&control.name, &control.rate_targets, &rate_name)? {
                wiring.inputs.push(Wire {
                    factor: factor(&rate_name, &rate_units, &units)?,
                    target,
                    feed: Feed::ControlRate(control.name.clone()),
                });
            }
        }

        for param in &self.parameters {
            for (target, units) in resolve(&param.name, &param.targets, &param.name)? {
                wiring.inputs.push(Wire {
                    factor: factor(&param.name, &param.units, &units)?,
                    target,
                    feed: Feed::Parameter(param.name.clone()),
                });
            }
        }

        // Constraint and objective quantities must be resolvable with compatible units
        let mut quantities: Vec<(&str, Option<&str>)> = self
            .boundary_constraints
            .iter()
            .chain(self.path_constraints.iter())
            .map(|c| (c.quantity(), c.units.as_deref()))
            .collect();
        if let Some(obj) = &self.objective {
            quantities.push((obj.name.as_str(), obj.units.as_deref()));
        }
        for (quantity, units) in quantities {
            let native = self
                .var_units(quantity)
                .map(|u| u.to_string())
                .or_else(|| output_units(quantity))
                .context(UnknownSourceSnafu {
                    phase: &phase,
                    variable: quantity,
                    source_name: quantity,
                })?;
            if let Some(units) = units {
                factor(quantity, &native, units)?;
            }
        }

        debug!(
            "{phase}: {} ODE connections, {} rates, {} analytic sources",
            wiring.inputs.len(),
            wiring.rates.len(),
            wiring.sources.len()
        );
        self.wiring = Some(wiring);
        Ok(())
    }

    fn check_len(&self, name: &str, expected: usize, got: usize) -> Result<(), PhaseError> {
        ensure!(
            expected == got,
            BadValueShapeSnafu {
                phase: &self.name,
                name,
                expected,
                got,
            }
        );
        Ok(())
    }

    fn var_factor(&self, name: &str, units: &str) -> Result<f64, PhaseError> {
        let native = self.var_units(name).context(UnknownVariableSnafu {
            phase: &self.name,
            name,
        })?;
        conversion_factor(units, native).context(IncompatibleUnitsSnafu {
            phase: &self.name,
            variable: name,
        })
    }

    /// Sets the initial time and duration, provided in `units`.
    pub fn set_time_val(&mut self, t_initial: f64, t_duration: f64, units: &str) -> Result<(), PhaseError> {
        let f = self.var_factor(crate::variables::dynamic::TIME, units)?;
        self.values.t_initial = t_initial * f;
        self.values.t_duration = t_duration * f;
        Ok(())
    }

    /// Sets a state from values evenly spaced over the phase, linearly interpolated.
    pub fn set_state_val(&mut self, name: &str, ys: &[f64], units: &str) -> Result<(), PhaseError> {
        if self.state(name).is_none() {
            return UnknownVariableSnafu {
                phase: &self.name,
                name,
            }
            .fail();
        }
        let f = self.var_factor(name, units)?;
        let scaled: Vec<f64> = ys.iter().map(|y| y * f).collect();
        let values = if self.is_analytic() {
            DVector::from_element(1, scaled.first().copied().unwrap_or_default())
        } else {
            interp_tau(&scaled, &self.grid.state_input_tau())
        };
        self.values.states.insert(name.to_string(), values);
        Ok(())
    }

    /// Sets the raw state values at the state input nodes, in state units.
    pub fn set_state_nodes(&mut self, name: &str, values: DVector<f64>) -> Result<(), PhaseError> {
        let expected = self
            .values
            .states
            .get(name)
            .map(|v| v.len())
            .context(UnknownVariableSnafu {
                phase: &self.name,
                name,
            })?;
        self.check_len(name, expected, values.len())?;
        self.values.states.insert(name.to_string(), values);
        Ok(())
    }

    /// Sets a control from values evenly spaced over the phase, linearly interpolated.
    pub fn set_control_val(&mut self, name: &str, ys: &[f64], units: &str) -> Result<(), PhaseError> {
        let control = self.control(name).context(UnknownVariableSnafu {
            phase: &self.name,
            name,
        })?;
        let f = self.var_factor(name, units)?;
        let scaled: Vec<f64> = ys.iter().map(|y| y * f).collect();
        let tau = match control.order {
            Some(order) => polynomial_points(order),
            None => self.grid.tau.clone(),
        };
        self.values
            .controls
            .insert(name.to_string(), interp_tau(&scaled, &tau));
        Ok(())
    }

    /// Sets the raw control values, in control units.
    pub fn set_control_nodes(&mut self, name: &str, values: DVector<f64>) -> Result<(), PhaseError> {
        let expected = self
            .values
            .controls
            .get(name)
            .map(|v| v.len())
            .context(UnknownVariableSnafu {
                phase: &self.name,
                name,
            })?;
        self.check_len(name, expected, values.len())?;
        self.values.controls.insert(name.to_string(), values);
        Ok(())
    }

    pub fn set_parameter_val(&mut self, name: &str, value: f64, units: &str) -> Result<(), PhaseError> {
        if self.parameter(name).is_none() {
            return UnknownVariableSnafu {
                phase: &self.name,
                name,
            }
            .fail();
        }
        let f = self.var_factor(name, units)?;
        self.values.parameters.insert(name.to_string(), value * f);
        Ok(())
    }

    /// Overwrites the initial value of a time, state or control, in its own units.
    pub fn set_initial_value(&mut self, name: &str, value: f64) -> Result<(), PhaseError> {
        match self.var_kind(name) {
            Some(VarKind::Time) => self.values.t_initial = value,
            Some(VarKind::State) => {
                if let Some(v) = self.values.states.get_mut(name) {
                    v[0] = value;
                }
            }
            Some(VarKind::Control) => {
                if let Some(v) = self.values.controls.get_mut(name) {
                    v[0] = value;
                }
            }
            Some(VarKind::Parameter) => {
                self.values.parameters.insert(name.to_string(), value);
            }
            None => {
                return UnknownVariableSnafu {
                    phase: &self.name,
                    name,
                }
                .fail()
            }
        }
        Ok(())
    }

    /// Value of a time, state, control or parameter at a boundary, in its own units.
    pub fn boundary_value(&self, eval: &PhaseEvaluation, name: &str, loc: Loc) -> Result<f64, PhaseError> {
        let series = match self.var_kind(name) {
            Some(VarKind::Time) => &eval.time,
            Some(VarKind::State) => eval.states.get(name).context(UnknownVariableSnafu {
                phase: &self.name,
                name,
            })?,
            Some(VarKind::Control) => eval.controls.get(name).context(UnknownVariableSnafu {
                phase: &self.name,
                name,
            })?,
            Some(VarKind::Parameter) => {
                return Ok(self.values.parameters.get(name).copied().unwrap_or_default())
            }
            None => {
                return UnknownVariableSnafu {
                    phase: &self.name,
                    name,
                }
                .fail()
            }
        };
        Ok(match loc {
            Loc::Initial => series[0],
            Loc::Final => series[series.len() - 1],
        })
    }

    /// Any named quantity at every node with its units: time, states, controls, parameters or ODE outputs.
    pub fn series(&self, eval: &PhaseEvaluation, name: &str) -> Result<(DVector<f64>, String), PhaseError> {
        let n = self.grid.num_nodes();
        let found = match self.var_kind(name) {
            Some(VarKind::Time) => Some(eval.time.clone()),
            Some(VarKind::State) => eval.states.get(name).cloned(),
            Some(VarKind::Control) => eval.controls.get(name).cloned(),
            Some(VarKind::Parameter) => self
                .values
                .parameters
                .get(name)
                .map(|v| DVector::from_element(n, *v)),
            None => None,
        };
        if let (Some(values), Some(units)) = (found, self.var_units(name)) {
            return Ok((values, units.to_string()));
        }
        let values = eval.outputs.get(name).context(UnknownVariableSnafu {
            phase: &self.name,
            name,
        })?;
        let units = self
            .ode
            .output(name)
            .map(|o| o.units)
            .unwrap_or_else(|| crate::units::UNITLESS.to_string());
        Ok((values.clone(), units))
    }

    fn series_in(&self, eval: &PhaseEvaluation, name: &str, units: Option<&str>) -> Result<DVector<f64>, PhaseError> {
        let (values, native) = self.series(eval, name)?;
        match units {
            Some(units) => {
                let f = conversion_factor(&native, units).context(IncompatibleUnitsSnafu {
                    phase: &self.name,
                    variable: name,
                })?;
                Ok(values * f)
            }
            None => Ok(values),
        }
    }

    /// Controls at every node, expanding polynomial controls.
    fn control_nodes(&self) -> BTreeMap<String, DVector<f64>> {
        self.controls
            .iter()
            .filter_map(|control| {
                let values = self.values.controls.get(&control.name)?;
                let expanded = match control.order {
                    Some(order) => {
                        let points = polynomial_points(order);
                        DVector::from_iterator(
                            self.grid.num_nodes(),
                            self.grid
                                .tau
                                .iter()
                                .map(|t| lagrange_eval(&points, values.as_slice(), *t)),
                        )
                    }
                    None => values.clone(),
                };
                Some((control.name.clone(), expanded))
            })
            .collect()
    }

    /// Runs the ODE at every node and computes the defects, constraints and objective.
    pub fn evaluate(&self) -> Result<PhaseEvaluation, PhaseError> {
        let wiring = self.wiring.as_ref().context(NotSetUpSnafu { phase: &self.name })?;
        let n = self.grid.num_nodes();
        let t0 = self.values.t_initial;
        let dt = self.values.t_duration;
        let time = self.grid.times(t0, dt);

        let mut states = BTreeMap::new();
        if self.grid.collocated {
            for (name, inputs) in &self.values.states {
                self.check_len(name, self.grid.num_state_inputs, inputs.len())?;
                states.insert(name.clone(), self.grid.expand_states(inputs));
            }
        }
        let controls = self.control_nodes();
        let control_rates: BTreeMap<String, DVector<f64>> = controls
            .iter()
            .map(|(name, values)| (name.clone(), self.grid.differentiate(values, dt)))
            .collect();

        let mut inputs = NodeValues::new();
        for wire in &wiring.inputs {
            let values = match &wire.feed {
                Feed::Time => time.clone(),
                Feed::TimePhase => time.map(|t| t - t0),
                Feed::State(name) => states.get(name).cloned().unwrap_or_else(|| DVector::zeros(n)),
                Feed::StateInitial(name) => DVector::from_element(
                    n,
                    self.values.states.get(name).map(|v| v[0]).unwrap_or_default(),
                ),
                Feed::Control(name) => controls.get(name).cloned().unwrap_or_else(|| DVector::zeros(n)),
                Feed::ControlRate(name) => control_rates
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| DVector::zeros(n)),
                Feed::Parameter(name) => DVector::from_element(
                    n,
                    self.values.parameters.get(name).copied().unwrap_or_default(),
                ),
            };
            inputs.insert(wire.target.clone(), values * wire.factor);
        }

        let outputs = self
            .ode
            .compute(&inputs)
            .context(OdeEvaluationSnafu { phase: &self.name })?;

        let mut defects = BTreeMap::new();
        let mut continuity = BTreeMap::new();
        if self.grid.collocated {
            for (name, (feed, f)) in &wiring.rates {
                let rates = match feed {
                    RateFeed::Output(output) => outputs.get(output).cloned(),
                    RateFeed::Control(control) => controls.get(control).cloned(),
                    RateFeed::Parameter(param) => self
                        .values
                        .parameters
                        .get(param)
                        .map(|v| DVector::from_element(n, *v)),
                }
                .context(UnknownSourceSnafu {
                    phase: &self.name,
                    variable: name,
                    source_name: format!("{feed:?}"),
                })? * *f;
                if let Some(x) = states.get(name) {
                    defects.insert(name.clone(), self.grid.defects(x, &rates, dt));
                }
                if let Some(inputs) = self.values.states.get(name) {
                    let residuals = self.grid.continuity_residuals(inputs);
                    if !residuals.is_empty() {
                        continuity.insert(name.clone(), residuals);
                    }
                }
            }
        } else {
            for (name, (source, f)) in &wiring.sources {
                let values = outputs.get(source).context(UnknownSourceSnafu {
                    phase: &self.name,
                    variable: name,
                    source_name: source,
                })?;
                states.insert(name.clone(), values * *f);
            }
        }

        let mut eval = PhaseEvaluation {
            time,
            states,
            controls,
            control_rates,
            outputs,
            defects,
            continuity,
            boundary_constraints: Vec::new(),
            path_constraints: Vec::new(),
            objective: None,
        };

        let mut boundary = Vec::with_capacity(self.boundary_constraints.len());
        for c in &self.boundary_constraints {
            let series = self.series_in(&eval, c.quantity(), c.units.as_deref())?;
            let value = match c.loc {
                Some(Loc::Initial) | None => series[0],
                Some(Loc::Final) => series[series.len() - 1],
            };
            boundary.push(ConstraintValue {
                name: c.name.clone(),
                values: DVector::from_element(1, value),
                lower: c.lower,
                upper: c.upper,
                equals: c.equals,
            });
        }
        let mut path = Vec::with_capacity(self.path_constraints.len());
        for c in &self.path_constraints {
            let series = self.series_in(&eval, c.quantity(), c.units.as_deref())?;
            let values = match &c.indices {
                Some(indices) => DVector::from_iterator(indices.len(), indices.iter().map(|i| series[*i])),
                None => series,
            };
            path.push(ConstraintValue {
                name: c.name.clone(),
                values,
                lower: c.lower,
                upper: c.upper,
                equals: c.equals,
            });
        }
        let objective = match &self.objective {
            Some(obj) => {
                let series = self.series_in(&eval, &obj.name, obj.units.as_deref())?;
                let value = match obj.loc {
                    Loc::Initial => series[0],
                    Loc::Final => series[series.len() - 1],
                };
                Some(value / obj.ref_value)
            }
            None => None,
        };
        eval.boundary_constraints = boundary;
        eval.path_constraints = path;
        eval.objective = objective;
        Ok(eval)
    }
}

/// Evenly spaced tau of the points defining a polynomial control.
pub(crate) fn polynomial_points(order: usize) -> Vec<f64> {
    if order == 0 {
        return vec![0.0];
    }
    (0..=order)
        .map(|i| -1.0 + 2.0 * i as f64 / order as f64)
        .collect()
}

fn lagrange_eval(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    xs.iter()
        .enumerate()
        .map(|(j, xj)| {
            let basis: f64 = xs
                .iter()
                .enumerate()
                .filter(|(k, _)| *k != j)
                .map(|(_, xk)| (x - xk) / (xj - xk))
                .product();
            ys[j] * basis
        })
        .sum()
}

#[cfg(test)]
mod ut_phase;
