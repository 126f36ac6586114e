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

//! Flattens a trajectory into the design vector and constraints of a nonlinear program.
//!
//! Design variables are stored scaled, `(value - ref0) / (ref - ref0)`, in the order they are
//! declared: per phase, the times, then every free state node, optimized control node and
//! optimized parameter.

use crate::md::phase::{Phase, PhaseError, VarKind};
use crate::md::trajectory::{Continuity, Trajectory, TrajectoryError, TrajectoryEvaluation};
use nalgebra::DVector;
use snafu::prelude::*;
use std::fmt;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum OptiError {
    #[snafu(display("design vector has {got} values, expected {expected}"))]
    DesignVectorLength { expected: usize, got: usize },
    #[snafu(display("{source}"))]
    OptiTrajectory { source: TrajectoryError },
    #[snafu(display("{source}"))]
    OptiPhase { source: PhaseError },
    #[snafu(display("no phase named {name} in the trajectory"))]
    MissingPhase { name: String },
    #[snafu(display("`{name}` of {phase} was not evaluated"))]
    MissingValue { phase: String, name: String },
    #[snafu(display("the driver stopped: {msg}"))]
    DriverFailure { msg: String },
}

/// Which value of a phase a design variable moves.
#[derive(Clone, Debug, PartialEq)]
pub enum DesignTarget {
    InitialTime,
    Duration,
    State { name: String, node: usize },
    Control { name: String, node: usize },
    Parameter { name: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct DesignVariable {
    pub phase: String,
    pub target: DesignTarget,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub ref0: f64,
    pub ref_value: f64,
}

impl DesignVariable {
    fn scale(&self) -> f64 {
        let span = self.ref_value - self.ref0;
        if span == 0.0 {
            1.0
        } else {
            span
        }
    }

    pub fn scaled(&self, value: f64) -> f64 {
        (value - self.ref0) / self.scale()
    }

    pub fn unscaled(&self, x: f64) -> f64 {
        x * self.scale() + self.ref0
    }

    /// Scaled lower and upper bounds.
    pub fn scaled_bounds(&self) -> (Option<f64>, Option<f64>) {
        (self.lower.map(|v| self.scaled(v)), self.upper.map(|v| self.scaled(v)))
    }
}

impl fmt::Display for DesignVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.target {
            DesignTarget::InitialTime => write!(f, "{}.t_initial", self.phase),
            DesignTarget::Duration => write!(f, "{}.t_duration", self.phase),
            DesignTarget::State { name, node } | DesignTarget::Control { name, node } => {
                write!(f, "{}.{name}[{node}]", self.phase)
            }
            DesignTarget::Parameter { name } => write!(f, "{}.{name}", self.phase),
        }
    }
}

/// What a block of constraint values comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintSource {
    Defect { state: String },
    Boundary { name: String },
    Path { name: String },
    Linkage {
        variable: String,
        downstream: String,
    },
}

/// A block of constraint values sharing bounds and scaling.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintBlock {
    pub phase: String,
    pub source: ConstraintSource,
    pub size: usize,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub equals: Option<f64>,
    /// Divides the raw values.
    pub ref_value: f64,
}

impl ConstraintBlock {
    pub fn is_equality(&self) -> bool {
        self.equals.is_some()
    }
}

/// The nonlinear program of a trajectory.
#[derive(Clone, Debug, Default)]
pub struct Problem {
    pub variables: Vec<DesignVariable>,
    pub constraints: Vec<ConstraintBlock>,
}

fn connected_initially(traj: &Trajectory, phase: &str, variable: &str) -> bool {
    traj.linkages().iter().any(|l| {
        l.continuity == Continuity::Connection && l.downstream == phase && l.variable == variable
    })
}

impl Problem {
    /// Declares the design variables and constraints of every phase and linkage.
    ///
    /// Values fixed by the phase options or connected from an upstream phase are not design
    /// variables.
    pub fn from_trajectory(traj: &Trajectory) -> Self {
        let mut me = Self::default();
        for phase in traj.phases() {
            me.declare_phase(traj, phase);
        }
        for linkage in traj
            .linkages()
            .iter()
            .filter(|l| l.continuity == Continuity::Constraint)
        {
            me.constraints.push(ConstraintBlock {
                phase: linkage.upstream.clone(),
                source: ConstraintSource::Linkage {
                    variable: linkage.variable.clone(),
                    downstream: linkage.downstream.clone(),
                },
                size: 1,
                lower: None,
                upper: None,
                equals: Some(0.0),
                ref_value: 1.0,
            });
        }
        info!(
            "{}: {} design variables, {} constraints",
            traj.name(),
            me.num_variables(),
            me.num_constraints()
        );
        me
    }

    fn declare_phase(&mut self, traj: &Trajectory, phase: &Phase) {
        let name = phase.name();
        let var = |target: DesignTarget, bounds: (Option<f64>, Option<f64>), refs: (f64, f64)| {
            DesignVariable {
                phase: name.to_string(),
                target,
                lower: bounds.0,
                upper: bounds.1,
                ref0: refs.0,
                ref_value: refs.1,
            }
        };

        let time = phase.time_options();
        if !time.fix_initial && !time.input_initial && !connected_initially(traj, name, "time") {
            self.variables.push(var(
                DesignTarget::InitialTime,
                time.initial_bounds,
                (0.0, time.initial_ref.unwrap_or(1.0)),
            ));
        }
        if !time.fix_duration {
            self.variables.push(var(
                DesignTarget::Duration,
                time.duration_bounds,
                (0.0, time.duration_ref.unwrap_or(1.0)),
            ));
        }

        for state in phase.states() {
            let nodes = phase.values().states.get(&state.name).map_or(0, |v| v.len());
            let pinned_initial = state.fix_initial
                || state.input_initial
                || connected_initially(traj, name, &state.name);
            let ref0 = state.ref0.unwrap_or(0.0);
            let refs = (ref0, state.ref_value.unwrap_or(ref0 + 1.0));
            for node in 0..nodes {
                let last = node + 1 == nodes && !phase.is_analytic();
                if (node == 0 && pinned_initial) || (last && state.fix_final) || !state.opt {
                    continue;
                }
                self.variables.push(var(
                    DesignTarget::State {
                        name: state.name.clone(),
                        node,
                    },
                    (state.lower, state.upper),
                    refs,
                ));
            }
            if !phase.is_analytic() {
                self.constraints.push(ConstraintBlock {
                    phase: name.to_string(),
                    source: ConstraintSource::Defect {
                        state: state.name.clone(),
                    },
                    size: phase.grid().num_collocation_nodes(),
                    lower: None,
                    upper: None,
                    equals: Some(0.0),
                    ref_value: state.defect_ref.or(state.ref_value).unwrap_or(1.0),
                });
            }
        }

        for control in phase.controls().iter().filter(|c| c.opt) {
            let nodes = phase.values().controls.get(&control.name).map_or(0, |v| v.len());
            let connected = connected_initially(traj, name, &control.name);
            let ref0 = control.ref0.unwrap_or(0.0);
            let refs = (ref0, control.ref_value.unwrap_or(ref0 + 1.0));
            for node in (0..nodes).filter(|n| !(connected && *n == 0)) {
                self.variables.push(var(
                    DesignTarget::Control {
                        name: control.name.clone(),
                        node,
                    },
                    (control.lower, control.upper),
                    refs,
                ));
            }
        }

        for parameter in phase.parameters().iter().filter(|p| p.opt) {
            self.variables.push(var(
                DesignTarget::Parameter {
                    name: parameter.name.clone(),
                },
                (parameter.lower, parameter.upper),
                (0.0, parameter.ref_value.unwrap_or(1.0)),
            ));
        }

        for constraint in phase.boundary_constraints() {
            self.constraints.push(ConstraintBlock {
                phase: name.to_string(),
                source: ConstraintSource::Boundary {
                    name: constraint.name.clone(),
                },
                size: 1,
                lower: constraint.lower,
                upper: constraint.upper,
                equals: constraint.equals,
                ref_value: constraint.ref_value.unwrap_or(1.0),
            });
        }
        for constraint in phase.path_constraints() {
            self.constraints.push(ConstraintBlock {
                phase: name.to_string(),
                source: ConstraintSource::Path {
                    name: constraint.name.clone(),
                },
                size: constraint
                    .indices
                    .as_ref()
                    .map_or(phase.grid().num_nodes(), |i| i.len()),
                lower: constraint.lower,
                upper: constraint.upper,
                equals: constraint.equals,
                ref_value: constraint.ref_value.unwrap_or(1.0),
            });
        }
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.iter().map(|c| c.size).sum()
    }

    /// Current scaled design vector of the trajectory.
    pub fn design_vector(&self, traj: &Trajectory) -> Result<DVector<f64>, OptiError> {
        let mut x = DVector::zeros(self.variables.len());
        for (i, var) in self.variables.iter().enumerate() {
            let phase = traj
                .phase(&var.phase)
                .context(MissingPhaseSnafu { name: &var.phase })?;
            let values = phase.values();
            let missing = || OptiError::MissingValue {
                phase: var.phase.clone(),
                name: var.to_string(),
            };
            let value = match &var.target {
                DesignTarget::InitialTime => values.t_initial,
                DesignTarget::Duration => values.t_duration,
                DesignTarget::State { name, node } => values
                    .states
                    .get(name)
                    .and_then(|v| v.get(*node).copied())
                    .ok_or_else(missing)?,
                DesignTarget::Control { name, node } => values
                    .controls
                    .get(name)
                    .and_then(|v| v.get(*node).copied())
                    .ok_or_else(missing)?,
                DesignTarget::Parameter { name } => {
                    values.parameters.get(name).copied().ok_or_else(missing)?
                }
            };
            x[i] = var.scaled(value);
        }
        Ok(x)
    }

    /// Writes a scaled design vector back into the phases of the trajectory.
    pub fn apply_design_vector(
        &self,
        traj: &mut Trajectory,
        x: &DVector<f64>,
    ) -> Result<(), OptiError> {
        ensure!(
            x.len() == self.variables.len(),
            DesignVectorLengthSnafu {
                expected: self.variables.len(),
                got: x.len()
            }
        );
        for (var, xi) in self.variables.iter().zip(x.iter()) {
            let phase = traj
                .phase_mut(&var.phase)
                .context(MissingPhaseSnafu { name: &var.phase })?;
            let value = var.unscaled(*xi);
            let units = phase.time_options().units.clone();
            let applied = match &var.target {
                DesignTarget::InitialTime => {
                    let dur = phase.values().t_duration;
                    phase.set_time_val(value, dur, &units)
                }
                DesignTarget::Duration => {
                    let t0 = phase.values().t_initial;
                    phase.set_time_val(t0, value, &units)
                }
                DesignTarget::State { name, node } => {
                    let Some(mut nodes) = phase.values().states.get(name).cloned() else {
                        return MissingValueSnafu {
                            phase: &var.phase,
                            name,
                        }
                        .fail();
                    };
                    if let Some(v) = nodes.get_mut(*node) {
                        *v = value;
                    }
                    phase.set_state_nodes(name, nodes)
                }
                DesignTarget::Control { name, node } => {
                    let Some(mut nodes) = phase.values().controls.get(name).cloned() else {
                        return MissingValueSnafu {
                            phase: &var.phase,
                            name,
                        }
                        .fail();
                    };
                    if let Some(v) = nodes.get_mut(*node) {
                        *v = value;
                    }
                    phase.set_control_nodes(name, nodes)
                }
                DesignTarget::Parameter { name } => match phase.var_kind(name) {
                    Some(VarKind::Parameter) => phase.set_initial_value(name, value),
                    _ => {
                        return MissingValueSnafu {
                            phase: &var.phase,
                            name,
                        }
                        .fail()
                    }
                },
            };
            applied.context(OptiPhaseSnafu)?;
        }
        Ok(())
    }

    /// Scaled constraint values, in the order of the constraint blocks.
    pub fn constraint_values(
        &self,
        traj: &Trajectory,
        eval: &TrajectoryEvaluation,
    ) -> Result<DVector<f64>, OptiError> {
        let residuals = traj.linkage_residuals(eval).context(OptiTrajectorySnafu)?;
        let mut values = Vec::with_capacity(self.num_constraints());
        for block in &self.constraints {
            let missing = |name: &str| OptiError::MissingValue {
                phase: block.phase.clone(),
                name: name.to_string(),
            };
            let phase_eval = eval
                .get(&block.phase)
                .context(MissingPhaseSnafu { name: &block.phase })?;
            let raw: Vec<f64> = match &block.source {
                ConstraintSource::Defect { state } => phase_eval
                    .defects
                    .get(state)
                    .ok_or_else(|| missing(state))?
                    .iter()
                    .copied()
                    .collect(),
                ConstraintSource::Boundary { name } => phase_eval
                    .boundary_constraints
                    .iter()
                    .find(|c| &c.name == name)
                    .ok_or_else(|| missing(name))?
                    .values
                    .iter()
                    .copied()
                    .collect(),
                ConstraintSource::Path { name } => phase_eval
                    .path_constraints
                    .iter()
                    .find(|c| &c.name == name)
                    .ok_or_else(|| missing(name))?
                    .values
                    .iter()
                    .copied()
                    .collect(),
                ConstraintSource::Linkage {
                    variable,
                    downstream,
                } => vec![residuals
                    .iter()
                    .find(|r| {
                        r.linkage.upstream == block.phase
                            && &r.linkage.downstream == downstream
                            && &r.linkage.variable == variable
                    })
                    .ok_or_else(|| missing(variable))?
                    .residual],
            };
            values.extend(raw.into_iter().map(|v| v / block.ref_value));
        }
        Ok(DVector::from_vec(values))
    }

    /// Largest unscaled violation of every constraint block.
    pub fn max_violation(
        &self,
        traj: &Trajectory,
        eval: &TrajectoryEvaluation,
    ) -> Result<f64, OptiError> {
        let values = self.constraint_values(traj, eval)?;
        let mut offset = 0;
        let mut worst: f64 = 0.0;
        for block in &self.constraints {
            for v in values.rows(offset, block.size).iter() {
                let v = v * block.ref_value;
                if let Some(eq) = block.equals {
                    worst = worst.max((v - eq).abs());
                }
                if let Some(lo) = block.lower {
                    worst = worst.max(lo - v);
                }
                if let Some(hi) = block.upper {
                    worst = worst.max(v - hi);
                }
            }
            offset += block.size;
        }
        Ok(worst)
    }

    /// Sum of the objectives of every phase.
    pub fn objective(&self, eval: &TrajectoryEvaluation) -> f64 {
        eval.phases.iter().filter_map(|(_, e)| e.objective).sum()
    }
}

/// Outcome of a driver run.
#[derive(Clone, Debug)]
pub struct NlpSolution {
    /// Scaled design vector, already applied to the trajectory.
    pub x: DVector<f64>,
    pub objective: f64,
    pub max_violation: f64,
    pub iterations: usize,
    pub converged: bool,
    pub computation_dur: Duration,
}

impl fmt::Display for NlpSolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} after {} iterations ({:?}): objective = {:.6e}, max violation = {:.3e}",
            if self.converged {
                "converged"
            } else {
                "NOT converged"
            },
            self.iterations,
            self.computation_dur,
            self.objective,
            self.max_violation
        )
    }
}

/// A nonlinear programming solver driving a trajectory.
pub trait NlpDriver {
    fn solve(&mut self, problem: &Problem, traj: &mut Trajectory) -> Result<NlpSolution, OptiError>;
}

#[cfg(test)]
mod ut_opti;
