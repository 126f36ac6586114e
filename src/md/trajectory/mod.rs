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

use crate::md::builder::{BuilderError, PhaseBuilder, RegistryError};
use crate::md::guesses::GuessError;
use crate::md::phase::{Loc, Phase, PhaseError, PhaseEvaluation, VarKind};
use crate::options::OptionsError;
use crate::units::{conversion_factor, UnitError};
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt;

mod parameterization;

pub use parameterization::{
    height_energy_parameterization, two_dof_parameterization, MissionBuilder, ParameterizedMission,
};

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TrajectoryError {
    #[snafu(display("phase {name} is already part of the trajectory"))]
    DuplicatePhase { name: String },
    #[snafu(display("no phase named {name} in the trajectory"))]
    UnknownPhase { name: String },
    #[snafu(display("cannot link `{variable}` from {upstream} to {downstream}: {reason}"))]
    PhaseLinkage {
        upstream: String,
        downstream: String,
        variable: String,
        reason: String,
    },
    #[snafu(display(
        "`{variable}` is discontinuous from {upstream} ({upstream_value}) to {downstream} ({downstream_value})"
    ))]
    Discontinuity {
        upstream: String,
        downstream: String,
        variable: String,
        upstream_value: f64,
        downstream_value: f64,
    },
    #[snafu(display("{source}"))]
    TrajectoryPhase { source: PhaseError },
    #[snafu(display("{source}"))]
    TrajectoryBuilder { source: BuilderError },
    #[snafu(display("{source}"))]
    TrajectoryRegistry { source: RegistryError },
    #[snafu(display("mission parameterization failed: {source}"))]
    Parameterization { source: OptionsError },
    #[snafu(display("cannot parameterize the `{key}` guess: {source}"))]
    GuessParameterization { key: String, source: GuessError },
    #[snafu(display("cannot parameterize the `{key}` guess: {source}"))]
    GuessUnits { key: String, source: UnitError },
}

/// How a variable is carried from one phase to the next.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Connected when the downstream start is fixed, constrained when the upstream end is fixed.
    Auto,
    /// The downstream initial value is the upstream final value.
    Connected,
    /// The optimizer must drive the upstream final value and the downstream initial value together.
    Constrained,
}

/// How a linkage was resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Continuity {
    Connection,
    Constraint,
}

impl fmt::Display for Continuity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Constraint => write!(f, "constraint"),
        }
    }
}

/// A variable linked between the end of a phase and the start of a later one.
#[derive(Clone, Debug, PartialEq)]
pub struct Linkage {
    pub upstream: String,
    pub downstream: String,
    pub variable: String,
    pub continuity: Continuity,
    /// Converts the upstream value into the downstream units.
    pub factor: f64,
}

/// `upstream final - downstream initial`, in the downstream units.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkageResidual {
    pub linkage: Linkage,
    pub upstream_value: f64,
    pub downstream_value: f64,
    pub residual: f64,
}

/// Evaluation of every phase, in flight order.
#[derive(Clone, Debug)]
pub struct TrajectoryEvaluation {
    pub phases: Vec<(String, PhaseEvaluation)>,
}

impl TrajectoryEvaluation {
    pub fn get(&self, name: &str) -> Option<&PhaseEvaluation> {
        self.phases.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }
}

/// Whether a variable is pinned at the start and at the end of a phase.
struct Endpoint {
    units: String,
    fixed_initial: bool,
    fixed_final: bool,
}

/// Phases flown in order and the linkages between them.
#[derive(Debug)]
pub struct Trajectory {
    name: String,
    phases: Vec<Phase>,
    linkages: Vec<Linkage>,
}

impl Trajectory {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            phases: Vec::new(),
            linkages: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a phase, phases are flown in the order they are added.
    pub fn add_phase(&mut self, phase: Phase) -> Result<(), TrajectoryError> {
        ensure!(
            self.index_of(phase.name()).is_none(),
            DuplicatePhaseSnafu { name: phase.name() }
        );
        self.phases.push(phase);
        Ok(())
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.name()).collect()
    }

    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name() == name)
    }

    pub fn phase_mut(&mut self, name: &str) -> Option<&mut Phase> {
        self.phases.iter_mut().find(|p| p.name() == name)
    }

    pub fn linkages(&self) -> &[Linkage] {
        &self.linkages
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name() == name)
    }

    fn endpoint(phase: &Phase, variable: &str) -> Option<Endpoint> {
        let units = phase.var_units(variable)?.to_string();
        let (fixed_initial, fixed_final) = match phase.var_kind(variable)? {
            VarKind::Time => {
                let time = phase.time_options();
                let fixed_initial = time.fix_initial || time.input_initial;
                (fixed_initial, fixed_initial && time.fix_duration)
            }
            VarKind::State => {
                let state = phase.state(variable)?;
                (state.fix_initial || state.input_initial, state.fix_final)
            }
            VarKind::Control => {
                let control = phase.control(variable)?;
                (!control.opt, !control.opt)
            }
            VarKind::Parameter => return None,
        };
        Some(Endpoint {
            units,
            fixed_initial,
            fixed_final,
        })
    }

    /// Links every variable of `variables` between each consecutive pair of `names`.
    ///
    /// Linked variables must be the time, a state or a control of both phases, in compatible units.
    /// A downstream start can only be connected once.
    pub fn link_phases(
        &mut self,
        names: &[&str],
        variables: &[&str],
        mode: LinkMode,
    ) -> Result<(), TrajectoryError> {
        for pair in names.windows(2) {
            let (upstream, downstream) = (pair[0], pair[1]);
            let up_idx = self
                .index_of(upstream)
                .context(UnknownPhaseSnafu { name: upstream })?;
            let down_idx = self
                .index_of(downstream)
                .context(UnknownPhaseSnafu { name: downstream })?;
            for variable in variables {
                let linkage_error = |reason: &str| TrajectoryError::PhaseLinkage {
                    upstream: upstream.to_string(),
                    downstream: downstream.to_string(),
                    variable: variable.to_string(),
                    reason: reason.to_string(),
                };
                if up_idx >= down_idx {
                    return Err(linkage_error("the upstream phase must be flown first"));
                }
                let up = Self::endpoint(&self.phases[up_idx], variable)
                    .ok_or_else(|| linkage_error("not a time, state or control of the upstream phase"))?;
                let down = Self::endpoint(&self.phases[down_idx], variable).ok_or_else(|| {
                    linkage_error("not a time, state or control of the downstream phase")
                })?;
                let factor = conversion_factor(&up.units, &down.units)
                    .map_err(|e| linkage_error(&e.to_string()))?;

                let continuity = match mode {
                    LinkMode::Auto if down.fixed_initial => Continuity::Connection,
                    LinkMode::Auto if up.fixed_final => Continuity::Constraint,
                    LinkMode::Auto => {
                        return Err(linkage_error(
                            "both ends are free, fix the downstream start or the upstream end",
                        ))
                    }
                    LinkMode::Connected => Continuity::Connection,
                    LinkMode::Constrained if up.fixed_final && down.fixed_initial => {
                        return Err(linkage_error(
                            "both ends are fixed, the constraint could never be satisfied",
                        ))
                    }
                    LinkMode::Constrained => Continuity::Constraint,
                };
                if continuity == Continuity::Connection
                    && self.linkages.iter().any(|l| {
                        l.downstream == downstream
                            && l.variable == *variable
                            && l.continuity == Continuity::Connection
                    })
                {
                    return Err(linkage_error("the downstream start is already connected"));
                }

                info!(
                    "{}: `{variable}` {upstream} -> {downstream} by {continuity}",
                    self.name
                );
                self.linkages.push(Linkage {
                    upstream: upstream.to_string(),
                    downstream: downstream.to_string(),
                    variable: variable.to_string(),
                    continuity,
                    factor,
                });
            }
        }
        Ok(())
    }

    /// Links consecutive phases on the variables both of their kinds share.
    ///
    /// A variable either kind constrains is constrained, every other one is connected.
    pub fn link_mission_phases(&mut self, builders: &[PhaseBuilder]) -> Result<(), TrajectoryError> {
        for pair in builders.windows(2) {
            let upstream = pair[0]
                .kind()
                .linked_variables(&pair[0])
                .context(TrajectoryBuilderSnafu)?;
            let downstream = pair[1]
                .kind()
                .linked_variables(&pair[1])
                .context(TrajectoryBuilderSnafu)?;
            let names = [pair[0].name.as_str(), pair[1].name.as_str()];
            for (variable, mode) in &downstream {
                let Some((_, up_mode)) = upstream.iter().find(|(v, _)| v == variable) else {
                    continue;
                };
                let mode = if *mode == LinkMode::Constrained || *up_mode == LinkMode::Constrained {
                    LinkMode::Constrained
                } else {
                    *mode
                };
                self.link_phases(&names, &[variable.as_str()], mode)?;
            }
        }
        Ok(())
    }

    /// Sets up every phase which is not already.
    pub fn setup(&mut self) -> Result<(), TrajectoryError> {
        for phase in self.phases.iter_mut().filter(|p| !p.is_set_up()) {
            phase.setup().context(TrajectoryPhaseSnafu)?;
        }
        Ok(())
    }

    /// Evaluates the phases in flight order, copying every connected value into its downstream
    /// phase before that phase is evaluated.
    pub fn evaluate(&mut self) -> Result<TrajectoryEvaluation, TrajectoryError> {
        self.setup()?;
        let mut phases: Vec<(String, PhaseEvaluation)> = Vec::with_capacity(self.phases.len());
        for idx in 0..self.phases.len() {
            let name = self.phases[idx].name().to_string();
            let incoming: Vec<(String, f64)> = self
                .linkages
                .iter()
                .filter(|l| l.downstream == name && l.continuity == Continuity::Connection)
                .map(|l| -> Result<(String, f64), TrajectoryError> {
                    let (up_idx, eval) = phases
                        .iter()
                        .enumerate()
                        .find(|(_, (n, _))| *n == l.upstream)
                        .map(|(i, (_, e))| (i, e))
                        .context(UnknownPhaseSnafu {
                            name: l.upstream.as_str(),
                        })?;
                    let value = self.phases[up_idx]
                        .boundary_value(eval, &l.variable, Loc::Final)
                        .context(TrajectoryPhaseSnafu)?;
                    Ok((l.variable.clone(), value * l.factor))
                })
                .collect::<Result<_, _>>()?;

            let phase = &mut self.phases[idx];
            for (variable, value) in incoming {
                debug!("{}.{name}: initial `{variable}` = {value}", self.name);
                phase
                    .set_initial_value(&variable, value)
                    .context(TrajectoryPhaseSnafu)?;
            }
            let eval = phase.evaluate().context(TrajectoryPhaseSnafu)?;
            phases.push((name, eval));
        }
        Ok(TrajectoryEvaluation { phases })
    }

    /// Residual of every linkage.
    pub fn linkage_residuals(
        &self,
        eval: &TrajectoryEvaluation,
    ) -> Result<Vec<LinkageResidual>, TrajectoryError> {
        self.linkages
            .iter()
            .map(|l| -> Result<LinkageResidual, TrajectoryError> {
                let value_at = |name: &str, loc: Loc| -> Result<f64, TrajectoryError> {
                    let phase = self.phase(name).context(UnknownPhaseSnafu { name })?;
                    let phase_eval = eval.get(name).context(UnknownPhaseSnafu { name })?;
                    phase
                        .boundary_value(phase_eval, &l.variable, loc)
                        .context(TrajectoryPhaseSnafu)
                };
                let upstream_value = value_at(&l.upstream, Loc::Final)? * l.factor;
                let downstream_value = value_at(&l.downstream, Loc::Initial)?;
                Ok(LinkageResidual {
                    linkage: l.clone(),
                    upstream_value,
                    downstream_value,
                    residual: upstream_value - downstream_value,
                })
            })
            .collect()
    }

    /// Checks that every connected value is continuous within the relative tolerance.
    ///
    /// Constrained linkages are only continuous once the problem is solved and are not checked.
    pub fn check_continuity(
        &self,
        eval: &TrajectoryEvaluation,
        rtol: f64,
    ) -> Result<(), TrajectoryError> {
        for r in self.linkage_residuals(eval)? {
            if r.linkage.continuity != Continuity::Connection {
                continue;
            }
            let scale = r.upstream_value.abs().max(r.downstream_value.abs()).max(1.0);
            if r.residual.abs() > rtol * scale {
                error!(
                    "{}: `{}` jumps by {} from {} to {}",
                    self.name, r.linkage.variable, r.residual, r.linkage.upstream, r.linkage.downstream
                );
                return DiscontinuitySnafu {
                    upstream: r.linkage.upstream,
                    downstream: r.linkage.downstream,
                    variable: r.linkage.variable,
                    upstream_value: r.upstream_value,
                    downstream_value: r.downstream_value,
                }
                .fail();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod ut_trajectory;
