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

use crate::options::{AircraftValues, MetaData, OptionValue, OptionsError};
use crate::units::UnitError;
use nalgebra::DVector;
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub mod atmosphere;
pub mod breguet;
pub mod energy;
pub mod mission_ode;
pub mod two_dof;

pub use self::atmosphere::Atmosphere;
pub use self::breguet::BreguetCruiseOde;
pub use self::energy::EnergyOde;
pub use self::mission_ode::{FixedPointSolver, MissionOde};
pub use self::two_dof::TwoDofOde;

/// Standard gravity in m/s^2.
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Values of named variables at every node of a phase.
pub type NodeValues = BTreeMap<String, DVector<f64>>;

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DynamicsError {
    #[snafu(display("{component} requires input `{name}`"))]
    MissingInput { component: String, name: String },
    #[snafu(display("{component}: `{name}` has {got} nodes but {expected} were expected"))]
    BadShape {
        component: String,
        name: String,
        expected: usize,
        got: usize,
    },
    #[snafu(display("`{name}` is produced by both {first} and {second}"))]
    DuplicateOutput {
        name: String,
        first: String,
        second: String,
    },
    #[snafu(display("cannot convert `{name}`: {source}"))]
    UnitConversion { name: String, source: UnitError },
    #[snafu(display("{ode} did not converge after {iterations} iterations (residual {residual:e})"))]
    SolverDidNotConverge {
        ode: String,
        iterations: usize,
        residual: f64,
    },
    #[snafu(display("{component} could not read an aircraft input: {source}"))]
    AircraftInput {
        component: String,
        source: OptionsError,
    },
    #[snafu(display("{component}: {reason}"))]
    NonPhysical { component: String, reason: String },
    #[snafu(display("subsystem {name} failed to build: {reason}"))]
    SubsystemBuild { name: String, reason: String },
}

/// Declaration of a named input or output of a component, in the units the component works in.
#[derive(Clone, Debug, PartialEq)]
pub struct IoMeta {
    pub name: String,
    pub units: String,
    /// Value used when nothing feeds this input.
    pub default: f64,
    pub desc: String,
}

impl IoMeta {
    pub fn new(name: &str, units: &str) -> Self {
        Self {
            name: name.to_string(),
            units: units.to_string(),
            default: 0.0,
            desc: String::new(),
        }
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.desc = desc.to_string();
        self
    }
}

/// A computation evaluated at every node of a phase, e.g. an atmosphere model or an engine deck.
pub trait MissionComponent: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn inputs(&self) -> Vec<IoMeta>;

    fn outputs(&self) -> Vec<IoMeta>;

    /// Computes every output from the inputs, which are provided in the declared units.
    fn compute(&self, inputs: &NodeValues) -> Result<NodeValues, DynamicsError>;
}

/// The equations evaluated at every node of a phase, providing the state rates.
pub trait Ode: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn num_nodes(&self) -> usize;

    fn inputs(&self) -> Vec<IoMeta>;

    fn outputs(&self) -> Vec<IoMeta>;

    fn compute(&self, inputs: &NodeValues) -> Result<NodeValues, DynamicsError>;

    fn input(&self, name: &str) -> Option<IoMeta> {
        self.inputs().into_iter().find(|io| io.name == name)
    }

    fn output(&self, name: &str) -> Option<IoMeta> {
        self.outputs().into_iter().find(|io| io.name == name)
    }
}

/// A type of ODE which can be instantiated for a given number of nodes.
pub trait OdeClass: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn build(&self, num_nodes: usize, kwargs: &OdeInitKwargs) -> Result<Box<dyn Ode>, DynamicsError>;
}

/// A state contributed by a subsystem, integrated in every phase that carries that subsystem.
#[derive(Clone, Debug, PartialEq)]
pub struct SubsystemState {
    pub name: String,
    pub units: String,
    pub rate_source: String,
    pub fix_initial: bool,
    pub ref_value: Option<f64>,
}

/// A physics plug-in, e.g. an aerodynamics or propulsion model.
pub trait SubsystemBuilder: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn build_pre_mission(
        &self,
        _values: &AircraftValues,
    ) -> Result<Option<Box<dyn MissionComponent>>, DynamicsError> {
        Ok(None)
    }

    fn build_mission(
        &self,
        num_nodes: usize,
        values: &AircraftValues,
        options: &BTreeMap<String, OptionValue>,
    ) -> Result<Option<Box<dyn MissionComponent>>, DynamicsError>;

    /// Whether the mission components must be converged by a solver, e.g. for an implicit trim.
    fn needs_mission_solver(&self, _values: &AircraftValues) -> bool {
        false
    }

    fn mission_states(&self) -> Vec<SubsystemState> {
        Vec::new()
    }
}

/// Everything an ODE class needs to instantiate the equations of a phase.
#[derive(Clone, Debug)]
pub struct OdeInitKwargs {
    pub aircraft: AircraftValues,
    pub meta_data: Arc<MetaData>,
    pub subsystem_options: BTreeMap<String, BTreeMap<String, OptionValue>>,
    pub core_subsystems: Vec<Arc<dyn SubsystemBuilder>>,
    pub external_subsystems: Vec<Arc<dyn SubsystemBuilder>>,
    pub extras: BTreeMap<String, OptionValue>,
}

impl OdeInitKwargs {
    pub fn subsystems(&self) -> impl Iterator<Item = &Arc<dyn SubsystemBuilder>> {
        self.core_subsystems
            .iter()
            .chain(self.external_subsystems.iter())
    }

    /// Builds the mission components of every subsystem, and whether any of them needs a solver.
    pub fn subsystem_components(
        &self,
        num_nodes: usize,
    ) -> Result<(Vec<Box<dyn MissionComponent>>, bool), DynamicsError> {
        let empty = BTreeMap::new();
        let mut components = Vec::new();
        let mut needs_solver = false;
        for subsystem in self.subsystems() {
            let options = self
                .subsystem_options
                .get(subsystem.name())
                .unwrap_or(&empty);
            if let Some(component) = subsystem.build_mission(num_nodes, &self.aircraft, options)? {
                components.push(component);
            }
            needs_solver |= subsystem.needs_mission_solver(&self.aircraft);
        }
        Ok((components, needs_solver))
    }

    /// Reads an aircraft input, falling back to the metadata default.
    pub fn aircraft_f64(&self, component: &str, name: &str, units: &str) -> Result<f64, DynamicsError> {
        self.aircraft
            .get_f64_or_default(name, units, &self.meta_data)
            .context(AircraftInputSnafu { component })
    }
}

/// Catalog of subsystems referenced by name in phase descriptions.
#[derive(Clone, Debug, Default)]
pub struct SubsystemCatalog {
    entries: BTreeMap<String, Arc<dyn SubsystemBuilder>>,
}

impl SubsystemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subsystem: Arc<dyn SubsystemBuilder>) {
        self.entries.insert(subsystem.name().to_string(), subsystem);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SubsystemBuilder>> {
        self.entries.get(name).cloned()
    }
}

/// Fetches an input and checks its node count.
pub(crate) fn node_input<'a>(
    inputs: &'a NodeValues,
    component: &str,
    name: &str,
    num_nodes: usize,
) -> Result<&'a DVector<f64>, DynamicsError> {
    let values = inputs
        .get(name)
        .context(MissingInputSnafu { component, name })?;
    ensure!(
        values.len() == num_nodes,
        BadShapeSnafu {
            component,
            name,
            expected: num_nodes,
            got: values.len(),
        }
    );
    Ok(values)
}

/// Reads a string extra passed to the ODE, if any.
pub(crate) fn extra_str<'a>(kwargs: &'a OdeInitKwargs, name: &str) -> Option<&'a str> {
    kwargs.extras.get(name).and_then(|v| v.as_str())
}
