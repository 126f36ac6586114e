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
    DuplicateOutputSnafu, DynamicsError, IoMeta, MissionComponent, NodeValues, Ode,
    UnitConversionSnafu,
};
use crate::units::conversion_factor;
use nalgebra::DVector;
use snafu::prelude::*;
use std::collections::BTreeMap;
use typed_builder::TypedBuilder;

/// Settings of the fixed point iteration used when the components are coupled.
#[derive(Copy, Clone, Debug, PartialEq, TypedBuilder)]
#[builder(doc)]
pub struct FixedPointSolver {
    #[builder(default = 50)]
    pub max_iter: usize,
    /// Relative tolerance on the largest change of any output between two sweeps
    #[builder(default = 1e-10)]
    pub tol: f64,
}

impl Default for FixedPointSolver {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// An ODE made of components evaluated in order.
///
/// Without a solver this is an explicit chain: an input produced by a later component takes its
/// default. With a solver, every component is swept until the outputs stop changing.
#[derive(Debug)]
pub struct MissionOde {
    name: String,
    num_nodes: usize,
    components: Vec<Box<dyn MissionComponent>>,
    solver: Option<FixedPointSolver>,
    inputs: Vec<IoMeta>,
    outputs: Vec<IoMeta>,
}

impl MissionOde {
    pub fn new(
        name: &str,
        num_nodes: usize,
        components: Vec<Box<dyn MissionComponent>>,
        solver: Option<FixedPointSolver>,
    ) -> Result<Self, DynamicsError> {
        let mut outputs: Vec<IoMeta> = Vec::new();
        let mut producers: BTreeMap<String, String> = BTreeMap::new();
        let mut inputs: Vec<IoMeta> = Vec::new();
        for component in &components {
            for input in component.inputs() {
                let fed = if solver.is_some() {
                    components
                        .iter()
                        .any(|c| c.outputs().iter().any(|o| o.name == input.name))
                } else {
                    producers.contains_key(&input.name)
                };
                if !fed && !inputs.iter().any(|i| i.name == input.name) {
                    inputs.push(input);
                }
            }
            for output in component.outputs() {
                if let Some(first) = producers.get(&output.name) {
                    return DuplicateOutputSnafu {
                        name: output.name.clone(),
                        first: first.clone(),
                        second: component.name(),
                    }
                    .fail();
                }
                producers.insert(output.name.clone(), component.name().to_string());
                outputs.push(output);
            }
        }
        Ok(Self {
            name: name.to_string(),
            num_nodes,
            components,
            solver,
            inputs,
            outputs,
        })
    }

    pub fn has_solver(&self) -> bool {
        self.solver.is_some()
    }

    /// Gathers the inputs of a component from the pool, converting units where needed.
    fn gather(
        &self,
        component: &dyn MissionComponent,
        pool: &BTreeMap<String, (DVector<f64>, String)>,
    ) -> Result<NodeValues, DynamicsError> {
        let mut values = NodeValues::new();
        for input in component.inputs() {
            let value = match pool.get(&input.name) {
                Some((value, units)) => {
                    let factor = conversion_factor(units, &input.units)
                        .context(UnitConversionSnafu { name: &input.name })?;
                    value * factor
                }
                None => DVector::from_element(self.num_nodes, input.default),
            };
            values.insert(input.name.clone(), value);
        }
        Ok(values)
    }

    fn sweep(
        &self,
        pool: &mut BTreeMap<String, (DVector<f64>, String)>,
    ) -> Result<(), DynamicsError> {
        for component in &self.components {
            let values = self.gather(component.as_ref(), pool)?;
            let mut computed = component.compute(&values)?;
            for output in component.outputs() {
                let value = computed
                    .remove(&output.name)
                    .unwrap_or_else(|| DVector::from_element(self.num_nodes, output.default));
                pool.insert(output.name.clone(), (value, output.units.clone()));
            }
        }
        Ok(())
    }
}

impl Ode for MissionOde {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<IoMeta> {
        self.inputs.clone()
    }

    fn outputs(&self) -> Vec<IoMeta> {
        self.outputs.clone()
    }

    fn compute(&self, inputs: &NodeValues) -> Result<NodeValues, DynamicsError> {
        let mut pool: BTreeMap<String, (DVector<f64>, String)> = BTreeMap::new();
        for meta in &self.inputs {
            let value = match inputs.get(&meta.name) {
                Some(value) => value.clone(),
                None => DVector::from_element(self.num_nodes, meta.default),
            };
            pool.insert(meta.name.clone(), (value, meta.units.clone()));
        }

        match self.solver {
            None => self.sweep(&mut pool)?,
            Some(solver) => {
                let mut residual = f64::INFINITY;
                let mut converged = false;
                for iteration in 0..solver.max_iter {
                    let previous: BTreeMap<String, DVector<f64>> = self
                        .outputs
                        .iter()
                        .filter_map(|o| pool.get(&o.name).map(|(v, _)| (o.name.clone(), v.clone())))
                        .collect();
                    self.sweep(&mut pool)?;
                    if iteration == 0 {
                        continue;
                    }
                    residual = self
                        .outputs
                        .iter()
                        .filter_map(|o| {
                            let prev = previous.get(&o.name)?;
                            let (now, _) = pool.get(&o.name)?;
                            Some(
                                (now - prev)
                                    .iter()
                                    .zip(now.iter())
                                    .map(|(d, v)| d.abs() / v.abs().max(1.0))
                                    .fold(0.0, f64::max),
                            )
                        })
                        .fold(0.0, f64::max);
                    if residual <= solver.tol {
                        debug!("{} converged in {} sweeps", self.name, iteration + 1);
                        converged = true;
                        break;
                    }
                }
                if !converged {
                    error!("{} did not converge, residual {residual:e}", self.name);
                    return Err(DynamicsError::SolverDidNotConverge {
                        ode: self.name.clone(),
                        iterations: solver.max_iter,
                        residual,
                    });
                }
            }
        }

        Ok(self
            .outputs
            .iter()
            .filter_map(|o| pool.remove(&o.name).map(|(v, _)| (o.name.clone(), v)))
            .collect())
    }
}
