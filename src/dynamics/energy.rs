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

use super::atmosphere::SEA_LEVEL_DENSITY;
use super::{
    extra_str, node_input, Atmosphere, DynamicsError, FixedPointSolver, IoMeta, MissionComponent,
    MissionOde, NodeValues, Ode, OdeClass, OdeInitKwargs, STANDARD_GRAVITY,
};
use crate::variables::{aircraft, dynamic};
use nalgebra::DVector;

/// Height-energy equations of motion: Mach and altitude are controls, the thrust is whatever
/// balances the energy rate they require.
#[derive(Copy, Clone, Debug, Default)]
pub struct EnergyOde;

impl OdeClass for EnergyOde {
    fn name(&self) -> &str {
        "energy"
    }

    fn build(&self, num_nodes: usize, kwargs: &OdeInitKwargs) -> Result<Box<dyn Ode>, DynamicsError> {
        let eom = EnergyEom::new(num_nodes, kwargs)?;
        let (subsystems, needs_solver) = kwargs.subsystem_components(num_nodes)?;
        let mut components: Vec<Box<dyn MissionComponent>> =
            vec![Box::new(Atmosphere { num_nodes })];
        components.extend(subsystems);
        components.push(Box::new(eom));
        let solver = needs_solver.then(FixedPointSolver::default);
        Ok(Box::new(MissionOde::new(
            "energy",
            num_nodes,
            components,
            solver,
        )?))
    }
}

#[derive(Clone, Debug)]
pub(crate) struct EnergyEom {
    num_nodes: usize,
    wing_area: f64,
    cd0: f64,
    k: f64,
    max_thrust: f64,
    tsfc: f64,
    bounded_throttle: bool,
}

impl EnergyEom {
    pub(crate) fn new(num_nodes: usize, kwargs: &OdeInitKwargs) -> Result<Self, DynamicsError> {
        let name = "energy_eom";
        Ok(Self {
            num_nodes,
            wing_area: kwargs.aircraft_f64(name, aircraft::WING_AREA, "m**2")?,
            cd0: kwargs.aircraft_f64(name, aircraft::ZERO_LIFT_DRAG_COEFF, "unitless")?,
            k: kwargs.aircraft_f64(name, aircraft::INDUCED_DRAG_FACTOR, "unitless")?,
            max_thrust: kwargs.aircraft_f64(name, aircraft::MAX_THRUST, "N")?,
            tsfc: kwargs.aircraft_f64(name, aircraft::TSFC, "kg/s/N")?,
            bounded_throttle: extra_str(kwargs, "throttle_enforcement") == Some("bounded"),
        })
    }
}

impl MissionComponent for EnergyEom {
    fn name(&self) -> &str {
        "energy_eom"
    }

    fn inputs(&self) -> Vec<IoMeta> {
        vec![
            IoMeta::new(dynamic::MACH, "unitless"),
            IoMeta::new(dynamic::MACH_RATE, "1/s"),
            IoMeta::new(dynamic::ALTITUDE_RATE, "m/s"),
            IoMeta::new(dynamic::MASS, "kg"),
            IoMeta::new(dynamic::DENSITY, "kg/m**3"),
            IoMeta::new(dynamic::SPEED_OF_SOUND, "m/s"),
        ]
    }

    fn outputs(&self) -> Vec<IoMeta> {
        vec![
            IoMeta::new(dynamic::VELOCITY, "m/s"),
            IoMeta::new(dynamic::DISTANCE_RATE, "m/s"),
            IoMeta::new(dynamic::LIFT, "N"),
            IoMeta::new(dynamic::DRAG, "N"),
            IoMeta::new(dynamic::THRUST_REQUIRED, "N"),
            IoMeta::new(dynamic::THROTTLE, "unitless"),
            IoMeta::new(dynamic::FUEL_FLOW_RATE_NEGATIVE_TOTAL, "kg/s"),
        ]
    }

    fn compute(&self, inputs: &NodeValues) -> Result<NodeValues, DynamicsError> {
        let n = self.num_nodes;
        let mach = node_input(inputs, self.name(), dynamic::MACH, n)?;
        let mach_rate = node_input(inputs, self.name(), dynamic::MACH_RATE, n)?;
        let h_dot = node_input(inputs, self.name(), dynamic::ALTITUDE_RATE, n)?;
        let mass = node_input(inputs, self.name(), dynamic::MASS, n)?;
        let rho = node_input(inputs, self.name(), dynamic::DENSITY, n)?;
        let sos = node_input(inputs, self.name(), dynamic::SPEED_OF_SOUND, n)?;

        let mut velocity = DVector::zeros(n);
        let mut distance_rate = DVector::zeros(n);
        let mut lift = DVector::zeros(n);
        let mut drag = DVector::zeros(n);
        let mut thrust_required = DVector::zeros(n);
        let mut throttle = DVector::zeros(n);
        let mut fuel_flow = DVector::zeros(n);

        for i in 0..n {
            let v = mach[i] * sos[i];
            if v <= 0.0 {
                return Err(DynamicsError::NonPhysical {
                    component: self.name().to_string(),
                    reason: format!("non positive airspeed at node {i} (Mach {})", mach[i]),
                });
            }
            let q_s = 0.5 * rho[i] * v * v * self.wing_area;
            let sin_gamma = (h_dot[i] / v).clamp(-1.0, 1.0);
            let cos_gamma = (1.0 - sin_gamma * sin_gamma).sqrt();
            let weight = mass[i] * STANDARD_GRAVITY;
            let cl = weight * cos_gamma / q_s;
            let d = q_s * (self.cd0 + self.k * cl * cl);
            let required = d + mass[i] * mach_rate[i] * sos[i] + weight * sin_gamma;
            let available = self.max_thrust * rho[i] / SEA_LEVEL_DENSITY;
            let mut thrust = required.max(0.0);
            if self.bounded_throttle {
                thrust = thrust.min(available);
            }

            velocity[i] = v;
            distance_rate[i] = v * cos_gamma;
            lift[i] = weight * cos_gamma;
            drag[i] = d;
            thrust_required[i] = required;
            throttle[i] = required / available;
            fuel_flow[i] = -self.tsfc * thrust;
        }

        let mut out = NodeValues::new();
        out.insert(dynamic::VELOCITY.to_string(), velocity);
        out.insert(dynamic::DISTANCE_RATE.to_string(), distance_rate);
        out.insert(dynamic::LIFT.to_string(), lift);
        out.insert(dynamic::DRAG.to_string(), drag);
        out.insert(dynamic::THRUST_REQUIRED.to_string(), thrust_required);
        out.insert(dynamic::THROTTLE.to_string(), throttle);
        out.insert(dynamic::FUEL_FLOW_RATE_NEGATIVE_TOTAL.to_string(), fuel_flow);
        Ok(out)
    }
}
