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
    node_input, Atmosphere, DynamicsError, FixedPointSolver, IoMeta, MissionComponent,
    MissionOde, NodeValues, Ode, OdeClass, OdeInitKwargs, STANDARD_GRAVITY,
};
use crate::variables::{aircraft, dynamic};
use nalgebra::DVector;

/// Two degree of freedom point mass equations in the vertical plane, with angle of attack
/// and throttle as inputs.
#[derive(Copy, Clone, Debug, Default)]
pub struct TwoDofOde;

impl OdeClass for TwoDofOde {
    fn name(&self) -> &str {
        "two_dof"
    }

    fn build(&self, num_nodes: usize, kwargs: &OdeInitKwargs) -> Result<Box<dyn Ode>, DynamicsError> {
        let eom = TwoDofEom::new(num_nodes, kwargs)?;
        let (subsystems, needs_solver) = kwargs.subsystem_components(num_nodes)?;
        let mut components: Vec<Box<dyn MissionComponent>> =
            vec![Box::new(Atmosphere { num_nodes })];
        components.extend(subsystems);
        components.push(Box::new(eom));
        Ok(Box::new(MissionOde::new(
            "two_dof",
            num_nodes,
            components,
            needs_solver.then(FixedPointSolver::default),
        )?))
    }
}

#[derive(Clone, Debug)]
struct TwoDofEom {
    num_nodes: usize,
    wing_area: f64,
    cd0: f64,
    k: f64,
    cl0: f64,
    cl_alpha: f64,
    max_thrust: f64,
    tsfc: f64,
}

impl TwoDofEom {
    fn new(num_nodes: usize, kwargs: &OdeInitKwargs) -> Result<Self, DynamicsError> {
        let name = "two_dof_eom";
        Ok(Self {
            num_nodes,
            wing_area: kwargs.aircraft_f64(name, aircraft::WING_AREA, "m**2")?,
            cd0: kwargs.aircraft_f64(name, aircraft::ZERO_LIFT_DRAG_COEFF, "unitless")?,
            k: kwargs.aircraft_f64(name, aircraft::INDUCED_DRAG_FACTOR, "unitless")?,
            cl0: kwargs.aircraft_f64(name, aircraft::ZERO_ALPHA_LIFT_COEFF, "unitless")?,
            cl_alpha: kwargs.aircraft_f64(name, aircraft::LIFT_CURVE_SLOPE, "1/rad")?,
            max_thrust: kwargs.aircraft_f64(name, aircraft::MAX_THRUST, "N")?,
            tsfc: kwargs.aircraft_f64(name, aircraft::TSFC, "kg/s/N")?,
        })
    }
}

impl MissionComponent for TwoDofEom {
    fn name(&self) -> &str {
        "two_dof_eom"
    }

    fn inputs(&self) -> Vec<IoMeta> {
        vec![
            IoMeta::new(dynamic::VELOCITY, "m/s"),
            IoMeta::new(dynamic::FLIGHT_PATH_ANGLE, "rad"),
            IoMeta::new(dynamic::ALPHA, "rad"),
            IoMeta::new(dynamic::THROTTLE, "unitless").with_default(1.0),
            IoMeta::new(dynamic::MASS, "kg"),
            IoMeta::new(dynamic::DENSITY, "kg/m**3"),
            IoMeta::new(dynamic::SPEED_OF_SOUND, "m/s"),
        ]
    }

    fn outputs(&self) -> Vec<IoMeta> {
        vec![
            IoMeta::new(dynamic::VELOCITY_RATE, "m/s**2"),
            IoMeta::new(dynamic::FLIGHT_PATH_ANGLE_RATE, "rad/s"),
            IoMeta::new(dynamic::ALTITUDE_RATE, "m/s"),
            IoMeta::new(dynamic::DISTANCE_RATE, "m/s"),
            IoMeta::new(dynamic::FUEL_FLOW_RATE_NEGATIVE_TOTAL, "kg/s"),
            IoMeta::new(dynamic::LIFT, "N"),
            IoMeta::new(dynamic::DRAG, "N"),
            IoMeta::new(dynamic::THRUST, "N"),
            IoMeta::new(dynamic::MACH, "unitless"),
        ]
    }

    fn compute(&self, inputs: &NodeValues) -> Result<NodeValues, DynamicsError> {
        let n = self.num_nodes;
        let v = node_input(inputs, self.name(), dynamic::VELOCITY, n)?;
        let gamma = node_input(inputs, self.name(), dynamic::FLIGHT_PATH_ANGLE, n)?;
        let alpha = node_input(inputs, self.name(), dynamic::ALPHA, n)?;
        let throttle = node_input(inputs, self.name(), dynamic::THROTTLE, n)?;
        let mass = node_input(inputs, self.name(), dynamic::MASS, n)?;
        let rho = node_input(inputs, self.name(), dynamic::DENSITY, n)?;
        let sos = node_input(inputs, self.name(), dynamic::SPEED_OF_SOUND, n)?;

        if let Some(i) = (0..n).find(|&i| v[i] <= 0.0 || mass[i] <= 0.0) {
            return Err(DynamicsError::NonPhysical {
                component: self.name().to_string(),
                reason: format!(
                    "airspeed and mass must be positive, got {} and {} at node {i}",
                    v[i], mass[i]
                ),
            });
        }

        let q_s = DVector::from_fn(n, |i, _| 0.5 * rho[i] * v[i] * v[i] * self.wing_area);
        let cl = alpha.map(|a| self.cl0 + self.cl_alpha * a);
        let lift = q_s.component_mul(&cl);
        let drag = DVector::from_fn(n, |i, _| q_s[i] * (self.cd0 + self.k * cl[i] * cl[i]));
        let thrust = DVector::from_fn(n, |i, _| {
            throttle[i] * self.max_thrust * rho[i] / SEA_LEVEL_DENSITY
        });

        let v_dot = DVector::from_fn(n, |i, _| {
            (thrust[i] * alpha[i].cos() - drag[i]) / mass[i] - STANDARD_GRAVITY * gamma[i].sin()
        });
        let gamma_dot = DVector::from_fn(n, |i, _| {
            (thrust[i] * alpha[i].sin() + lift[i] - mass[i] * STANDARD_GRAVITY * gamma[i].cos())
                / (mass[i] * v[i])
        });
        let h_dot = DVector::from_fn(n, |i, _| v[i] * gamma[i].sin());
        let r_dot = DVector::from_fn(n, |i, _| v[i] * gamma[i].cos());
        let fuel_flow = thrust.map(|t| -self.tsfc * t);
        let mach = DVector::from_fn(n, |i, _| v[i] / sos[i]);

        let mut out = NodeValues::new();
        out.insert(dynamic::VELOCITY_RATE.to_string(), v_dot);
        out.insert(dynamic::FLIGHT_PATH_ANGLE_RATE.to_string(), gamma_dot);
        out.insert(dynamic::ALTITUDE_RATE.to_string(), h_dot);
        out.insert(dynamic::DISTANCE_RATE.to_string(), r_dot);
        out.insert(dynamic::FUEL_FLOW_RATE_NEGATIVE_TOTAL.to_string(), fuel_flow);
        out.insert(dynamic::LIFT.to_string(), lift);
        out.insert(dynamic::DRAG.to_string(), drag);
        out.insert(dynamic::THRUST.to_string(), thrust);
        out.insert(dynamic::MACH.to_string(), mach);
        Ok(out)
    }
}
