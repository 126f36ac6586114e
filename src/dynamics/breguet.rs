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
    node_input, Atmosphere, DynamicsError, FixedPointSolver, IoMeta, MissionComponent,
    MissionOde, NodeValues, Ode, OdeClass, OdeInitKwargs, STANDARD_GRAVITY,
};
use crate::variables::{aircraft, dynamic};
use nalgebra::DVector;

/// Closed form cruise at constant Mach and altitude (Breguet range equation).
///
/// The lift to drag ratio is frozen at the initial mass, so that
/// `m(t) = m0 exp(-c g t / (L/D))` and `x(t) = x0 + V t`.
#[derive(Copy, Clone, Debug, Default)]
pub struct BreguetCruiseOde;

impl OdeClass for BreguetCruiseOde {
    fn name(&self) -> &str {
        "breguet_cruise"
    }

    fn build(&self, num_nodes: usize, kwargs: &OdeInitKwargs) -> Result<Box<dyn Ode>, DynamicsError> {
        let name = "breguet";
        let breguet = Breguet {
            num_nodes,
            wing_area: kwargs.aircraft_f64(name, aircraft::WING_AREA, "m**2")?,
            cd0: kwargs.aircraft_f64(name, aircraft::ZERO_LIFT_DRAG_COEFF, "unitless")?,
            k: kwargs.aircraft_f64(name, aircraft::INDUCED_DRAG_FACTOR, "unitless")?,
            tsfc: kwargs.aircraft_f64(name, aircraft::TSFC, "kg/s/N")?,
        };
        let (subsystems, needs_solver) = kwargs.subsystem_components(num_nodes)?;
        let mut components: Vec<Box<dyn MissionComponent>> =
            vec![Box::new(Atmosphere { num_nodes })];
        components.extend(subsystems);
        components.push(Box::new(breguet));
        Ok(Box::new(MissionOde::new(
            "breguet_cruise",
            num_nodes,
            components,
            needs_solver.then(FixedPointSolver::default),
        )?))
    }
}

#[derive(Clone, Debug)]
struct Breguet {
    num_nodes: usize,
    wing_area: f64,
    cd0: f64,
    k: f64,
    tsfc: f64,
}

impl MissionComponent for Breguet {
    fn name(&self) -> &str {
        "breguet"
    }

    fn inputs(&self) -> Vec<IoMeta> {
        vec![
            IoMeta::new(dynamic::TIME_PHASE, "s"),
            IoMeta::new("mass_initial", "kg"),
            IoMeta::new("distance_initial", "m"),
            IoMeta::new(dynamic::MACH, "unitless"),
            IoMeta::new(dynamic::DENSITY, "kg/m**3"),
            IoMeta::new(dynamic::SPEED_OF_SOUND, "m/s"),
        ]
    }

    fn outputs(&self) -> Vec<IoMeta> {
        vec![
            IoMeta::new(dynamic::MASS, "kg"),
            IoMeta::new(dynamic::DISTANCE, "m"),
            IoMeta::new(dynamic::VELOCITY, "m/s"),
            IoMeta::new("lift_to_drag", "unitless"),
            IoMeta::new(dynamic::FUEL_FLOW_RATE_NEGATIVE_TOTAL, "kg/s"),
        ]
    }

    fn compute(&self, inputs: &NodeValues) -> Result<NodeValues, DynamicsError> {
        let n = self.num_nodes;
        let t = node_input(inputs, self.name(), dynamic::TIME_PHASE, n)?;
        let m0 = node_input(inputs, self.name(), "mass_initial", n)?;
        let x0 = node_input(inputs, self.name(), "distance_initial", n)?;
        let mach = node_input(inputs, self.name(), dynamic::MACH, n)?;
        let rho = node_input(inputs, self.name(), dynamic::DENSITY, n)?;
        let sos = node_input(inputs, self.name(), dynamic::SPEED_OF_SOUND, n)?;

        let mut mass = DVector::zeros(n);
        let mut distance = DVector::zeros(n);
        let mut velocity = DVector::zeros(n);
        let mut l_over_d = DVector::zeros(n);
        let mut fuel_flow = DVector::zeros(n);
        for i in 0..n {
            let v = mach[i] * sos[i];
            if v <= 0.0 || m0[i] <= 0.0 {
                return Err(DynamicsError::NonPhysical {
                    component: self.name().to_string(),
                    reason: format!(
                        "cruise needs a positive speed and initial mass, got {v} m/s and {} kg",
                        m0[i]
                    ),
                });
            }
            let q_s = 0.5 * rho[i] * v * v * self.wing_area;
            let cl = m0[i] * STANDARD_GRAVITY / q_s;
            let ld = cl / (self.cd0 + self.k * cl * cl);
            let decay = self.tsfc * STANDARD_GRAVITY / ld;
            mass[i] = m0[i] * (-decay * t[i]).exp();
            distance[i] = x0[i] + v * t[i];
            velocity[i] = v;
            l_over_d[i] = ld;
            fuel_flow[i] = -decay * mass[i];
        }

        let mut out = NodeValues::new();
        out.insert(dynamic::MASS.to_string(), mass);
        out.insert(dynamic::DISTANCE.to_string(), distance);
        out.insert(dynamic::VELOCITY.to_string(), velocity);
        out.insert("lift_to_drag".to_string(), l_over_d);
        out.insert(dynamic::FUEL_FLOW_RATE_NEGATIVE_TOTAL.to_string(), fuel_flow);
        Ok(out)
    }
}
