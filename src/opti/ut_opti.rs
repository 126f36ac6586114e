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

use super::*;
use crate::dynamics::{DynamicsError, IoMeta, MissionComponent, MissionOde, NodeValues};
use crate::md::phase::{ControlOptions, StateOptions, TimeOptions};
use crate::md::trajectory::LinkMode;
use crate::md::transcription::Transcription;
use approx::assert_relative_eq;
use std::time::Instant;

#[derive(Debug)]
struct Cart;

impl MissionComponent for Cart {
    fn name(&self) -> &str {
        "cart"
    }

    fn inputs(&self) -> Vec<IoMeta> {
        vec![IoMeta::new("speed", "m/s")]
    }

    fn outputs(&self) -> Vec<IoMeta> {
        vec![IoMeta::new("x_dot", "m/s")]
    }

    fn compute(&self, inputs: &NodeValues) -> Result<NodeValues, DynamicsError> {
        let mut out = NodeValues::new();
        out.insert("x_dot".into(), inputs["speed"].clone());
        Ok(out)
    }
}

fn cart(name: &str) -> Phase {
    let tx = Transcription::radau(2, &[3], true).unwrap();
    let n = tx.grid().num_nodes();
    let ode = MissionOde::new(name, n, vec![Box::new(Cart)], None).unwrap();
    let mut phase = Phase::new(name, tx, Box::new(ode)).unwrap();
    phase.set_time_options(
        TimeOptions::builder()
            .fix_initial(true)
            .duration_bounds((Some(1.0), Some(500.0)))
            .build(),
    );
    phase
        .add_state(
            StateOptions::builder()
                .name("x")
                .units("m")
                .rate_source("x_dot")
                .fix_initial(true)
                .ref_value(1000.0)
                .build(),
        )
        .unwrap();
    phase
        .add_control(
            ControlOptions::builder()
                .name("speed")
                .units("m/s")
                .lower(0.0)
                .upper(30.0)
                .build(),
        )
        .unwrap();
    phase
}

fn carts() -> Trajectory {
    let mut traj = Trajectory::new("traj");
    traj.add_phase(cart("first")).unwrap();
    traj.add_phase(cart("second")).unwrap();
    traj.link_phases(&["first", "second"], &["time", "x"], LinkMode::Connected)
        .unwrap();
    traj.link_phases(&["first", "second"], &["speed"], LinkMode::Constrained)
        .unwrap();
    traj.setup().unwrap();
    for name in ["first", "second"] {
        let phase = traj.phase_mut(name).unwrap();
        phase.set_time_val(0.0, 100.0, "s").unwrap();
        phase.set_control_val("speed", &[10.0], "m/s").unwrap();
        phase.set_state_val("x", &[0.0, 1000.0], "m").unwrap();
    }
    traj
}

#[test]
fn problem_layout() {
    let traj = carts();
    let problem = Problem::from_trajectory(&traj);

    // 2 segments of order 3: 8 nodes, 7 state inputs, 6 collocation nodes
    // Per phase: the duration, 6 free state inputs and 8 control nodes
    assert_eq!(problem.num_variables(), 2 * (1 + 6 + 8));
    assert!(problem
        .variables
        .iter()
        .all(|v| v.target != DesignTarget::InitialTime));
    assert_eq!(problem.num_constraints(), 2 * 6 + 1);
    assert!(problem.constraints.iter().all(|c| c.is_equality()));
    assert_eq!(problem.variables[1].to_string(), "first.x[1]");

    let state = &problem.variables[1];
    assert_relative_eq!(state.scaled(500.0), 0.5);
    assert_relative_eq!(state.unscaled(0.5), 500.0);
    let speed = problem
        .variables
        .iter()
        .find(|v| matches!(&v.target, DesignTarget::Control { .. }))
        .unwrap();
    assert_eq!(speed.scaled_bounds(), (Some(0.0), Some(30.0)));
}

#[test]
fn design_vector_round_trip() {
    let mut traj = carts();
    let problem = Problem::from_trajectory(&traj);
    let mut x = problem.design_vector(&traj).unwrap();
    assert_relative_eq!(x[0], 100.0);

    x[0] = 200.0;
    problem.apply_design_vector(&mut traj, &x).unwrap();
    assert_relative_eq!(traj.phase("first").unwrap().values().t_duration, 200.0);
    let back = problem.design_vector(&traj).unwrap();
    for (a, b) in back.iter().zip(x.iter()) {
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }

    assert_eq!(
        problem.apply_design_vector(&mut traj, &DVector::zeros(3)),
        Err(OptiError::DesignVectorLength {
            expected: 30,
            got: 3
        })
    );
}

#[test]
fn constraint_values() {
    let mut traj = carts();
    let problem = Problem::from_trajectory(&traj);
    let eval = traj.evaluate().unwrap();
    let values = problem.constraint_values(&traj, &eval).unwrap();
    assert_eq!(values.len(), problem.num_constraints());
    // The second phase starts where the first ends, so its initial guess no longer integrates
    assert!(values.rows(0, 6).amax() < 1e-9);
    assert!(problem.max_violation(&traj, &eval).unwrap() > 1.0);
    assert_relative_eq!(values[12], 0.0, epsilon = 1e-12);
}

/// Pretends to converge without moving anything.
struct Idle;

impl NlpDriver for Idle {
    fn solve(&mut self, problem: &Problem, traj: &mut Trajectory) -> Result<NlpSolution, OptiError> {
        let start = Instant::now();
        let x = problem.design_vector(traj)?;
        problem.apply_design_vector(traj, &x)?;
        let eval = traj.evaluate().context(OptiTrajectorySnafu)?;
        Ok(NlpSolution {
            x,
            objective: problem.objective(&eval),
            max_violation: problem.max_violation(traj, &eval)?,
            iterations: 0,
            converged: true,
            computation_dur: start.elapsed(),
        })
    }
}

#[test]
fn driver_contract() {
    let mut traj = carts();
    let problem = Problem::from_trajectory(&traj);
    let sol = Idle.solve(&problem, &mut traj).unwrap();
    assert_eq!(sol.x.len(), problem.num_variables());
    assert_eq!(sol.objective, 0.0);
    assert!(format!("{sol}").starts_with("converged after 0 iterations"));
}
