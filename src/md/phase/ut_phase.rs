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
use crate::dynamics::{IoMeta, MissionComponent, MissionOde};
use approx::assert_relative_eq;

/// A cart moving at the commanded speed.
#[derive(Debug)]
struct Cart {
    n: usize,
}

impl MissionComponent for Cart {
    fn name(&self) -> &str {
        "cart"
    }

    fn inputs(&self) -> Vec<IoMeta> {
        vec![IoMeta::new("speed", "m/s"), IoMeta::new("time", "s")]
    }

    fn outputs(&self) -> Vec<IoMeta> {
        vec![IoMeta::new("x_dot", "m/s"), IoMeta::new("clock", "s")]
    }

    fn compute(&self, inputs: &NodeValues) -> Result<NodeValues, DynamicsError> {
        let mut out = NodeValues::new();
        out.insert("x_dot".into(), inputs["speed"].clone());
        out.insert("clock".into(), inputs["time"].clone());
        assert_eq!(inputs["speed"].len(), self.n);
        Ok(out)
    }
}

fn cart_phase(tx: Transcription) -> Phase {
    let n = tx.grid().num_nodes();
    let ode = MissionOde::new("cart", n, vec![Box::new(Cart { n })], None).unwrap();
    Phase::new("cart", tx, Box::new(ode)).unwrap()
}

fn x_state() -> StateOptions {
    StateOptions::builder()
        .name("x")
        .units("ft")
        .rate_source("x_dot")
        .build()
}

fn speed_control() -> ControlOptions {
    ControlOptions::builder().name("speed").units("m/s").build()
}

#[test]
fn transcription_is_checked() {
    let ode = MissionOde::new("cart", 2, vec![Box::new(Cart { n: 2 })], None).unwrap();
    let err = Phase::new("cart", Transcription::Analytic { num_nodes: 0 }, Box::new(ode)).unwrap_err();
    assert!(matches!(
        err,
        PhaseError::BadTranscription {
            source: TranscriptionError::TooFewNodes { num_nodes: 0 },
            ..
        }
    ));
}

#[test]
fn duplicate_declarations() {
    let mut phase = cart_phase(Transcription::radau(2, &[3], true).unwrap());
    phase.add_state(x_state()).unwrap();
    assert!(matches!(
        phase.add_state(x_state()),
        Err(PhaseError::DuplicateVariable { .. })
    ));
    assert!(matches!(
        phase.add_control(ControlOptions::builder().name("x").build()),
        Err(PhaseError::DuplicateVariable { .. })
    ));
    assert!(matches!(
        phase.add_parameter(ParameterOptions::builder().name("time").build()),
        Err(PhaseError::DuplicateVariable { .. })
    ));
}

#[test]
fn setup_checks_wiring() {
    let tx = Transcription::radau(2, &[3], true).unwrap();

    let mut phase = cart_phase(tx.clone());
    phase.add_state(StateOptions::builder().name("x").units("ft").build()).unwrap();
    assert!(matches!(
        phase.setup(),
        Err(PhaseError::MissingSource { .. })
    ));

    let mut phase = cart_phase(tx.clone());
    phase
        .add_state(
            StateOptions::builder()
                .name("x")
                .units("kg")
                .rate_source("x_dot")
                .build(),
        )
        .unwrap();
    assert!(matches!(
        phase.setup(),
        Err(PhaseError::IncompatibleUnits { .. })
    ));

    let mut phase = cart_phase(tx.clone());
    phase
        .add_control(
            ControlOptions::builder()
                .name("v")
                .units("m/s")
                .targets(vec!["velocity".to_string()])
                .build(),
        )
        .unwrap();
    assert!(matches!(
        phase.setup(),
        Err(PhaseError::UnknownTarget { .. })
    ));

    let mut phase = cart_phase(tx);
    phase
        .add_state(
            StateOptions::builder()
                .name("x")
                .units("m")
                .rate_source("nothing")
                .build(),
        )
        .unwrap();
    assert!(matches!(
        phase.setup(),
        Err(PhaseError::UnknownSource { .. })
    ));
    assert!(matches!(phase.evaluate(), Err(PhaseError::NotSetUp { .. })));
}

#[test]
fn exact_trajectory_has_no_defects() {
    let mut phase = cart_phase(Transcription::radau(3, &[3], true).unwrap());
    phase.add_state(x_state()).unwrap();
    phase.add_control(speed_control()).unwrap();
    phase
        .add_boundary_constraint(
            ConstraintOptions::builder()
                .name("final_position")
                .target("x")
                .loc(Loc::Final)
                .equals(1.0)
                .units("km")
                .build(),
        )
        .unwrap();
    phase
        .add_path_constraint(
            ConstraintOptions::builder()
                .name("speed")
                .upper(15.0)
                .build(),
        )
        .unwrap();
    phase.add_objective(ObjectiveOptions::builder().name("clock").ref_value(10.0).build());
    phase.setup().unwrap();

    phase.set_time_val(0.0, 100.0, "s").unwrap();
    phase.set_control_val("speed", &[10.0], "m/s").unwrap();
    phase.set_state_val("x", &[0.0, 1.0], "km").unwrap();
    let eval = phase.evaluate().unwrap();

    assert!(eval.max_defect() < 1e-9, "max defect {}", eval.max_defect());
    assert_relative_eq!(
        phase.boundary_value(&eval, "x", Loc::Final).unwrap(),
        1000.0 / 0.3048,
        epsilon = 1e-9
    );
    assert_relative_eq!(eval.boundary_constraints[0].values[0], 1.0, epsilon = 1e-12);
    assert!(eval.boundary_constraints[0].violation() < 1e-12);
    assert_eq!(eval.path_constraints[0].values.len(), phase.grid().num_nodes());
    assert_eq!(eval.path_constraints[0].violation(), 0.0);
    assert_relative_eq!(eval.objective.unwrap(), 10.0);

    // Going too fast breaks both the dynamics and the path constraint
    phase.set_control_val("speed", &[20.0], "m/s").unwrap();
    let eval = phase.evaluate().unwrap();
    assert!(eval.max_defect() > 1.0);
    assert_relative_eq!(eval.path_constraints[0].violation(), 5.0);
}

#[test]
fn value_setters_check_units_and_shapes() {
    let mut phase = cart_phase(Transcription::radau(2, &[2], true).unwrap());
    phase.add_state(x_state()).unwrap();
    assert!(matches!(
        phase.set_state_val("x", &[0.0, 1.0], "s"),
        Err(PhaseError::IncompatibleUnits { .. })
    ));
    assert!(matches!(
        phase.set_state_val("y", &[0.0], "m"),
        Err(PhaseError::UnknownVariable { .. })
    ));
    assert!(matches!(
        phase.set_state_nodes("x", DVector::zeros(2)),
        Err(PhaseError::BadValueShape { .. })
    ));
    phase.set_time_val(1.0, 2.0, "min").unwrap();
    assert_eq!(phase.values().t_initial, 60.0);
    assert_eq!(phase.values().t_duration, 120.0);
    phase.set_initial_value("x", 3.0).unwrap();
    assert_eq!(phase.values().states["x"][0], 3.0);
}

#[test]
fn polynomial_controls() {
    let mut phase = cart_phase(Transcription::radau(2, &[3], true).unwrap());
    phase.add_state(x_state()).unwrap();
    phase
        .add_control(
            ControlOptions::builder()
                .name("speed")
                .units("m/s")
                .order(1)
                .build(),
        )
        .unwrap();
    phase.setup().unwrap();
    assert_eq!(phase.values().controls["speed"].len(), 2);
    phase.set_control_val("speed", &[0.0, 20.0], "m/s").unwrap();
    phase.set_time_val(0.0, 10.0, "s").unwrap();
    let eval = phase.evaluate().unwrap();
    let speed = &eval.controls["speed"];
    for (i, t) in eval.time.iter().enumerate() {
        assert_relative_eq!(speed[i], 2.0 * t, epsilon = 1e-9);
        assert_relative_eq!(eval.control_rates["speed"][i], 2.0, epsilon = 1e-9);
    }
}

#[test]
fn invalid_constraints() {
    let mut phase = cart_phase(Transcription::radau(1, &[3], true).unwrap());
    assert!(matches!(
        phase.add_boundary_constraint(ConstraintOptions::builder().name("x").equals(1.0).build()),
        Err(PhaseError::InvalidPhaseConstraint { .. })
    ));
    assert!(matches!(
        phase.add_path_constraint(
            ConstraintOptions::builder()
                .name("x")
                .equals(1.0)
                .lower(0.0)
                .build()
        ),
        Err(PhaseError::InvalidPhaseConstraint { .. })
    ));
    assert!(matches!(
        phase.add_path_constraint(
            ConstraintOptions::builder()
                .name("x")
                .indices(vec![42])
                .build()
        ),
        Err(PhaseError::InvalidPhaseConstraint { .. })
    ));
}
