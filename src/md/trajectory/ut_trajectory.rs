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
use crate::md::transcription::Transcription;
use approx::assert_relative_eq;

/// Position follows the commanded speed.
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

fn cart(name: &str, x_units: &str, fix_initial: bool, fix_final: bool) -> Phase {
    let tx = Transcription::radau(2, &[3], true).unwrap();
    let n = tx.grid().num_nodes();
    let ode = MissionOde::new(name, n, vec![Box::new(Cart)], None).unwrap();
    let mut phase = Phase::new(name, tx, Box::new(ode)).unwrap();
    phase.set_time_options(TimeOptions::builder().fix_initial(fix_initial).build());
    phase
        .add_state(
            StateOptions::builder()
                .name("x")
                .units(x_units)
                .rate_source("x_dot")
                .fix_initial(fix_initial)
                .fix_final(fix_final)
                .build(),
        )
        .unwrap();
    phase
        .add_control(ControlOptions::builder().name("speed").units("m/s").build())
        .unwrap();
    phase
}

fn two_carts(fix_downstream: bool, fix_upstream_final: bool) -> Trajectory {
    let mut traj = Trajectory::new("traj");
    traj.add_phase(cart("first", "ft", true, fix_upstream_final))
        .unwrap();
    traj.add_phase(cart("second", "m", fix_downstream, false))
        .unwrap();
    traj
}

#[test]
fn phases_are_unique() {
    let mut traj = two_carts(true, false);
    assert_eq!(
        traj.add_phase(cart("first", "ft", false, false)),
        Err(TrajectoryError::DuplicatePhase {
            name: "first".into()
        })
    );
    assert_eq!(traj.phase_names(), vec!["first", "second"]);
}

#[test]
fn auto_linking() {
    let mut traj = two_carts(true, false);
    traj.link_phases(&["first", "second"], &["time", "x"], LinkMode::Auto)
        .unwrap();
    assert!(traj
        .linkages()
        .iter()
        .all(|l| l.continuity == Continuity::Connection));
    assert_relative_eq!(traj.linkages()[1].factor, 0.3048, epsilon = 1e-12);

    let mut traj = two_carts(false, true);
    traj.link_phases(&["first", "second"], &["x"], LinkMode::Auto)
        .unwrap();
    assert_eq!(traj.linkages()[0].continuity, Continuity::Constraint);

    let mut traj = two_carts(false, false);
    assert!(matches!(
        traj.link_phases(&["first", "second"], &["x"], LinkMode::Auto),
        Err(TrajectoryError::PhaseLinkage { .. })
    ));
    assert!(traj.linkages().is_empty());
}

#[test]
fn explicit_link_modes() {
    let mut traj = two_carts(false, false);
    traj.link_phases(&["first", "second"], &["x"], LinkMode::Connected)
        .unwrap();
    // A start can only be fed once
    assert!(matches!(
        traj.link_phases(&["first", "second"], &["x"], LinkMode::Connected),
        Err(TrajectoryError::PhaseLinkage { .. })
    ));
    // Optimized controls are free at both ends
    traj.link_phases(&["first", "second"], &["speed"], LinkMode::Constrained)
        .unwrap();

    let mut traj = two_carts(true, true);
    assert!(matches!(
        traj.link_phases(&["first", "second"], &["x"], LinkMode::Constrained),
        Err(TrajectoryError::PhaseLinkage { .. })
    ));
}

#[test]
fn invalid_links() {
    let mut traj = two_carts(true, false);
    assert!(matches!(
        traj.link_phases(&["first", "third"], &["x"], LinkMode::Auto),
        Err(TrajectoryError::UnknownPhase { .. })
    ));
    assert!(matches!(
        traj.link_phases(&["second", "first"], &["x"], LinkMode::Connected),
        Err(TrajectoryError::PhaseLinkage { .. })
    ));
    assert!(matches!(
        traj.link_phases(&["first", "second"], &["y"], LinkMode::Connected),
        Err(TrajectoryError::PhaseLinkage { .. })
    ));

    let mut traj = Trajectory::new("traj");
    traj.add_phase(cart("first", "ft", true, false)).unwrap();
    traj.add_phase(cart("second", "s", true, false)).unwrap();
    let err = traj
        .link_phases(&["first", "second"], &["x"], LinkMode::Auto)
        .unwrap_err();
    match err {
        TrajectoryError::PhaseLinkage { variable, .. } => assert_eq!(variable, "x"),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn evaluation_propagates_connections() {
    let _ = pretty_env_logger::try_init();
    let mut traj = two_carts(true, false);
    traj.link_phases(&["first", "second"], &["time", "x"], LinkMode::Auto)
        .unwrap();
    traj.link_phases(&["first", "second"], &["speed"], LinkMode::Constrained)
        .unwrap();
    traj.setup().unwrap();

    let first = traj.phase_mut("first").unwrap();
    first.set_time_val(0.0, 100.0, "s").unwrap();
    first.set_control_val("speed", &[10.0], "m/s").unwrap();
    first.set_state_val("x", &[0.0, 1.0], "km").unwrap();
    let second = traj.phase_mut("second").unwrap();
    second.set_time_val(0.0, 50.0, "s").unwrap();
    second.set_control_val("speed", &[20.0], "m/s").unwrap();
    second.set_state_val("x", &[0.0, 1000.0], "m").unwrap();

    let eval = traj.evaluate().unwrap();
    let second = traj.phase("second").unwrap();
    let second_eval = eval.get("second").unwrap();
    assert_relative_eq!(
        second.boundary_value(second_eval, "x", Loc::Initial).unwrap(),
        1000.0,
        epsilon = 1e-9
    );
    assert_relative_eq!(second.values().t_initial, 100.0);
    assert!(traj.check_continuity(&eval, 1e-9).is_ok());

    let residuals = traj.linkage_residuals(&eval).unwrap();
    assert_eq!(residuals.len(), 3);
    let speed = residuals
        .iter()
        .find(|r| r.linkage.variable == "speed")
        .unwrap();
    assert_relative_eq!(speed.residual, -10.0, epsilon = 1e-9);
}

#[test]
fn discontinuities_are_reported() {
    let mut traj = two_carts(true, false);
    traj.link_phases(&["first", "second"], &["x"], LinkMode::Auto)
        .unwrap();
    traj.setup().unwrap();
    for name in ["first", "second"] {
        let phase = traj.phase_mut(name).unwrap();
        phase.set_time_val(0.0, 100.0, "s").unwrap();
        phase.set_control_val("speed", &[10.0], "m/s").unwrap();
        phase.set_state_val("x", &[0.0, 1000.0], "m").unwrap();
    }
    let mut eval = traj.evaluate().unwrap();
    assert!(traj.check_continuity(&eval, 1e-9).is_ok());

    // Shift the downstream start after the fact
    let x = eval.phases[1].1.states.get_mut("x").unwrap();
    x[0] += 5.0;
    assert!(matches!(
        traj.check_continuity(&eval, 1e-9),
        Err(TrajectoryError::Discontinuity { .. })
    ));
}
