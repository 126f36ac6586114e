extern crate aero_mission as aero;

use crate::data_path;
use aero::io::{ConfigRepr, MissionInfo};
use aero::md::builder::BuilderContext;
use aero::md::default_phase_info::{height_energy_mission, two_dof_mission};
use aero::md::phase::Loc;
use aero::md::trajectory::{
    height_energy_parameterization, two_dof_parameterization, Continuity, LinkMode,
    MissionBuilder, Trajectory,
};
use aero::opti::Problem;
use aero::options::AircraftValues;
use approx::assert_relative_eq;

#[test]
fn climb_then_cruise() {
    if pretty_env_logger::try_init().is_err() {
        println!("could not init env_logger");
    }

    let mission = MissionInfo::load(data_path("missions/climb_cruise.yaml")).unwrap();
    let builders = MissionBuilder::new(mission)
        .skip_parameterization()
        .builders(&BuilderContext::default())
        .unwrap();
    assert_eq!(builders.len(), 2);

    let aircraft = AircraftValues::new();
    let mut traj = Trajectory::new("traj");
    for builder in &builders {
        traj.add_phase(builder.build_phase_in("traj", &aircraft).unwrap())
            .unwrap();
    }
    assert_eq!(traj.phase_names(), vec!["climb", "cruise"]);

    // The cruise mass is fixed at its start, so it gets connected
    traj.link_phases(&["climb", "cruise"], &["mass"], LinkMode::Auto)
        .unwrap();
    traj.link_phases(&["climb", "cruise"], &["time"], LinkMode::Connected)
        .unwrap();
    assert!(traj
        .linkages()
        .iter()
        .all(|l| l.continuity == Continuity::Connection));

    let eval = traj.evaluate().unwrap();
    let climb = traj.phase("climb").unwrap();
    let cruise = traj.phase("cruise").unwrap();
    let climb_mass = climb
        .boundary_value(eval.get("climb").unwrap(), "mass", Loc::Final)
        .unwrap();
    let cruise_mass = cruise
        .boundary_value(eval.get("cruise").unwrap(), "mass", Loc::Initial)
        .unwrap();
    assert!((climb_mass - cruise_mass).abs() < 1e-9);

    let climb_end = climb
        .boundary_value(eval.get("climb").unwrap(), "time", Loc::Final)
        .unwrap();
    let cruise_start = cruise
        .boundary_value(eval.get("cruise").unwrap(), "time", Loc::Initial)
        .unwrap();
    assert_relative_eq!(climb_end, cruise_start, max_relative = 1e-12);

    traj.check_continuity(&eval, 1e-9).unwrap();
}

#[test]
fn height_energy_mission_end_to_end() {
    if pretty_env_logger::try_init().is_err() {
        println!("could not init env_logger");
    }

    let aircraft = AircraftValues::new();
    let (mut traj, builders) = MissionBuilder::new(height_energy_mission())
        .parameterize(height_energy_parameterization, &aircraft)
        .unwrap()
        .build_trajectory("traj", &aircraft, &BuilderContext::default())
        .unwrap();
    assert_eq!(builders.len(), 3);
    assert_eq!(traj.phases().len(), 3);
    // Time, mass and distance between each pair, Mach and altitude are not optimized
    assert_eq!(traj.linkages().len(), 6);

    let eval = traj.evaluate().unwrap();
    assert_eq!(eval.phases.len(), 3);
    traj.check_continuity(&eval, 1e-9).unwrap();

    let residuals = traj.linkage_residuals(&eval).unwrap();
    assert!(residuals.iter().all(|r| r.residual.abs() < 1e-6));

    let problem = Problem::from_trajectory(&traj);
    assert!(problem.num_variables() > 0);
    assert!(problem.num_constraints() > 0);
}

#[test]
fn two_dof_mission_end_to_end() {
    if pretty_env_logger::try_init().is_err() {
        println!("could not init env_logger");
    }

    let aircraft = AircraftValues::new();
    let (mut traj, builders) = MissionBuilder::new(two_dof_mission())
        .parameterize(two_dof_parameterization, &aircraft)
        .unwrap()
        .build_trajectory("traj", &aircraft, &BuilderContext::default())
        .unwrap();
    let kinds: Vec<&str> = builders.iter().map(|b| b.kind().type_name()).collect();
    assert_eq!(kinds, vec!["two_dof", "analytic_cruise", "two_dof"]);
    assert_eq!(traj.linkages().len(), 6);

    let eval = traj.evaluate().unwrap();
    let climb_mass = traj
        .phase("climb")
        .unwrap()
        .boundary_value(eval.get("climb").unwrap(), "mass", Loc::Final)
        .unwrap();
    let cruise_mass = traj
        .phase("cruise")
        .unwrap()
        .boundary_value(eval.get("cruise").unwrap(), "mass", Loc::Initial)
        .unwrap();
    assert_relative_eq!(climb_mass, cruise_mass, max_relative = 1e-12);
    traj.check_continuity(&eval, 1e-9).unwrap();
}

#[test]
fn phases_must_exist_to_be_linked() {
    let mut traj = Trajectory::new("traj");
    assert!(traj
        .link_phases(&["climb", "cruise"], &["mass"], LinkMode::Connected)
        .is_err());
}
