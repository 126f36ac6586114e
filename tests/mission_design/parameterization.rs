extern crate aero_mission as aero;

use aero::io::{MissionInfo, PhaseInfo};
use aero::md::default_phase_info::{height_energy_mission, two_dof_mission};
use aero::md::guesses::InitialGuess;
use aero::md::trajectory::{
    height_energy_parameterization, two_dof_parameterization, MissionBuilder, TrajectoryError,
};
use aero::options::{AircraftValues, OptionValue, UserOption};
use aero::variables::mission;
use approx::assert_relative_eq;

fn design_aircraft() -> AircraftValues {
    let mut values = AircraftValues::new();
    values.set_val(mission::CRUISE_ALTITUDE, 30_000.0, "ft");
    values.set_val(mission::CRUISE_MACH, 0.75, "unitless");
    values.set_val(mission::DESIGN_RANGE, 2_000.0, "NM");
    values.set_val(mission::GROSS_MASS, 80_000.0, "kg");
    values
}

#[test]
fn height_energy_cruise_condition() {
    if pretty_env_logger::try_init().is_err() {
        println!("could not init env_logger");
    }

    let info = MissionBuilder::new(height_energy_mission())
        .parameterize(height_energy_parameterization, &design_aircraft())
        .unwrap()
        .into_info();

    let cruise = info.get("cruise").unwrap();
    for name in ["initial_altitude", "final_altitude"] {
        assert_eq!(cruise.user_options[name], UserOption::new(30_000.0, "ft"));
    }
    for name in ["initial_mach", "final_mach"] {
        assert_eq!(cruise.user_options[name], UserOption::new(0.75, "unitless"));
    }
    let climb = info.get("climb").unwrap();
    assert_eq!(climb.user_options["final_altitude"], UserOption::new(30_000.0, "ft"));
    // The climb start is left alone
    assert_eq!(climb.user_options["initial_mach"], UserOption::new(0.2, "unitless"));
    let descent = info.get("descent").unwrap();
    assert_eq!(descent.user_options["initial_mach"], UserOption::new(0.75, "unitless"));
    assert_eq!(descent.user_options["final_altitude"], UserOption::new(500.0, "ft"));

    let post = info.post_mission.as_ref().unwrap();
    assert_eq!(post[mission::TARGET_RANGE], OptionValue::from((2_000.0, "NM")));
    assert_eq!(post["include_landing"], OptionValue::Bool(false));
}

#[test]
fn default_design_values_leave_the_mission_alone() {
    let mission = height_energy_mission();
    let info = MissionBuilder::new(mission.clone())
        .parameterize(height_energy_parameterization, &AircraftValues::new())
        .unwrap()
        .into_info();
    assert_eq!(info, mission);

    // Same inputs given in other units are still the defaults
    let mut values = AircraftValues::new();
    values.set_val(mission::CRUISE_ALTITUDE, 10_668.0, "m");
    values.set_val(mission::GROSS_MASS, 175_000.0, "lbm");
    let info = MissionBuilder::new(two_dof_mission())
        .parameterize(two_dof_parameterization, &values)
        .unwrap()
        .into_info();
    assert_eq!(info, two_dof_mission());
}

#[test]
fn only_changed_design_values_are_written() {
    let mut values = AircraftValues::new();
    values.set_val(mission::CRUISE_ALTITUDE, 10_000.0, "m");
    let info = MissionBuilder::new(height_energy_mission())
        .parameterize(height_energy_parameterization, &values)
        .unwrap()
        .into_info();
    let cruise = info.get("cruise").unwrap();
    let altitude = cruise.user_options["initial_altitude"]
        .value()
        .as_f64()
        .unwrap();
    assert_relative_eq!(altitude, 32_808.398950131, max_relative = 1e-9);
    // The Mach number and range of the description are kept
    let original = height_energy_mission();
    let original_cruise = original.get("cruise").unwrap();
    for name in ["initial_mach", "final_mach"] {
        assert_eq!(cruise.user_options[name], original_cruise.user_options[name]);
    }
    assert_eq!(info.post_mission, original.post_mission);
}

#[test]
fn two_dof_pins_mass_and_range() {
    let info = MissionBuilder::new(two_dof_mission())
        .parameterize(two_dof_parameterization, &design_aircraft())
        .unwrap()
        .into_info();

    let cruise = info.get("cruise").unwrap();
    assert_eq!(cruise.user_options["alt_cruise"], UserOption::new(30_000.0, "ft"));
    assert_eq!(cruise.user_options["mach_cruise"], UserOption::new(0.75, "unitless"));

    let mass = info.get("climb").unwrap().initial_guesses["mass"]
        .values("mass")
        .unwrap();
    assert_relative_eq!(mass[0], 176_369.809, max_relative = 1e-6);
    assert_relative_eq!(mass[1], 171_000.0);

    let distance = info.get("descent").unwrap().initial_guesses["distance"]
        .values("distance")
        .unwrap();
    assert_relative_eq!(distance[0], 2_800.0);
    assert_relative_eq!(distance[1], 2_000.0);
    // Other guesses are untouched
    assert_eq!(
        info.get("cruise").unwrap().initial_guesses["distance"],
        InitialGuess::new(vec![150.0, 2_800.0], "NM")
    );
}

#[test]
fn two_dof_creates_missing_guesses() {
    let mission = MissionInfo::new()
        .with_phase("cruise", PhaseInfo::default().with_option("mach_cruise", UserOption::bare(0.8)));
    let info = MissionBuilder::new(mission)
        .parameterize(two_dof_parameterization, &design_aircraft())
        .unwrap()
        .into_info();
    let cruise = info.get("cruise").unwrap();
    let distance = cruise.initial_guesses["distance"].values("distance").unwrap();
    assert_eq!(distance, vec![2_000.0, 2_000.0]);
    assert_eq!(cruise.initial_guesses["mass"].units(), "lbm");
}

#[test]
fn missing_phases_are_skipped() {
    let mission = MissionInfo::new().with_phase("climb", PhaseInfo::default());
    let info = MissionBuilder::new(mission)
        .parameterize(height_energy_parameterization, &design_aircraft())
        .unwrap()
        .into_info();
    assert_eq!(info.phase_names(), vec!["climb"]);
    assert_eq!(info.get("climb").unwrap().user_options.len(), 2);
}

#[test]
fn skipping_leaves_the_mission_alone() {
    let mission = height_energy_mission();
    let info = MissionBuilder::new(mission.clone())
        .skip_parameterization()
        .into_info();
    assert_eq!(info, mission);
}

#[test]
fn bad_guesses() {
    let mission = MissionInfo::new().with_phase(
        "climb",
        PhaseInfo::default().with_guess("mass", InitialGuess::new(vec![1.0, 2.0], "ft")),
    );
    let err = MissionBuilder::new(mission)
        .parameterize(two_dof_parameterization, &design_aircraft())
        .unwrap_err();
    assert!(matches!(err, TrajectoryError::GuessUnits { ref key, .. } if key == "mass"));

    let mission = MissionInfo::new().with_phase(
        "climb",
        PhaseInfo::default().with_guess("mass", InitialGuess::new("heavy", "lbm")),
    );
    let err = MissionBuilder::new(mission)
        .parameterize(two_dof_parameterization, &design_aircraft())
        .unwrap_err();
    assert!(matches!(
        err,
        TrajectoryError::GuessParameterization { ref key, .. } if key == "mass"
    ));
}
