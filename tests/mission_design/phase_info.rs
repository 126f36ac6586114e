extern crate aero_mission as aero;

use crate::data_path;
use aero::io::{ConfigRepr, MissionInfo, PhaseInfo};
use aero::md::builder::{phase_info_to_builder, BuilderContext};
use aero::md::guesses::InitialGuess;
use aero::options::{OptionValue, UserOption};
use std::collections::BTreeMap;

#[test]
fn round_trip_through_the_registry() {
    if pretty_env_logger::try_init().is_err() {
        println!("could not init env_logger");
    }

    let info = PhaseInfo::default().with_option("optimize_mach", UserOption::bare(true));
    let builder = phase_info_to_builder("cruise", &info, &BuilderContext::default()).unwrap();
    assert_eq!(builder.kind().type_name(), "energy");

    let (name, back) = builder.to_phase_info();
    assert_eq!(name, "cruise");
    // Normalizing the bare flag is the only difference
    assert_ne!(back, info);
    assert_eq!(back, info.normalized());
    assert_eq!(
        back.user_options["optimize_mach"],
        UserOption::new(true, "unitless")
    );
    assert!(back.initial_guesses.is_empty());
    assert!(back.subsystem_options.is_empty());

    // And the description given was not touched
    assert_eq!(info.user_options["optimize_mach"], UserOption::bare(true));
}

#[test]
fn round_trip_keeps_guesses_and_subsystem_options() {
    let mut subsystem_options = BTreeMap::new();
    subsystem_options.insert(
        "core_aerodynamics".to_string(),
        [("method".to_string(), OptionValue::from("computed"))]
            .into_iter()
            .collect::<BTreeMap<_, _>>(),
    );
    let info = PhaseInfo {
        subsystem_options,
        ..PhaseInfo::default()
    }
    .with_option("alt_cruise", UserOption::new(11, "km"))
    .with_guess("mass", InitialGuess::new(160_000.0, "lbm"))
    .with_builder("analytic_cruise");

    let builder = phase_info_to_builder("cruise", &info, &BuilderContext::default()).unwrap();
    assert_eq!(builder.kind().type_name(), "analytic_cruise");
    let alt = builder.user_options.get_f64_in("alt_cruise", "ft").unwrap().unwrap();
    assert!((alt - 36_089.238845).abs() < 1e-5);

    let (_, back) = builder.to_phase_info();
    assert_eq!(back, info);
}

#[test]
fn load_yaml_mission() {
    let mission = MissionInfo::load(data_path("missions/climb_cruise.yaml")).unwrap();
    assert_eq!(mission.phase_names(), vec!["climb", "cruise"]);
    assert_eq!(
        mission.post_mission.as_ref().unwrap()["target_range"],
        OptionValue::from((2500, "NM"))
    );

    let climb = mission.get("climb").unwrap();
    assert_eq!(climb.initial_guesses.len(), 5);
    assert_eq!(
        climb.user_options["fix_final"],
        UserOption::bare(
            [("mass".to_string(), OptionValue::Bool(true))]
                .into_iter()
                .collect::<BTreeMap<_, _>>()
        )
    );

    // Phases are recognized as the kind whose options and guesses they use
    for (name, info) in mission.iter() {
        let builder = phase_info_to_builder(name, info, &BuilderContext::default()).unwrap();
        assert_eq!(builder.kind().type_name(), "energy");
    }

    assert!(MissionInfo::load(data_path("missions/nowhere.yaml")).is_err());
}

#[test]
fn load_toml_phase() {
    let data = std::fs::read_to_string(data_path("missions/cruise_phase.toml")).unwrap();
    let info: PhaseInfo = toml::from_str(&data).unwrap();
    assert_eq!(info.builder.as_deref(), Some("analytic_cruise"));
    assert_eq!(info.user_options["alt_cruise"], UserOption::new(11, "km"));
    assert_eq!(
        info.initial_guesses["time"],
        InitialGuess::new((0, 5), "h")
    );

    // The same description reads back from YAML
    let yaml = info.dumps().unwrap();
    assert_eq!(PhaseInfo::loads(&yaml).unwrap(), info);

    let builder = phase_info_to_builder("cruise", &info, &BuilderContext::default()).unwrap();
    assert_eq!(builder.kind().type_name(), "analytic_cruise");
    assert!(builder.user_options.get_flag_for("fix_initial", "mass").unwrap());
}
