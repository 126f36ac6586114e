extern crate aero_mission as aero;

use aero::md::builder::{AnalyticCruisePhase, EnergyPhase, PhaseKind, TwoDofPhase};
use aero::options::{OptionValue, OptionsError, OptionsSchema, PhaseOptions, UserOption};
use rstest::*;
use std::collections::BTreeMap;
use std::sync::Arc;

fn options(entries: Vec<(&str, UserOption)>) -> BTreeMap<String, UserOption> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[test]
fn explicit_units_are_honored() {
    if pretty_env_logger::try_init().is_err() {
        println!("could not init env_logger");
    }

    let opts = PhaseOptions::new(
        &OptionsSchema::phase_base(),
        &options(vec![
            ("fix_initial", UserOption::bare(true)),
            ("duration_bounds", UserOption::new((0.5, 1.5), "s")),
        ]),
    )
    .unwrap();

    assert_eq!(opts.get("fix_initial").unwrap(), &OptionValue::Bool(true));
    assert!(opts.get_bool("fix_initial").unwrap());
    assert_eq!(
        opts.get_bounds_in("duration_bounds", "s").unwrap(),
        (Some(0.5), Some(1.5))
    );
    assert_eq!(
        opts.get_in("duration_bounds", "s").unwrap(),
        OptionValue::Seq(vec![OptionValue::Float(0.5), OptionValue::Float(1.5)])
    );
    // Defaults
    assert_eq!(opts.get_usize("num_segments").unwrap(), 5);
    assert!(!opts.is_explicit("num_segments"));
}

#[test]
fn conversions() {
    let opts = PhaseOptions::new(
        &OptionsSchema::phase_base(),
        &options(vec![("duration_bounds", UserOption::new((30, 90), "min"))]),
    )
    .unwrap();
    assert_eq!(
        opts.get_bounds_in("duration_bounds", "s").unwrap(),
        (Some(1800.0), Some(5400.0))
    );
    let (lo, hi) = opts.get_bounds_in("duration_bounds", "h").unwrap();
    assert!((lo.unwrap() - 0.5).abs() < 1e-12);
    assert!((hi.unwrap() - 1.5).abs() < 1e-12);
    // The option is emitted the way it was given
    assert_eq!(
        opts.to_phase_info()["duration_bounds"],
        UserOption::new((30, 90), "min")
    );
}

#[rstest]
#[case::unknown("fix_everything", UserOption::bare(true))]
#[case::wrong_dimension("duration_bounds", UserOption::new((0.5, 1.5), "ft"))]
#[case::wrong_shape("num_segments", UserOption::bare("five"))]
#[case::negative_order("order", UserOption::bare(-3))]
fn rejected_options(#[case] name: &str, #[case] option: UserOption) {
    let err = PhaseOptions::new(&OptionsSchema::phase_base(), &options(vec![(name, option)]))
        .unwrap_err();
    match err {
        OptionsError::UnknownOption { name: n }
        | OptionsError::UnitMismatch { name: n, .. }
        | OptionsError::InvalidOptionValue { name: n, .. } => assert_eq!(n, name),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn reading_an_unknown_option() {
    let opts = PhaseOptions::new(&OptionsSchema::phase_base(), &BTreeMap::new()).unwrap();
    assert!(matches!(
        opts.get("optimize_mach"),
        Err(OptionsError::UnknownOption { .. })
    ));
}

/// Every declared option of every kind is readable in its own units.
#[rstest]
#[case(Arc::new(EnergyPhase))]
#[case(Arc::new(TwoDofPhase))]
#[case(Arc::new(AnalyticCruisePhase))]
fn schemas_are_readable(#[case] kind: Arc<dyn PhaseKind>) {
    let schema = kind.options_schema();
    let opts = PhaseOptions::new(schema, &BTreeMap::new()).unwrap();
    for meta in schema.iter() {
        assert!(meta.kind.accepts(&meta.default), "default of {}", meta.name);
        let value = opts.get_in(&meta.name, &meta.units).unwrap();
        assert_eq!(value, meta.default, "{}", meta.name);
    }
}
