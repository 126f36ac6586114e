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
use crate::md::phase::{PhaseError, VarKind};
use crate::options::AircraftValues;
use approx::assert_relative_eq;
use rstest::rstest;

fn guess(values: Vec<f64>, units: &str) -> InitialGuess {
    InitialGuess::new(values, units)
}

fn energy_guesses() -> BTreeMap<String, InitialGuess> {
    [
        ("time", guess(vec![0.0, 1800.0], "s")),
        ("mass", guess(vec![170_000.0, 165_000.0], "lbm")),
        ("distance", guess(vec![0.0, 200.0], "NM")),
        ("mach", guess(vec![0.3, 0.78], "unitless")),
        ("altitude", guess(vec![0.0, 35_000.0], "ft")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

#[test]
fn phase_info_round_trip() {
    let info = PhaseInfo::default().with_option("optimize_mach", UserOption::bare(true));
    let builder =
        PhaseBuilder::from_phase_info(Arc::new(EnergyPhase), "cruise", &info, &BuilderContext::default())
            .unwrap();

    // The description is read from a copy
    assert_eq!(
        info.user_options["optimize_mach"],
        UserOption::Bare(OptionValue::Bool(true))
    );
    assert!(!info.is_normalized());

    let (name, back) = builder.to_phase_info();
    assert_eq!(name, "cruise");
    assert_eq!(back, info.normalized());
    assert_eq!(back.user_options["optimize_mach"], UserOption::new(true, "unitless"));
    assert!(back.builder.is_none());

    let info = info.with_builder("energy");
    let builder =
        PhaseBuilder::from_phase_info(Arc::new(EnergyPhase), "cruise", &info, &BuilderContext::default())
            .unwrap();
    assert_eq!(builder.to_phase_info().1, info.normalized());
}

#[test]
fn defaults_are_not_emitted() {
    let builder = PhaseBuilder::new(Arc::new(TwoDofPhase), None, &BTreeMap::new(), BTreeMap::new())
        .unwrap();
    assert_eq!(builder.name, "two_dof_phase");
    let (_, info) = builder.to_phase_info();
    assert!(info.user_options.is_empty());
    assert!(info.initial_guesses.is_empty());
    // Defaults are still readable
    assert_eq!(builder.user_options.get_f64("throttle").unwrap(), Some(1.0));
}

#[rstest]
#[case(Arc::new(EnergyPhase))]
#[case(Arc::new(TwoDofPhase))]
#[case(Arc::new(AnalyticCruisePhase))]
fn guess_validation(#[case] kind: Arc<dyn PhaseKind>) {
    let supported: BTreeMap<String, InitialGuess> = kind
        .guess_registry()
        .keys()
        .into_iter()
        .map(|k| (k.to_string(), guess(vec![0.0], "unitless")))
        .collect();
    assert!(!supported.is_empty());
    PhaseBuilder::new(kind.clone(), None, &BTreeMap::new(), supported.clone()).unwrap();

    let mut guesses = supported;
    guesses.insert("flux".to_string(), guess(vec![1.0], "unitless"));
    match PhaseBuilder::new(kind.clone(), None, &BTreeMap::new(), guesses) {
        Err(BuilderError::Guess {
            source: GuessError::UnsupportedGuess { builder, keys, .. },
        }) => {
            assert_eq!(builder, kind.type_name());
            assert_eq!(keys, vec!["flux".to_string()]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_options_are_rejected() {
    let options: BTreeMap<String, UserOption> =
        [("alt_cruise".to_string(), UserOption::new(30_000.0, "ft"))]
            .into_iter()
            .collect();
    assert!(matches!(
        PhaseBuilder::new(Arc::new(EnergyPhase), None, &options, BTreeMap::new()),
        Err(BuilderError::Options {
            source: OptionsError::UnknownOption { .. },
            ..
        })
    ));
    PhaseBuilder::new(Arc::new(AnalyticCruisePhase), None, &options, BTreeMap::new()).unwrap();
}

#[test]
fn build_energy_phase() {
    let _ = pretty_env_logger::try_init();
    let options: BTreeMap<String, UserOption> = [
        ("optimize_mach", UserOption::bare(true)),
        ("num_segments", UserOption::bare(2)),
        ("initial_mach", UserOption::bare(0.3)),
        ("fix_initial", UserOption::bare(true)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let builder = PhaseBuilder::new(Arc::new(EnergyPhase), Some("climb"), &options, energy_guesses())
        .unwrap();
    let phase = builder.build_phase(&AircraftValues::new()).unwrap();

    assert!(phase.is_set_up());
    assert_eq!(phase.name(), "climb");
    assert_eq!(
        phase.states().iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec!["mass", "distance"]
    );
    assert!(phase.states().iter().all(|s| s.fix_initial));
    assert_eq!(phase.var_kind("mach"), Some(VarKind::Control));
    assert!(phase.control("mach").unwrap().opt);
    assert!(!phase.control("altitude").unwrap().opt);
    // Only the optimized Mach number gets its initial value pinned
    assert_eq!(phase.boundary_constraints().len(), 1);
    assert_eq!(phase.path_constraints().len(), 1);

    assert_relative_eq!(phase.values().t_duration, 1800.0);
    assert_relative_eq!(phase.values().states["mass"][0], 170_000.0);
    assert_relative_eq!(phase.values().controls["mach"][0], 0.3, epsilon = 1e-12);
    let altitude = &phase.values().controls["altitude"];
    assert_relative_eq!(altitude[0], 0.0, epsilon = 1e-9);
    assert_relative_eq!(altitude[altitude.len() - 1], 35_000.0, epsilon = 1e-6);

    let eval = phase.evaluate().unwrap();
    assert_eq!(eval.time.len(), phase.grid().num_nodes());
}

#[test]
fn build_two_dof_phase() {
    let options: BTreeMap<String, UserOption> = [
        ("final_altitude", UserOption::new(3048.0, "m")),
        ("final_mach", UserOption::bare(0.7)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let guesses: BTreeMap<String, InitialGuess> = [
        ("time", guess(vec![0.0, 600.0], "s")),
        ("velocity", guess(vec![150.0, 250.0], "kn")),
        ("altitude", guess(vec![500.0, 10_000.0], "ft")),
        ("throttle", guess(vec![0.95], "unitless")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let builder = PhaseBuilder::new(Arc::new(TwoDofPhase), Some("climb"), &options, guesses).unwrap();
    let phase = builder.build_phase(&AircraftValues::new()).unwrap();

    assert_eq!(phase.states().len(), 5);
    assert!(phase.state("flight_path_angle").unwrap().fix_initial);
    assert!(!phase.state("altitude").unwrap().fix_initial);
    assert_eq!(phase.var_kind("throttle"), Some(VarKind::Parameter));
    assert_relative_eq!(phase.values().parameters["throttle"], 0.95);
    let altitude = phase
        .boundary_constraints()
        .iter()
        .find(|c| c.name == "altitude")
        .unwrap();
    assert_relative_eq!(altitude.equals.unwrap(), 10_000.0, epsilon = 1e-9);
    assert_eq!(phase.boundary_constraints().len(), 2);
}

#[test]
fn build_analytic_cruise() {
    let guesses: BTreeMap<String, InitialGuess> = [
        ("time", guess(vec![0.0, 3.0], "h")),
        ("mass", guess(vec![165_000.0], "lbm")),
        ("distance", guess(vec![200.0], "NM")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let builder =
        PhaseBuilder::new(Arc::new(AnalyticCruisePhase), None, &BTreeMap::new(), guesses).unwrap();
    let phase = builder.build_phase(&AircraftValues::new()).unwrap();

    assert!(phase.is_analytic());
    assert_eq!(phase.name(), "cruise");
    assert_eq!(phase.grid().num_nodes(), 2);
    assert_relative_eq!(phase.values().t_duration, 10_800.0);
    assert_eq!(phase.values().states["mass"].len(), 1);
    assert_relative_eq!(phase.values().parameters["altitude"], 35_000.0);

    let eval = phase.evaluate().unwrap();
    let initial = phase.boundary_value(&eval, "mass", Loc::Initial).unwrap();
    let last = phase.boundary_value(&eval, "mass", Loc::Final).unwrap();
    assert_relative_eq!(initial, 165_000.0, epsilon = 1e-6);
    assert!(last < initial, "cruise burns fuel: {initial} -> {last}");
}

#[test]
fn user_defined_constraints() {
    let constraint = |kind: &str| {
        let kwargs: BTreeMap<String, OptionValue> = [
            ("type", OptionValue::from(kind)),
            ("target", OptionValue::from("mach")),
            ("upper", OptionValue::from(0.85)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let constraints: BTreeMap<String, OptionValue> =
            [("max_mach".to_string(), OptionValue::Map(kwargs))]
                .into_iter()
                .collect();
        let options: BTreeMap<String, UserOption> =
            [("constraints".to_string(), UserOption::bare(constraints))]
                .into_iter()
                .collect();
        PhaseBuilder::new(Arc::new(EnergyPhase), None, &options, energy_guesses()).unwrap()
    };

    let phase = constraint("path").build_phase(&AircraftValues::new()).unwrap();
    assert!(phase.path_constraints().iter().any(|c| c.name == "max_mach"));

    match constraint("initial").build_phase(&AircraftValues::new()) {
        Err(BuilderError::InvalidConstraint { name, .. }) => assert_eq!(name, "max_mach"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn throttle_enforcement() {
    let builder = |value: &str| {
        let options: BTreeMap<String, UserOption> =
            [("throttle_enforcement".to_string(), UserOption::bare(value))]
                .into_iter()
                .collect();
        PhaseBuilder::new(Arc::new(EnergyPhase), None, &options, BTreeMap::new()).unwrap()
    };

    let phase = builder("boundary_constraint")
        .build_phase(&AircraftValues::new())
        .unwrap();
    assert!(phase.path_constraints().is_empty());
    assert_eq!(phase.boundary_constraints().len(), 2);

    let phase = builder("bounded").build_phase(&AircraftValues::new()).unwrap();
    assert!(phase.path_constraints().is_empty());

    assert!(matches!(
        builder("sometimes").build_phase(&AircraftValues::new()),
        Err(BuilderError::Options {
            source: OptionsError::InvalidOptionValue { .. },
            ..
        })
    ));
}

#[test]
fn helpers_declare_once() {
    let builder = PhaseBuilder::new(Arc::new(EnergyPhase), None, &BTreeMap::new(), BTreeMap::new())
        .unwrap();
    let mut phase = builder.build_phase(&AircraftValues::new()).unwrap();
    assert!(matches!(
        builder.add_mass_state(&mut phase),
        Err(BuilderError::Phase {
            source: PhaseError::DuplicateVariable { .. }
        })
    ));
}

#[test]
fn default_transcription() {
    let with_order = |num_segments: i64, order: Vec<i64>| {
        let options: BTreeMap<String, UserOption> = [
            ("num_segments".to_string(), UserOption::bare(num_segments)),
            ("order".to_string(), UserOption::bare(order)),
        ]
        .into_iter()
        .collect();
        PhaseBuilder::new(Arc::new(TwoDofPhase), None, &options, BTreeMap::new()).unwrap()
    };

    let tx = with_order(2, vec![3, 4]).make_default_transcription().unwrap();
    assert_eq!(tx.grid().num_nodes(), 9);
    assert_eq!(tx.grid().num_state_inputs, 8);

    let tx = with_order(3, vec![5]).make_default_transcription().unwrap();
    assert_eq!(tx.grid().num_nodes(), 18);

    assert!(matches!(
        with_order(3, vec![3, 4]).make_default_transcription(),
        Err(BuilderError::InvalidTranscription { .. })
    ));

    // A transcription given directly is checked before the grid is laid out
    let builder = with_order(2, vec![3]).with_transcription(Transcription::Radau {
        num_segments: 2,
        orders: vec![3],
        compressed: true,
    });
    assert_eq!(
        builder.build_phase(&AircraftValues::new()).unwrap_err(),
        BuilderError::InvalidTranscription {
            phase: "two_dof_phase".into(),
            source: TranscriptionError::OrderMismatch {
                num_segments: 2,
                num_orders: 1
            }
        }
    );
}

#[test]
fn unknown_external_subsystem() {
    let mut info = PhaseInfo::default();
    info.external_subsystems.push("battery".to_string());
    assert_eq!(
        PhaseBuilder::from_phase_info(Arc::new(EnergyPhase), "climb", &info, &BuilderContext::default())
            .unwrap_err(),
        BuilderError::UnknownSubsystem {
            phase: "climb".into(),
            name: "battery".into()
        }
    );
}
