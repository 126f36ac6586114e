extern crate aero_mission as aero;

use approx::assert_relative_eq;

use aero::dynamics::{EnergyOde, OdeClass};
use aero::io::PhaseInfo;
use aero::linalg::DVector;
use aero::md::builder::{
    phase_info_to_builder, register, registry::registered_kinds, BuilderContext, BuilderError,
    EnergyPhase, PhaseBuilder, PhaseKind, RegistryError,
};
use aero::md::guesses::{state_guess, time_guess, GuessRegistry};
use aero::md::phase::{ControlOptions, Phase};
use aero::md::trajectory::LinkMode;
use aero::options::{AircraftValues, OptionKind, OptionMeta, OptionsSchema, UserOption};
use lazy_static::lazy_static;
use std::sync::Arc;

lazy_static! {
    static ref SCHEMA: OptionsSchema = OptionsSchema::phase_base().declare(
        OptionMeta::builder()
            .name("cruise_mach")
            .default(0.78)
            .kind(OptionKind::Float)
            .build(),
    );
    static ref GUESSES: GuessRegistry = GuessRegistry::new()
        .with(vec![
            ("time", time_guess(), "[initial time, duration]"),
            ("mass", state_guess("mass"), "[initial, final] mass"),
        ])
        .unwrap();
}

/// Constant Mach, constant altitude flight, as a plug-in kind.
#[derive(Debug)]
struct LevelFlight;

impl PhaseKind for LevelFlight {
    fn type_name(&self) -> &str {
        "level_flight"
    }

    fn default_name(&self) -> &str {
        "level"
    }

    fn options_schema(&self) -> &OptionsSchema {
        &SCHEMA
    }

    fn guess_registry(&self) -> &GuessRegistry {
        &GUESSES
    }

    fn default_ode_class(&self) -> Arc<dyn OdeClass> {
        Arc::new(EnergyOde)
    }

    fn configure(&self, builder: &PhaseBuilder, phase: &mut Phase) -> Result<(), BuilderError> {
        builder.set_time_options(phase, &[])?;
        builder.add_mass_state(phase)?;
        builder.add_distance_state(phase)?;
        let mach = builder
            .user_options
            .get_f64("cruise_mach")
            .map_err(|source| BuilderError::Options {
                phase: builder.name.clone(),
                source,
            })?
            .unwrap_or(0.78);
        for control in [
            ControlOptions::builder()
                .name("mach")
                .opt(false)
                .order(0)
                .build(),
            ControlOptions::builder()
                .name("altitude")
                .units("ft")
                .opt(false)
                .order(0)
                .build(),
        ] {
            phase
                .add_control(control)
                .map_err(|source| BuilderError::Phase { source })?;
        }
        phase
            .set_control_nodes("mach", DVector::from_element(1, mach))
            .map_err(|source| BuilderError::Phase { source })?;
        phase
            .set_control_nodes("altitude", DVector::from_element(1, 35_000.0))
            .map_err(|source| BuilderError::Phase { source })
    }

    fn linked_variables(
        &self,
        _builder: &PhaseBuilder,
    ) -> Result<Vec<(String, LinkMode)>, BuilderError> {
        Ok(vec![
            ("time".to_string(), LinkMode::Connected),
            ("mass".to_string(), LinkMode::Connected),
        ])
    }
}

#[test]
fn plug_in_kind() {
    if pretty_env_logger::try_init().is_err() {
        println!("could not init env_logger");
    }

    let kinds = registered_kinds();
    assert_eq!(&kinds[..3], &["energy", "two_dof", "analytic_cruise"]);

    register(Arc::new(LevelFlight), true).unwrap();
    assert_eq!(
        register(Arc::new(LevelFlight), true),
        Err(RegistryError::DuplicateRegistration {
            kind: "level_flight".to_string()
        })
    );
    assert!(registered_kinds().contains(&"level_flight".to_string()));

    // Recognized from its own option
    let info = PhaseInfo::default().with_option("cruise_mach", UserOption::bare(0.8));
    let builder = phase_info_to_builder("level", &info, &BuilderContext::default()).unwrap();
    assert_eq!(builder.kind().type_name(), "level_flight");

    let info = info.with_guess(
        "mass",
        aero::md::guesses::InitialGuess::new(vec![150_000.0, 140_000.0], "lbm"),
    );
    let phase = phase_info_to_builder("level", &info, &BuilderContext::default())
        .unwrap()
        .build_phase(&AircraftValues::new())
        .unwrap();
    assert_relative_eq!(phase.values().controls["mach"][0], 0.8);
    assert_relative_eq!(phase.values().states["mass"][0], 150_000.0, max_relative = 1e-12);
}

#[test]
fn builtin_kinds_cannot_be_registered_twice() {
    assert_eq!(
        register(Arc::new(EnergyPhase), true),
        Err(RegistryError::DuplicateRegistration {
            kind: "energy".to_string()
        })
    );
}

#[test]
fn unsupported_descriptions() {
    let info = PhaseInfo::default().with_option("warp_factor", UserOption::bare(9));
    assert!(matches!(
        phase_info_to_builder("jump", &info, &BuilderContext::default()),
        Err(RegistryError::UnsupportedPhaseInfo { .. })
    ));

    let info = PhaseInfo::default().with_builder("rocket");
    assert!(matches!(
        phase_info_to_builder("jump", &info, &BuilderContext::default()),
        Err(RegistryError::UnsupportedPhaseInfo { .. })
    ));

    // A named kind is the only one tried
    let info = PhaseInfo::default()
        .with_option("alt_cruise", UserOption::new(30_000, "ft"))
        .with_builder("energy");
    assert!(matches!(
        phase_info_to_builder("cruise", &info, &BuilderContext::default()),
        Err(RegistryError::Builder { .. })
    ));
}

#[test]
fn recognition_order() {
    // Options shared by every kind go to the first one registered
    let info = PhaseInfo::default().with_option("num_segments", UserOption::bare(3));
    let builder = phase_info_to_builder("any", &info, &BuilderContext::default()).unwrap();
    assert_eq!(builder.kind().type_name(), "energy");

    // Guesses narrow it down
    let info = info.with_guess(
        "velocity",
        aero::md::guesses::InitialGuess::new(vec![200.0, 250.0], "kn"),
    );
    let builder = phase_info_to_builder("any", &info, &BuilderContext::default()).unwrap();
    assert_eq!(builder.kind().type_name(), "two_dof");
}
