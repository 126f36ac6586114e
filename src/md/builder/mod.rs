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

use crate::dynamics::{DynamicsError, OdeClass, OdeInitKwargs, SubsystemBuilder, SubsystemCatalog};
use crate::io::PhaseInfo;
use crate::md::guesses::{GuessError, GuessRegistry, InitialGuess};
use crate::md::phase::{
    ConstraintOptions, ControlOptions, Loc, Phase, PhaseError, StateOptions, TimeOptions,
};
use crate::md::trajectory::LinkMode;
use crate::md::transcription::{Transcription, TranscriptionError};
use crate::options::{
    AircraftValues, MetaData, OptionKind, OptionMeta, OptionValue, OptionsError, OptionsSchema,
    PhaseOptions, UserOption, DEFAULT_META_DATA,
};
use crate::variables::dynamic;
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

mod analytic_cruise;
mod energy;
pub mod registry;
mod two_dof;

pub use analytic_cruise::AnalyticCruisePhase;
pub use energy::EnergyPhase;
pub use registry::{phase_info_to_builder, register, PhaseBuilderRegistry, RegistryError};
pub use two_dof::TwoDofPhase;

/// Name of the trajectory a phase built on its own is reported against.
pub const DEFAULT_TRAJECTORY: &str = "traj";

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BuilderError {
    #[snafu(display("phase {phase}: {source}"))]
    Options { phase: String, source: OptionsError },
    #[snafu(display("{source}"))]
    Guess { source: GuessError },
    #[snafu(display("{source}"))]
    Phase { source: PhaseError },
    #[snafu(display("phase {phase}: cannot build the ODE: {source}"))]
    Dynamics { phase: String, source: DynamicsError },
    #[snafu(display("phase {phase}: {source}"))]
    InvalidTranscription {
        phase: String,
        source: TranscriptionError,
    },
    #[snafu(display("phase {phase}: constraint `{name}` {reason}"))]
    InvalidConstraint {
        phase: String,
        name: String,
        reason: String,
    },
    #[snafu(display("phase {phase}: unknown external subsystem `{name}`"))]
    UnknownSubsystem { phase: String, name: String },
}

/// A kind of mission phase: its options, supported initial guesses, equations and variables.
pub trait PhaseKind: Send + Sync + fmt::Debug {
    /// Name used to register this kind and to tag phase descriptions.
    fn type_name(&self) -> &str;

    fn default_name(&self) -> &str;

    fn options_schema(&self) -> &OptionsSchema;

    fn guess_registry(&self) -> &GuessRegistry;

    fn default_ode_class(&self) -> Arc<dyn OdeClass>;

    /// Analytic phases are evaluated on a fixed number of nodes without collocation.
    fn is_analytic(&self) -> bool {
        false
    }

    fn default_num_nodes(&self) -> usize {
        5
    }

    fn extra_ode_init_kwargs(
        &self,
        _builder: &PhaseBuilder,
    ) -> Result<BTreeMap<String, OptionValue>, BuilderError> {
        Ok(BTreeMap::new())
    }

    /// Declares the time options, states, controls, parameters and constraints of the phase.
    fn configure(&self, builder: &PhaseBuilder, phase: &mut Phase) -> Result<(), BuilderError>;

    /// Whether a phase description can be read as this kind of phase.
    fn recognizes(&self, info: &PhaseInfo) -> bool {
        let schema = self.options_schema();
        let guesses = self.guess_registry();
        info.user_options.keys().all(|k| schema.contains(k))
            && info.initial_guesses.keys().all(|k| guesses.contains(k))
    }

    /// Variables shared with the adjacent phases of a mission, and how to link them.
    fn linked_variables(&self, builder: &PhaseBuilder)
        -> Result<Vec<(String, LinkMode)>, BuilderError>;
}

/// What a phase description needs from its surroundings to become a builder.
#[derive(Clone, Debug, Default)]
pub struct BuilderContext {
    pub core_subsystems: Vec<Arc<dyn SubsystemBuilder>>,
    /// Subsystems phase descriptions may reference by name.
    pub catalog: SubsystemCatalog,
    pub meta_data: Option<Arc<MetaData>>,
    pub transcription: Option<Transcription>,
}

/// Everything needed to build one phase.
#[derive(Clone, Debug)]
pub struct PhaseBuilder {
    pub name: String,
    kind: Arc<dyn PhaseKind>,
    pub core_subsystems: Vec<Arc<dyn SubsystemBuilder>>,
    pub external_subsystems: Vec<Arc<dyn SubsystemBuilder>>,
    pub subsystem_options: BTreeMap<String, BTreeMap<String, OptionValue>>,
    pub user_options: PhaseOptions,
    initial_guesses: BTreeMap<String, InitialGuess>,
    /// Overrides the equations of the kind.
    pub ode_class: Option<Arc<dyn OdeClass>>,
    /// Overrides the default transcription.
    pub transcription: Option<Transcription>,
    /// Number of nodes of an analytic phase.
    pub num_nodes: usize,
    pub meta_data: Arc<MetaData>,
    /// Whether the phase description names its kind.
    tagged: bool,
}

impl PhaseBuilder {
    /// Validates the user options and initial guesses against the kind.
    pub fn new(
        kind: Arc<dyn PhaseKind>,
        name: Option<&str>,
        user_options: &BTreeMap<String, UserOption>,
        initial_guesses: BTreeMap<String, InitialGuess>,
    ) -> Result<Self, BuilderError> {
        let name = name.unwrap_or_else(|| kind.default_name()).to_string();
        let user_options = PhaseOptions::new(kind.options_schema(), user_options)
            .context(OptionsSnafu { phase: &name })?;
        let me = Self {
            num_nodes: kind.default_num_nodes(),
            name,
            kind,
            core_subsystems: Vec::new(),
            external_subsystems: Vec::new(),
            subsystem_options: BTreeMap::new(),
            user_options,
            initial_guesses,
            ode_class: None,
            transcription: None,
            meta_data: DEFAULT_META_DATA.clone(),
            tagged: false,
        };
        me.validate_initial_guesses()?;
        Ok(me)
    }

    pub fn with_core_subsystems(mut self, subsystems: Vec<Arc<dyn SubsystemBuilder>>) -> Self {
        self.core_subsystems = subsystems;
        self
    }

    pub fn with_external_subsystems(mut self, subsystems: Vec<Arc<dyn SubsystemBuilder>>) -> Self {
        self.external_subsystems = subsystems;
        self
    }

    pub fn with_subsystem_options(
        mut self,
        options: BTreeMap<String, BTreeMap<String, OptionValue>>,
    ) -> Self {
        self.subsystem_options = options;
        self
    }

    pub fn with_ode_class(mut self, ode_class: Arc<dyn OdeClass>) -> Self {
        self.ode_class = Some(ode_class);
        self
    }

    pub fn with_transcription(mut self, transcription: Transcription) -> Self {
        self.transcription = Some(transcription);
        self
    }

    pub fn with_num_nodes(mut self, num_nodes: usize) -> Self {
        self.num_nodes = num_nodes;
        self
    }

    pub fn with_meta_data(mut self, meta_data: Arc<MetaData>) -> Self {
        self.meta_data = meta_data;
        self
    }

    /// Tags the phase description this builder emits with the kind name.
    pub fn tagged(mut self, tagged: bool) -> Self {
        self.tagged = tagged;
        self
    }

    pub fn kind(&self) -> &Arc<dyn PhaseKind> {
        &self.kind
    }

    pub fn initial_guesses(&self) -> &BTreeMap<String, InitialGuess> {
        &self.initial_guesses
    }

    /// Mutable access to the guesses, call `validate_initial_guesses` after changing them.
    pub fn initial_guesses_mut(&mut self) -> &mut BTreeMap<String, InitialGuess> {
        &mut self.initial_guesses
    }

    pub fn validate_initial_guesses(&self) -> Result<(), BuilderError> {
        let unsupported = self
            .kind
            .guess_registry()
            .unsupported(self.initial_guesses.keys());
        if !unsupported.is_empty() {
            error!(
                "{}: {} does not support the initial guesses {unsupported:?}",
                self.name,
                self.kind.type_name()
            );
            return Err(BuilderError::Guess {
                source: GuessError::UnsupportedGuess {
                    builder: self.kind.type_name().to_string(),
                    phase: self.name.clone(),
                    keys: unsupported,
                },
            });
        }
        Ok(())
    }

    /// Radau transcription with shared segment boundaries, from `num_segments` and `order`.
    pub fn make_default_transcription(&self) -> Result<Transcription, BuilderError> {
        let num_segments = self.opt_usize("num_segments")?;
        let orders = self
            .user_options
            .get_usize_list("order")
            .context(OptionsSnafu { phase: &self.name })?;
        Transcription::radau(num_segments, &orders, true)
            .context(InvalidTranscriptionSnafu { phase: &self.name })
    }

    /// Everything the ODE class receives when the phase is built.
    pub fn ode_init_kwargs(&self, aircraft: &AircraftValues) -> Result<OdeInitKwargs, BuilderError> {
        Ok(OdeInitKwargs {
            aircraft: aircraft.clone(),
            meta_data: self.meta_data.clone(),
            subsystem_options: self.subsystem_options.clone(),
            core_subsystems: self.core_subsystems.clone(),
            external_subsystems: self.external_subsystems.clone(),
            extras: self.kind.extra_ode_init_kwargs(self)?,
        })
    }

    /// Builds a new phase, set up and seeded with the initial guesses.
    ///
    /// The phase is only returned once every declaration succeeded, nothing is kept by the builder.
    pub fn build_phase(&self, aircraft: &AircraftValues) -> Result<Phase, BuilderError> {
        self.build_phase_in(DEFAULT_TRAJECTORY, aircraft)
    }

    /// Builds the phase as part of the named trajectory.
    pub fn build_phase_in(
        &self,
        trajectory_name: &str,
        aircraft: &AircraftValues,
    ) -> Result<Phase, BuilderError> {
        self.validate_initial_guesses()?;
        let ode_class = self
            .ode_class
            .clone()
            .unwrap_or_else(|| self.kind.default_ode_class());
        let transcription = match &self.transcription {
            Some(transcription) => transcription.clone(),
            None if self.kind.is_analytic() => Transcription::analytic(self.num_nodes)
                .context(InvalidTranscriptionSnafu { phase: &self.name })?,
            None => self.make_default_transcription()?,
        };
        transcription
            .validate()
            .context(InvalidTranscriptionSnafu { phase: &self.name })?;
        let kwargs = self.ode_init_kwargs(aircraft)?;
        let num_nodes = transcription.grid().num_nodes();
        let ode = ode_class
            .build(num_nodes, &kwargs)
            .context(DynamicsSnafu { phase: &self.name })?;

        let mut phase = Phase::new(&self.name, transcription, ode).context(PhaseSnafu)?;
        self.kind.configure(self, &mut phase)?;
        self.add_subsystem_states(&mut phase)?;
        self.add_user_defined_constraints(&mut phase)?;
        self.apply_initial_guesses(&mut phase, trajectory_name)?;
        phase.setup().context(PhaseSnafu)?;

        info!(
            "built {} phase {} with {} ({} nodes): {} states, {} controls, {} parameters",
            self.kind.type_name(),
            self.name,
            ode_class.name(),
            num_nodes,
            phase.states().len(),
            phase.controls().len(),
            phase.parameters().len()
        );
        Ok(phase)
    }

    /// Seeds the phase with the initial guesses and returns those this kind does not support.
    pub fn apply_initial_guesses(
        &self,
        phase: &mut Phase,
        trajectory_name: &str,
    ) -> Result<Vec<String>, BuilderError> {
        let unsupported = self
            .kind
            .guess_registry()
            .apply(phase, trajectory_name, &self.name, &self.initial_guesses)
            .context(GuessSnafu)?;
        if !unsupported.is_empty() {
            warn!(
                "{trajectory_name}.{}: initial guesses not applied: {unsupported:?}",
                self.name
            );
        }
        Ok(unsupported)
    }

    /// Returns the name and description of this phase.
    ///
    /// User options are emitted as `[value, units]` and only when provided by the user.
    pub fn to_phase_info(&self) -> (String, PhaseInfo) {
        let info = PhaseInfo {
            subsystem_options: self.subsystem_options.clone(),
            user_options: self.user_options.to_phase_info(),
            initial_guesses: self.initial_guesses.clone(),
            external_subsystems: self
                .external_subsystems
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
            builder: self.tagged.then(|| self.kind.type_name().to_string()),
        };
        (self.name.clone(), info)
    }

    /// Builds a builder of the provided kind from a phase description.
    ///
    /// The description is left untouched, user options are normalized on a copy.
    pub fn from_phase_info(
        kind: Arc<dyn PhaseKind>,
        name: &str,
        info: &PhaseInfo,
        context: &BuilderContext,
    ) -> Result<Self, BuilderError> {
        let info = info.normalized();
        let external = info
            .external_subsystems
            .iter()
            .map(|sub| {
                context.catalog.get(sub).context(UnknownSubsystemSnafu {
                    phase: name,
                    name: sub,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut me = Self::new(kind, Some(name), &info.user_options, info.initial_guesses)?
            .with_core_subsystems(context.core_subsystems.clone())
            .with_external_subsystems(external)
            .with_subsystem_options(info.subsystem_options)
            .tagged(info.builder.is_some());
        if let Some(meta_data) = &context.meta_data {
            me.meta_data = meta_data.clone();
        }
        me.transcription = context.transcription.clone();
        Ok(me)
    }

    fn opt_usize(&self, name: &str) -> Result<usize, BuilderError> {
        self.user_options
            .get_usize(name)
            .context(OptionsSnafu { phase: &self.name })
    }

    pub(crate) fn opt_bool(&self, name: &str) -> Result<bool, BuilderError> {
        self.user_options
            .get_bool(name)
            .context(OptionsSnafu { phase: &self.name })
    }

    pub(crate) fn opt_f64_in(&self, name: &str, units: &str) -> Result<Option<f64>, BuilderError> {
        self.user_options
            .get_f64_in(name, units)
            .context(OptionsSnafu { phase: &self.name })
    }

    pub(crate) fn opt_bounds_in(
        &self,
        name: &str,
        units: &str,
    ) -> Result<(Option<f64>, Option<f64>), BuilderError> {
        self.user_options
            .get_bounds_in(name, units)
            .context(OptionsSnafu { phase: &self.name })
    }

    pub(crate) fn opt_str(&self, name: &str) -> Result<Option<&str>, BuilderError> {
        self.user_options
            .get_str(name)
            .context(OptionsSnafu { phase: &self.name })
    }

    pub(crate) fn opt_flag_for(&self, name: &str, var: &str) -> Result<bool, BuilderError> {
        self.user_options
            .get_flag_for(name, var)
            .context(OptionsSnafu { phase: &self.name })
    }

    /// Flag set only when the option is a mapping naming this variable.
    fn opt_named_flag(&self, name: &str, var: &str) -> Result<bool, BuilderError> {
        let value = self
            .user_options
            .get(name)
            .context(OptionsSnafu { phase: &self.name })?;
        Ok(matches!(value, OptionValue::Map(map) if map.get(var) == Some(&OptionValue::Bool(true))))
    }

    /// Reads a per variable option, e.g. `mass_lower`, if this kind declares it.
    fn state_opt(&self, prefix: &str, suffix: &str, units: &str) -> Result<Option<f64>, BuilderError> {
        let name = format!("{prefix}_{suffix}");
        if self.user_options.schema().contains(&name) {
            self.opt_f64_in(&name, units)
        } else {
            Ok(None)
        }
    }

    fn collocated_state(
        &self,
        name: &str,
        prefix: &str,
        units: &str,
        rate_source: &str,
    ) -> Result<StateOptions, BuilderError> {
        Ok(StateOptions {
            name: name.to_string(),
            units: units.to_string(),
            lower: self.state_opt(prefix, "lower", units)?,
            upper: self.state_opt(prefix, "upper", units)?,
            ref_value: self.state_opt(prefix, "ref", units)?,
            ref0: self.state_opt(prefix, "ref0", units)?,
            defect_ref: self.state_opt(prefix, "defect_ref", units)?,
            fix_initial: self.opt_flag_for("fix_initial", name)?,
            fix_final: self.opt_flag_for("fix_final", name)?,
            input_initial: false,
            rate_source: Some(rate_source.to_string()),
            source: None,
            targets: Vec::new(),
            opt: true,
        })
    }

    fn add_state(&self, phase: &mut Phase, state: StateOptions) -> Result<(), BuilderError> {
        debug!("{}: state `{}` in {}", self.name, state.name, state.units);
        phase.add_state(state).context(PhaseSnafu)
    }

    /// Time options from `fix_initial`, `fix_duration`, `input_initial` and the time bounds and refs.
    pub fn set_time_options(&self, phase: &mut Phase, targets: &[&str]) -> Result<(), BuilderError> {
        let initial_ref = self.opt_f64_in("initial_ref", "s")?;
        let duration_ref = self.opt_f64_in("duration_ref", "s")?;
        phase.set_time_options(TimeOptions {
            fix_initial: self.opt_flag_for("fix_initial", dynamic::TIME)?,
            fix_duration: self.opt_bool("fix_duration")?,
            input_initial: self.opt_bool("input_initial")?,
            initial_bounds: self.opt_bounds_in("initial_bounds", "s")?,
            duration_bounds: self.opt_bounds_in("duration_bounds", "s")?,
            initial_ref,
            duration_ref,
            units: "s".to_string(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        });
        Ok(())
    }

    pub fn add_velocity_state(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        let state = self.collocated_state(dynamic::VELOCITY, "velocity", "kn", dynamic::VELOCITY_RATE)?;
        self.add_state(phase, state)
    }

    pub fn add_mass_state(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        let state = self.collocated_state(
            dynamic::MASS,
            "mass",
            "lbm",
            dynamic::FUEL_FLOW_RATE_NEGATIVE_TOTAL,
        )?;
        self.add_state(phase, state)
    }

    pub fn add_distance_state(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        let state = self.collocated_state(dynamic::DISTANCE, "distance", "NM", dynamic::DISTANCE_RATE)?;
        self.add_state(phase, state)
    }

    /// The flight path angle is always fixed at the start of the phase.
    pub fn add_flight_path_angle_state(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        let mut state = self.collocated_state(
            dynamic::FLIGHT_PATH_ANGLE,
            "angle",
            "rad",
            dynamic::FLIGHT_PATH_ANGLE_RATE,
        )?;
        state.fix_initial = true;
        self.add_state(phase, state)
    }

    /// The altitude is only fixed at the start when `fix_initial` names it.
    pub fn add_altitude_state(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        let mut state =
            self.collocated_state(dynamic::ALTITUDE, "alt", "ft", dynamic::ALTITUDE_RATE)?;
        state.fix_initial = self.opt_named_flag("fix_initial", dynamic::ALTITUDE)?;
        self.add_state(phase, state)
    }

    /// Final altitude equality from `final_altitude`, scaled by `alt_constraint_ref`.
    pub fn add_altitude_constraint(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        let Some(final_altitude) = self.opt_f64_in("final_altitude", "ft")? else {
            debug!("{}: no final altitude to constrain", self.name);
            return Ok(());
        };
        let mut constraint = ConstraintOptions::builder()
            .name(dynamic::ALTITUDE)
            .loc(Loc::Final)
            .equals(final_altitude)
            .units("ft")
            .build();
        constraint.ref_value = self.opt_f64_in("alt_constraint_ref", "ft")?;
        phase.add_boundary_constraint(constraint).context(PhaseSnafu)
    }

    /// A control named `name` driven by `optimize_<name>`, `<name>_bounds`, the polynomial control
    /// options and, when optimized, boundary equalities from `initial_<name>` and `final_<name>`.
    fn add_flight_control(
        &self,
        phase: &mut Phase,
        name: &str,
        units: &str,
        ref_value: f64,
    ) -> Result<(), BuilderError> {
        let optimize = self.opt_bool(&format!("optimize_{name}"))?;
        let (lower, upper) = self.opt_bounds_in(&format!("{name}_bounds"), units)?;
        let order = if self.opt_bool("use_polynomial_control")? {
            Some(self.opt_usize("polynomial_control_order")?)
        } else {
            None
        };
        phase
            .add_control(ControlOptions {
                name: name.to_string(),
                units: units.to_string(),
                lower,
                upper,
                ref_value: Some(ref_value),
                ref0: None,
                opt: optimize,
                targets: Vec::new(),
                rate_targets: Vec::new(),
                order,
            })
            .context(PhaseSnafu)?;

        if !optimize {
            return Ok(());
        }
        let initial = self.opt_f64_in(&format!("initial_{name}"), units)?;
        if let (Some(initial), true) = (initial, self.opt_flag_for("fix_initial", name)?) {
            phase
                .add_boundary_constraint(
                    ConstraintOptions::builder()
                        .name(format!("initial_{name}"))
                        .target(name)
                        .loc(Loc::Initial)
                        .equals(initial)
                        .units(units)
                        .build(),
                )
                .context(PhaseSnafu)?;
        }
        let last = self.opt_f64_in(&format!("final_{name}"), units)?;
        if let (Some(last), true) = (last, self.opt_bool("constrain_final")?) {
            phase
                .add_boundary_constraint(
                    ConstraintOptions::builder()
                        .name(format!("final_{name}"))
                        .target(name)
                        .loc(Loc::Final)
                        .equals(last)
                        .units(units)
                        .build(),
                )
                .context(PhaseSnafu)?;
        }
        Ok(())
    }

    pub fn add_mach_control(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        self.add_flight_control(phase, dynamic::MACH, "unitless", 0.5)
    }

    pub fn add_altitude_control(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        self.add_flight_control(phase, dynamic::ALTITUDE, "ft", 1.0e4)
    }

    /// Throttle constraints per `throttle_enforcement`: `path_constraint` bounds it at every node,
    /// `boundary_constraint` at both ends, and `bounded` leaves it to the equations of motion.
    pub fn add_throttle_control(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        let throttle = |loc: Option<Loc>| {
            let mut c = ConstraintOptions::builder()
                .name(match loc {
                    Some(loc) => format!("{loc}_{}", dynamic::THROTTLE),
                    None => dynamic::THROTTLE.to_string(),
                })
                .target(dynamic::THROTTLE)
                .lower(0.0)
                .upper(1.0)
                .units("unitless")
                .build();
            c.loc = loc;
            c
        };
        match self.opt_str("throttle_enforcement")? {
            Some("path_constraint") => phase
                .add_path_constraint(throttle(None))
                .context(PhaseSnafu),
            Some("boundary_constraint") => {
                phase
                    .add_boundary_constraint(throttle(Some(Loc::Initial)))
                    .context(PhaseSnafu)?;
                phase
                    .add_boundary_constraint(throttle(Some(Loc::Final)))
                    .context(PhaseSnafu)
            }
            Some("bounded") | None => Ok(()),
            Some(other) => {
                error!("{}: unknown throttle enforcement `{other}`", self.name);
                Err(BuilderError::Options {
                    phase: self.name.clone(),
                    source: OptionsError::InvalidOptionValue {
                        name: "throttle_enforcement".to_string(),
                        expected: OptionKind::Str,
                        value: other.to_string(),
                    },
                })
            }
        }
    }

    /// States integrated by the subsystems of a collocated phase.
    pub fn add_subsystem_states(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        for subsystem in self.core_subsystems.iter().chain(self.external_subsystems.iter()) {
            for state in subsystem.mission_states() {
                if phase.is_analytic() {
                    debug!(
                        "{}: analytic phase ignores state `{}` of {}",
                        self.name,
                        state.name,
                        subsystem.name()
                    );
                    continue;
                }
                let mut options = StateOptions::builder()
                    .name(state.name.as_str())
                    .units(state.units.as_str())
                    .rate_source(state.rate_source.as_str())
                    .fix_initial(state.fix_initial)
                    .build();
                options.ref_value = state.ref_value;
                self.add_state(phase, options)?;
            }
        }
        Ok(())
    }

    /// Adds every constraint of the `constraints` option, each a mapping with a `type` of
    /// `boundary` or `path` and the remaining constraint arguments.
    pub fn add_user_defined_constraints(&self, phase: &mut Phase) -> Result<(), BuilderError> {
        let constraints = self
            .user_options
            .get_map("constraints")
            .context(OptionsSnafu { phase: &self.name })?;
        for (name, kwargs) in constraints {
            let invalid = |reason: String| BuilderError::InvalidConstraint {
                phase: self.name.clone(),
                name: name.clone(),
                reason,
            };
            let mut kwargs = kwargs
                .as_map()
                .cloned()
                .ok_or_else(|| invalid(format!("expects a mapping of arguments, got {kwargs}")))?;
            let kind = kwargs
                .remove("type")
                .ok_or_else(|| invalid("has no type".to_string()))?;
            kwargs.insert("name".to_string(), OptionValue::Str(name.clone()));
            let constraint = serde_yaml::to_value(OptionValue::Map(kwargs))
                .and_then(serde_yaml::from_value::<ConstraintOptions>)
                .map_err(|e| invalid(e.to_string()))?;
            let added = match kind.as_str() {
                Some("boundary") => phase.add_boundary_constraint(constraint),
                Some("path") => phase.add_path_constraint(constraint),
                _ => {
                    error!("{}: constraint `{name}` has type {kind}", self.name);
                    return Err(invalid(format!(
                        "must be of type boundary or path, got {kind}"
                    )));
                }
            };
            added.context(PhaseSnafu)?;
        }
        Ok(())
    }
}

/// Declares `<prefix>_lower`, `_upper`, `_ref`, `_ref0` and `_defect_ref` of a state.
pub(crate) fn declare_state_options(schema: OptionsSchema, prefix: &str, units: &str) -> OptionsSchema {
    ["lower", "upper", "ref", "ref0", "defect_ref"]
        .iter()
        .fold(schema, |schema, suffix| {
            schema.declare(
                OptionMeta::builder()
                    .name(format!("{prefix}_{suffix}"))
                    .default(OptionValue::Null)
                    .kind(OptionKind::Float)
                    .units(units)
                    .build(),
            )
        })
}

/// Declares a nullable number.
pub(crate) fn declare_f64(schema: OptionsSchema, name: &str, units: &str, desc: &str) -> OptionsSchema {
    schema.declare(
        OptionMeta::builder()
            .name(name)
            .default(OptionValue::Null)
            .kind(OptionKind::Float)
            .units(units)
            .desc(desc)
            .build(),
    )
}

pub(crate) fn declare_bool(schema: OptionsSchema, name: &str, default: bool, desc: &str) -> OptionsSchema {
    schema.declare(
        OptionMeta::builder()
            .name(name)
            .default(default)
            .kind(OptionKind::Bool)
            .desc(desc)
            .build(),
    )
}

pub(crate) fn declare_bounds(schema: OptionsSchema, name: &str, units: &str) -> OptionsSchema {
    schema.declare(
        OptionMeta::builder()
            .name(name)
            .default(OptionValue::Seq(vec![OptionValue::Null, OptionValue::Null]))
            .kind(OptionKind::Bounds)
            .units(units)
            .build(),
    )
}

#[cfg(test)]
mod ut_builder;
