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

//! The ordered list of phase kinds phase descriptions are matched against.
//!
//! Registration order matters: when a description does not name its kind, the first kind to
//! recognize it wins. The built-in kinds are registered as `energy`, `two_dof` and then
//! `analytic_cruise`. Kinds should only be registered at start up, before any description is
//! converted.

use super::{AnalyticCruisePhase, BuilderContext, BuilderError, EnergyPhase, PhaseBuilder, PhaseKind, TwoDofPhase};
use crate::io::PhaseInfo;
use lazy_static::lazy_static;
use snafu::prelude::*;
use std::sync::{Arc, RwLock};

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RegistryError {
    #[snafu(display("phase kind `{kind}` is already registered"))]
    DuplicateRegistration { kind: String },
    #[snafu(display("unsupported phase info for {name}: {reason}"))]
    UnsupportedPhaseInfo { name: String, reason: String },
    #[snafu(display("{source}"))]
    Builder { source: BuilderError },
}

#[derive(Clone, Debug, Default)]
pub struct PhaseBuilderRegistry {
    kinds: Vec<Arc<dyn PhaseKind>>,
}

impl PhaseBuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of the built-in kinds, in their documented order.
    pub fn builtin() -> Self {
        Self {
            kinds: vec![
                Arc::new(EnergyPhase),
                Arc::new(TwoDofPhase),
                Arc::new(AnalyticCruisePhase),
            ],
        }
    }

    /// Appends a kind. When `check_repeats` is false a repeated kind is appended again.
    pub fn register(&mut self, kind: Arc<dyn PhaseKind>, check_repeats: bool) -> Result<(), RegistryError> {
        if check_repeats && self.get(kind.type_name()).is_some() {
            error!("phase kind `{}` registered twice", kind.type_name());
            return DuplicateRegistrationSnafu {
                kind: kind.type_name(),
            }
            .fail();
        }
        debug!("registered phase kind `{}`", kind.type_name());
        self.kinds.push(kind);
        Ok(())
    }

    /// First registered kind of that name.
    pub fn get(&self, type_name: &str) -> Option<Arc<dyn PhaseKind>> {
        self.kinds
            .iter()
            .find(|k| k.type_name() == type_name)
            .cloned()
    }

    pub fn type_names(&self) -> Vec<String> {
        self.kinds.iter().map(|k| k.type_name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Converts a phase description into a builder.
    ///
    /// A description naming its kind is only read as that kind. Otherwise the first kind, in
    /// registration order, which recognizes the description reads it, and a failure to build
    /// from it is returned rather than tried on the next kind.
    pub fn phase_info_to_builder(
        &self,
        name: &str,
        info: &PhaseInfo,
        context: &BuilderContext,
    ) -> Result<PhaseBuilder, RegistryError> {
        if let Some(type_name) = &info.builder {
            let kind = self.get(type_name).context(UnsupportedPhaseInfoSnafu {
                name,
                reason: format!("no phase kind named `{type_name}`"),
            })?;
            return PhaseBuilder::from_phase_info(kind, name, info, context).context(BuilderSnafu);
        }

        if let Some(kind) = self.kinds.iter().find(|k| k.recognizes(info)) {
            debug!("{name} read as a {} phase", kind.type_name());
            return PhaseBuilder::from_phase_info(kind.clone(), name, info, context)
                .context(BuilderSnafu);
        }
        error!("no registered phase kind accepts {name}");
        UnsupportedPhaseInfoSnafu {
            name,
            reason: format!("none of {:?} accepts it", self.type_names()),
        }
        .fail()
    }
}

lazy_static! {
    static ref REGISTRY: RwLock<PhaseBuilderRegistry> = RwLock::new(PhaseBuilderRegistry::builtin());
}

/// Appends a kind to the process wide registry.
pub fn register(kind: Arc<dyn PhaseKind>, check_repeats: bool) -> Result<(), RegistryError> {
    REGISTRY
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .register(kind, check_repeats)
}

/// Names of the kinds of the process wide registry, in registration order.
pub fn registered_kinds() -> Vec<String> {
    REGISTRY
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .type_names()
}

/// Converts a phase description with the process wide registry.
pub fn phase_info_to_builder(
    name: &str,
    info: &PhaseInfo,
    context: &BuilderContext,
) -> Result<PhaseBuilder, RegistryError> {
    REGISTRY
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .phase_info_to_builder(name, info, context)
}
