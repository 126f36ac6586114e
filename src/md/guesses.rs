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

use crate::md::phase::{Phase, PhaseError, VarKind};
use crate::options::OptionValue;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GuessError {
    #[snafu(display("initial guess `{key}` is already registered"))]
    DuplicateGuess { key: String },
    #[snafu(display("{builder} phase {phase} does not support the initial guesses {keys:?}"))]
    UnsupportedGuess {
        builder: String,
        phase: String,
        keys: Vec<String>,
    },
    #[snafu(display("initial guess `{key}` has an unusable value: {reason}"))]
    InvalidGuessValue { key: String, reason: String },
    #[snafu(display("initial guess `{key}` could not be applied: {source}"))]
    GuessApplication { key: String, source: PhaseError },
}

/// An initial guess as written in a phase description: `[value, units]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitialGuess(pub OptionValue, pub String);

impl InitialGuess {
    pub fn new<V: Into<OptionValue>>(value: V, units: &str) -> Self {
        Self(value.into(), units.to_string())
    }

    /// The guess as a list of numbers, a scalar being a list of one.
    pub fn values(&self, key: &str) -> Result<Vec<f64>, GuessError> {
        self.0.to_f64_vec().context(InvalidGuessValueSnafu {
            key,
            reason: format!("expected a number or a list of numbers, got {}", self.0),
        })
    }

    pub fn units(&self) -> &str {
        &self.1
    }
}

/// Procedure seeding a phase from a guess: `(phase, phase name, value, units)`.
pub type GuessFn =
    Arc<dyn Fn(&mut Phase, &str, &OptionValue, &str) -> Result<(), GuessError> + Send + Sync>;

#[derive(Clone)]
pub struct GuessEntry {
    pub key: String,
    pub apply: GuessFn,
    pub desc: String,
}

impl fmt::Debug for GuessEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GuessEntry({}: {})", self.key, self.desc)
    }
}

/// The initial guesses one kind of phase supports, in registration order.
#[derive(Clone, Debug, Default)]
pub struct GuessRegistry {
    entries: Vec<GuessEntry>,
}

impl GuessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: &str, apply: GuessFn, desc: &str) -> Result<(), GuessError> {
        ensure!(!self.contains(key), DuplicateGuessSnafu { key });
        self.entries.push(GuessEntry {
            key: key.to_string(),
            apply,
            desc: desc.to_string(),
        });
        Ok(())
    }

    /// Registers a list of guesses, for use when building a static registry.
    pub fn with(mut self, entries: Vec<(&str, GuessFn, &str)>) -> Result<Self, GuessError> {
        for (key, apply, desc) in entries {
            self.register(key, apply, desc)?;
        }
        Ok(self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GuessEntry> {
        self.entries.iter()
    }

    /// Keys of `guesses` which this registry does not support, in their original order.
    pub fn unsupported<'a, I: IntoIterator<Item = &'a String>>(&self, keys: I) -> Vec<String> {
        keys.into_iter()
            .filter(|k| !self.contains(k))
            .cloned()
            .collect()
    }

    /// Applies every supported guess in registration order and returns the unsupported keys.
    pub fn apply(
        &self,
        phase: &mut Phase,
        trajectory_name: &str,
        phase_name: &str,
        guesses: &BTreeMap<String, InitialGuess>,
    ) -> Result<Vec<String>, GuessError> {
        for entry in &self.entries {
            if let Some(guess) = guesses.get(&entry.key) {
                debug!(
                    "{trajectory_name}.{phase_name}: applying initial guess `{}` = {} {}",
                    entry.key, guess.0, guess.1
                );
                (entry.apply)(phase, phase_name, &guess.0, &guess.1)?;
            }
        }
        Ok(self.unsupported(guesses.keys()))
    }
}

fn guess_fn<F>(f: F) -> GuessFn
where
    F: Fn(&mut Phase, &str, &OptionValue, &str) -> Result<(), GuessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn guess_values(key: &str, value: &OptionValue) -> Result<Vec<f64>, GuessError> {
    InitialGuess(value.clone(), String::new()).values(key)
}

/// `[initial time, duration]`
pub fn time_guess() -> GuessFn {
    guess_fn(|phase, _, value, units| {
        let values = guess_values("time", value)?;
        ensure!(
            values.len() == 2,
            InvalidGuessValueSnafu {
                key: "time",
                reason: format!("expected [initial, duration], got {} values", values.len()),
            }
        );
        phase
            .set_time_val(values[0], values[1], units)
            .context(GuessApplicationSnafu { key: "time" })
    })
}

/// Linearly interpolated guess of the state named `name`.
pub fn state_guess(name: &str) -> GuessFn {
    let name = name.to_string();
    guess_fn(move |phase, _, value, units| {
        let values = guess_values(&name, value)?;
        phase
            .set_state_val(&name, &values, units)
            .context(GuessApplicationSnafu { key: &name })
    })
}

/// Linearly interpolated guess of the control named `name`.
pub fn control_guess(name: &str) -> GuessFn {
    let name = name.to_string();
    guess_fn(move |phase, _, value, units| {
        let values = guess_values(&name, value)?;
        phase
            .set_control_val(&name, &values, units)
            .context(GuessApplicationSnafu { key: &name })
    })
}

/// Guess of the parameter named `name`.
pub fn parameter_guess(name: &str) -> GuessFn {
    let name = name.to_string();
    guess_fn(move |phase, _, value, units| {
        let values = guess_values(&name, value)?;
        let first = values.first().copied().context(InvalidGuessValueSnafu {
            key: &name,
            reason: "no value",
        })?;
        phase
            .set_parameter_val(&name, first, units)
            .context(GuessApplicationSnafu { key: &name })
    })
}

/// Guess of whichever state, control or parameter the phase declares as `name`.
///
/// Phases which declare no such variable ignore this guess, e.g. a Mach guess for a phase
/// flown at a fixed Mach number.
pub fn auto_guess(name: &str) -> GuessFn {
    let name = name.to_string();
    guess_fn(move |phase, phase_name, value, units| match phase.var_kind(&name) {
        Some(VarKind::State) => state_guess(&name)(phase, phase_name, value, units),
        Some(VarKind::Control) => control_guess(&name)(phase, phase_name, value, units),
        Some(VarKind::Parameter) => parameter_guess(&name)(phase, phase_name, value, units),
        Some(VarKind::Time) => time_guess()(phase, phase_name, value, units),
        None => {
            debug!("{phase_name}: no variable `{name}`, guess ignored");
            Ok(())
        }
    })
}
