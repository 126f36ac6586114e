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

use enum_iterator::{all, Sequence};
use lazy_static::lazy_static;
use regex::Regex;
use snafu::prelude::*;
use std::fmt;
use std::ops::{Div, Mul};
use std::str::FromStr;

/// The unit string used for dimensionless quantities and flags.
pub const UNITLESS: &str = "unitless";

/// Errors raised while parsing or converting units.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum UnitError {
    #[snafu(display("unknown unit `{token}` in `{expr}`"))]
    UnknownUnit { expr: String, token: String },
    #[snafu(display("malformed unit expression `{expr}`"))]
    MalformedUnit { expr: String },
    #[snafu(display("cannot convert `{from}` ({from_dim}) into `{to}` ({to_dim})"))]
    Incompatible {
        from: String,
        to: String,
        from_dim: Dimension,
        to_dim: Dimension,
    },
}

/// Physical dimension stored as integer exponents of the base quantities.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimension {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
    pub angle: i8,
    pub temperature: i8,
}

impl Dimension {
    pub const NONE: Self = Self::new(0, 0, 0, 0, 0);
    pub const LENGTH: Self = Self::new(1, 0, 0, 0, 0);
    pub const MASS: Self = Self::new(0, 1, 0, 0, 0);
    pub const TIME: Self = Self::new(0, 0, 1, 0, 0);
    pub const ANGLE: Self = Self::new(0, 0, 0, 1, 0);
    pub const TEMPERATURE: Self = Self::new(0, 0, 0, 0, 1);
    pub const VELOCITY: Self = Self::new(1, 0, -1, 0, 0);
    pub const FORCE: Self = Self::new(1, 1, -2, 0, 0);

    pub const fn new(length: i8, mass: i8, time: i8, angle: i8, temperature: i8) -> Self {
        Self {
            length,
            mass,
            time,
            angle,
            temperature,
        }
    }

    /// Raises this dimension to an integer power.
    pub fn powi(self, n: i8) -> Self {
        Self::new(
            self.length * n,
            self.mass * n,
            self.time * n,
            self.angle * n,
            self.temperature * n,
        )
    }

    pub fn is_dimensionless(&self) -> bool {
        *self == Self::NONE
    }
}

impl Mul for Dimension {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::new(
            self.length + rhs.length,
            self.mass + rhs.mass,
            self.time + rhs.time,
            self.angle + rhs.angle,
            self.temperature + rhs.temperature,
        )
    }
}

impl Div for Dimension {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        self * rhs.powi(-1)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }
        let mut parts = Vec::new();
        for (sym, exp) in [
            ("L", self.length),
            ("M", self.mass),
            ("T", self.time),
            ("A", self.angle),
            ("K", self.temperature),
        ] {
            match exp {
                0 => {}
                1 => parts.push(sym.to_string()),
                _ => parts.push(format!("{sym}^{exp}")),
            }
        }
        write!(f, "{}", parts.join("·"))
    }
}

/// Named units accepted in unit expressions.
///
/// Temperatures are converted by scale only, so only absolute scales are listed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Sequence)]
pub enum BaseUnit {
    Unitless,
    Second,
    Minute,
    Hour,
    Meter,
    Kilometer,
    Foot,
    Inch,
    NauticalMile,
    StatuteMile,
    Kilogram,
    PoundMass,
    Slug,
    Newton,
    PoundForce,
    Knot,
    Radian,
    Degree,
    Kelvin,
    Rankine,
}

impl BaseUnit {
    /// Accepted spellings of this unit.
    pub const fn symbols(&self) -> &'static [&'static str] {
        match self {
            Self::Unitless => &["unitless", "1"],
            Self::Second => &["s", "sec"],
            Self::Minute => &["min"],
            Self::Hour => &["h", "hr"],
            Self::Meter => &["m"],
            Self::Kilometer => &["km"],
            Self::Foot => &["ft"],
            Self::Inch => &["inch", "in"],
            Self::NauticalMile => &["NM", "nmi"],
            Self::StatuteMile => &["mi"],
            Self::Kilogram => &["kg"],
            Self::PoundMass => &["lbm"],
            Self::Slug => &["slug"],
            Self::Newton => &["N"],
            Self::PoundForce => &["lbf"],
            Self::Knot => &["kn", "kt", "knot"],
            Self::Radian => &["rad"],
            Self::Degree => &["deg"],
            Self::Kelvin => &["K", "degK"],
            Self::Rankine => &["degR"],
        }
    }

    /// Multiplicative factor to convert one of this unit into SI (radian for angles).
    pub const fn si_scale(&self) -> f64 {
        match self {
            Self::Unitless => 1.0,
            Self::Second => 1.0,
            Self::Minute => 60.0,
            Self::Hour => 3_600.0,
            Self::Meter => 1.0,
            Self::Kilometer => 1_000.0,
            Self::Foot => 0.3048,
            Self::Inch => 0.0254,
            Self::NauticalMile => 1_852.0,
            Self::StatuteMile => 1_609.344,
            Self::Kilogram => 1.0,
            Self::PoundMass => 0.453_592_37,
            Self::Slug => 14.593_902_937_206_364,
            Self::Newton => 1.0,
            Self::PoundForce => 4.448_221_615_260_5,
            Self::Knot => 1_852.0 / 3_600.0,
            Self::Radian => 1.0,
            Self::Degree => std::f64::consts::PI / 180.0,
            Self::Kelvin => 1.0,
            Self::Rankine => 5.0 / 9.0,
        }
    }

    pub const fn dimension(&self) -> Dimension {
        match self {
            Self::Unitless => Dimension::NONE,
            Self::Second | Self::Minute | Self::Hour => Dimension::TIME,
            Self::Meter
            | Self::Kilometer
            | Self::Foot
            | Self::Inch
            | Self::NauticalMile
            | Self::StatuteMile => Dimension::LENGTH,
            Self::Kilogram | Self::PoundMass | Self::Slug => Dimension::MASS,
            Self::Newton | Self::PoundForce => Dimension::FORCE,
            Self::Knot => Dimension::VELOCITY,
            Self::Radian | Self::Degree => Dimension::ANGLE,
            Self::Kelvin | Self::Rankine => Dimension::TEMPERATURE,
        }
    }

    /// Finds the base unit for the provided symbol, if any.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        all::<Self>().find(|unit| unit.symbols().contains(&symbol))
    }
}

lazy_static! {
    static ref FACTOR: Regex = Regex::new(r"^([A-Za-z]+|1)(?:\^(-?\d+))?$").unwrap();
}

/// A parsed unit expression such as `lbm/s`, `ft/min` or `m/s**2`.
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    expr: String,
    scale: f64,
    dim: Dimension,
}

impl Unit {
    pub fn unitless() -> Self {
        Self {
            expr: UNITLESS.to_string(),
            scale: 1.0,
            dim: Dimension::NONE,
        }
    }

    /// Parses a unit expression made of named units joined by `*` and `/`, with optional `**n` powers.
    pub fn parse(expr: &str) -> Result<Self, UnitError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() || trimmed == UNITLESS {
            return Ok(Self::unitless());
        }

        let normalized = trimmed.replace("**", "^").replace(' ', "");
        let mut scale = 1.0;
        let mut dim = Dimension::NONE;
        let mut sign: i8 = 1;
        let mut token = String::new();

        let mut fold = |token: &str, sign: i8| -> Result<(), UnitError> {
            let caps = FACTOR.captures(token).context(MalformedUnitSnafu {
                expr: trimmed.to_string(),
            })?;
            let base = BaseUnit::from_symbol(&caps[1]).context(UnknownUnitSnafu {
                expr: trimmed.to_string(),
                token: caps[1].to_string(),
            })?;
            let power = match caps.get(2) {
                Some(p) => p.as_str().parse::<i8>().map_err(|_| UnitError::MalformedUnit {
                    expr: trimmed.to_string(),
                })?,
                None => 1,
            } * sign;
            scale *= base.si_scale().powi(power as i32);
            dim = dim * base.dimension().powi(power);
            Ok(())
        };

        for c in normalized.chars() {
            match c {
                '*' | '/' => {
                    ensure!(
                        !token.is_empty(),
                        MalformedUnitSnafu {
                            expr: trimmed.to_string()
                        }
                    );
                    fold(&token, sign)?;
                    token.clear();
                    sign = if c == '/' { -1 } else { 1 };
                }
                _ => token.push(c),
            }
        }
        ensure!(
            !token.is_empty(),
            MalformedUnitSnafu {
                expr: trimmed.to_string()
            }
        );
        fold(&token, sign)?;

        Ok(Self {
            expr: trimmed.to_string(),
            scale,
            dim,
        })
    }

    pub fn dimension(&self) -> Dimension {
        self.dim
    }

    /// Factor converting one of `self` into SI.
    pub fn si_scale(&self) -> f64 {
        self.scale
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        self.dim == other.dim
    }

    /// Returns the multiplicative factor converting a value expressed in `self` into `other`.
    pub fn factor_to(&self, other: &Self) -> Result<f64, UnitError> {
        ensure!(
            self.is_compatible(other),
            IncompatibleSnafu {
                from: self.expr.clone(),
                to: other.expr.clone(),
                from_dim: self.dim,
                to_dim: other.dim,
            }
        );
        Ok(self.scale / other.scale)
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

/// Returns the factor converting values in unit expression `from` into unit expression `to`.
pub fn conversion_factor(from: &str, to: &str) -> Result<f64, UnitError> {
    if from == to {
        return Ok(1.0);
    }
    Unit::parse(from)?.factor_to(&Unit::parse(to)?)
}

/// Converts a scalar between two unit expressions.
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64, UnitError> {
    Ok(value * conversion_factor(from, to)?)
}

/// Returns whether two unit expressions describe the same physical dimension.
pub fn compatible(a: &str, b: &str) -> Result<bool, UnitError> {
    Ok(Unit::parse(a)?.is_compatible(&Unit::parse(b)?))
}
