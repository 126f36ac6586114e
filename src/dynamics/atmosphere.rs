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

use super::{node_input, DynamicsError, IoMeta, MissionComponent, NodeValues, STANDARD_GRAVITY};
use crate::variables::dynamic;
use nalgebra::DVector;

/// Specific gas constant of dry air, J/(kg K)
pub const GAS_CONSTANT_AIR: f64 = 287.052_87;
pub const HEAT_CAPACITY_RATIO: f64 = 1.4;
pub const SEA_LEVEL_TEMPERATURE: f64 = 288.15;
pub const SEA_LEVEL_PRESSURE: f64 = 101_325.0;
pub const SEA_LEVEL_DENSITY: f64 = SEA_LEVEL_PRESSURE / (GAS_CONSTANT_AIR * SEA_LEVEL_TEMPERATURE);
const LAPSE_RATE: f64 = 0.0065;
const TROPOPAUSE: f64 = 11_000.0;
const STRATOSPHERE_TOP: f64 = 20_000.0;

/// International Standard Atmosphere, troposphere and lower stratosphere.
#[derive(Copy, Clone, Debug)]
pub struct Atmosphere {
    pub num_nodes: usize,
}

/// Temperature (K), pressure (Pa) and density (kg/m^3) at a geopotential altitude in meters.
pub fn isa(altitude_m: f64) -> Result<(f64, f64, f64), DynamicsError> {
    if !(-1_000.0..=STRATOSPHERE_TOP).contains(&altitude_m) {
        return Err(DynamicsError::NonPhysical {
            component: "atmosphere".to_string(),
            reason: format!("altitude {altitude_m} m is outside of the standard atmosphere table"),
        });
    }
    let exponent = STANDARD_GRAVITY / (GAS_CONSTANT_AIR * LAPSE_RATE);
    let (temperature, pressure) = if altitude_m <= TROPOPAUSE {
        let t = SEA_LEVEL_TEMPERATURE - LAPSE_RATE * altitude_m;
        (t, SEA_LEVEL_PRESSURE * (t / SEA_LEVEL_TEMPERATURE).powf(exponent))
    } else {
        let t11 = SEA_LEVEL_TEMPERATURE - LAPSE_RATE * TROPOPAUSE;
        let p11 = SEA_LEVEL_PRESSURE * (t11 / SEA_LEVEL_TEMPERATURE).powf(exponent);
        (
            t11,
            p11 * (-STANDARD_GRAVITY * (altitude_m - TROPOPAUSE) / (GAS_CONSTANT_AIR * t11)).exp(),
        )
    };
    Ok((
        temperature,
        pressure,
        pressure / (GAS_CONSTANT_AIR * temperature),
    ))
}

impl MissionComponent for Atmosphere {
    fn name(&self) -> &str {
        "atmosphere"
    }

    fn inputs(&self) -> Vec<IoMeta> {
        vec![IoMeta::new(dynamic::ALTITUDE, "m")]
    }

    fn outputs(&self) -> Vec<IoMeta> {
        vec![
            IoMeta::new(dynamic::TEMPERATURE, "K"),
            IoMeta::new(dynamic::STATIC_PRESSURE, "N/m**2"),
            IoMeta::new(dynamic::DENSITY, "kg/m**3"),
            IoMeta::new(dynamic::SPEED_OF_SOUND, "m/s"),
        ]
    }

    fn compute(&self, inputs: &NodeValues) -> Result<NodeValues, DynamicsError> {
        let altitude = node_input(inputs, self.name(), dynamic::ALTITUDE, self.num_nodes)?;
        let mut temperature = DVector::zeros(self.num_nodes);
        let mut pressure = DVector::zeros(self.num_nodes);
        let mut density = DVector::zeros(self.num_nodes);
        for (i, h) in altitude.iter().enumerate() {
            let (t, p, rho) = isa(*h)?;
            temperature[i] = t;
            pressure[i] = p;
            density[i] = rho;
        }
        let speed_of_sound =
            temperature.map(|t| (HEAT_CAPACITY_RATIO * GAS_CONSTANT_AIR * t).sqrt());

        let mut out = NodeValues::new();
        out.insert(dynamic::TEMPERATURE.to_string(), temperature);
        out.insert(dynamic::STATIC_PRESSURE.to_string(), pressure);
        out.insert(dynamic::DENSITY.to_string(), density);
        out.insert(dynamic::SPEED_OF_SOUND.to_string(), speed_of_sound);
        Ok(out)
    }
}
