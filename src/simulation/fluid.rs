use serde::{Deserialize, Serialize};

use crate::{
    constants::{GAS_CONSTANT, REFERENCE_VISCOSITY, SUTHERLAND_TEMPERATURE},
    floating_type_mod::FT,
};

/**
 * Flue gas properties at the operating point. The gas is treated as an ideal gas with a
 * Sutherland viscosity law, both evaluated once per run.
 */
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FluidProperties {
    /// K
    pub temperature: FT,
    /// Pa
    pub pressure: FT,
    /// kg/m³
    pub density: FT,
    /// Pa·s
    pub viscosity: FT,
}

impl FluidProperties {
    pub fn new(temperature: FT, pressure: FT) -> FluidProperties {
        FluidProperties {
            temperature,
            pressure,
            density: pressure / (GAS_CONSTANT * temperature),
            viscosity: REFERENCE_VISCOSITY * temperature.powf(1.5) / (temperature + SUTHERLAND_TEMPERATURE),
        }
    }

    pub fn kinematic_viscosity(&self) -> FT {
        self.viscosity / self.density
    }

    pub fn reynolds_number(&self, velocity: FT, length: FT) -> FT {
        velocity * length / self.kinematic_viscosity()
    }
}

/// Orifice discharge coefficient, linear between the laminar and the fully turbulent value.
pub fn discharge_coefficient(reynolds_number: FT) -> FT {
    if reynolds_number < 2000. {
        0.5
    } else if reynolds_number > 20000. {
        0.61
    } else {
        0.5 + (reynolds_number - 2000.) * (0.11 / 18000.)
    }
}
