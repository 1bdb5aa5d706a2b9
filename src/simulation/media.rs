use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    constants::REFERENCE_MOHS_HARDNESS,
    error::ConfigurationError,
    floating_type_mod::{FT, PI},
};

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Walnut,
    Ceramic,
    Steel,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Walnut, MediaType::Ceramic, MediaType::Steel];

    pub fn name(self) -> &'static str {
        match self {
            MediaType::Walnut => "walnut shell",
            MediaType::Ceramic => "ceramic ball",
            MediaType::Steel => "steel shot",
        }
    }

    pub fn default_properties(self) -> MediaProperties {
        match self {
            MediaType::Walnut => MediaProperties {
                density: 640.7,
                diameter: 0.005,
                restitution: 0.5,
                mohs_hardness: 4.75,
                cost_per_kg: 2.5,
            },
            MediaType::Ceramic => MediaProperties {
                density: 2500.,
                diameter: 0.01,
                restitution: 0.7,
                mohs_hardness: 9.0,
                cost_per_kg: 5.0,
            },
            MediaType::Steel => MediaProperties {
                density: 7800.,
                diameter: 0.008,
                restitution: 0.8,
                mohs_hardness: 7.5,
                cost_per_kg: 3.5,
            },
        }
    }
}

/** Physical constants of one cleaning medium. Diameter in m, density in kg/m³, cost in USD/kg. */
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaProperties {
    pub density: FT,
    pub diameter: FT,
    pub restitution: FT,
    pub mohs_hardness: FT,
    pub cost_per_kg: FT,
}

impl MediaProperties {
    pub fn radius(&self) -> FT {
        self.diameter * 0.5
    }

    pub fn volume(&self) -> FT {
        PI * self.diameter * self.diameter * self.diameter / 6.
    }

    pub fn mass(&self) -> FT {
        self.volume() * self.density
    }

    /// Mohs hardness scaled so that the hardest mineral maps to 1.
    pub fn hardness_factor(&self) -> FT {
        self.mohs_hardness / REFERENCE_MOHS_HARDNESS
    }

    fn validate(&self, media: MediaType) -> Result<(), ConfigurationError> {
        let fail = |what: &str| {
            Err(ConfigurationError::parameter(
                "media_overrides",
                format!("{} of {} is out of range", what, media.name()),
            ))
        };

        if !(self.density > 0.) {
            return fail("density");
        }
        if !(self.diameter > 0.) {
            return fail("diameter");
        }
        if !(self.restitution >= 0. && self.restitution <= 1.) {
            return fail("restitution");
        }
        if !(self.mohs_hardness > 0.) {
            return fail("hardness");
        }
        if !(self.cost_per_kg >= 0.) {
            return fail("cost");
        }
        Ok(())
    }
}

/// Partial replacement of the tabulated properties, every missing field keeps its default.
#[derive(PartialEq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediaOverride {
    pub density: Option<FT>,
    pub diameter: Option<FT>,
    pub restitution: Option<FT>,
    pub mohs_hardness: Option<FT>,
    pub cost_per_kg: Option<FT>,
}

impl MediaOverride {
    fn apply(&self, mut properties: MediaProperties) -> MediaProperties {
        if let Some(v) = self.density {
            properties.density = v;
        }
        if let Some(v) = self.diameter {
            properties.diameter = v;
        }
        if let Some(v) = self.restitution {
            properties.restitution = v;
        }
        if let Some(v) = self.mohs_hardness {
            properties.mohs_hardness = v;
        }
        if let Some(v) = self.cost_per_kg {
            properties.cost_per_kg = v;
        }
        properties
    }
}

/// Resolved media properties for one run.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct MediaTable {
    properties: [MediaProperties; 3],
}

impl Default for MediaTable {
    fn default() -> Self {
        MediaTable {
            properties: MediaType::ALL.map(MediaType::default_properties),
        }
    }
}

impl MediaTable {
    pub fn with_overrides(overrides: &BTreeMap<MediaType, MediaOverride>) -> Result<MediaTable, ConfigurationError> {
        let mut table = MediaTable::default();
        for (&media, media_override) in overrides {
            let properties = media_override.apply(table.get(media));
            properties.validate(media)?;
            table.properties[media as usize] = properties;
        }
        Ok(table)
    }

    pub fn get(&self, media: MediaType) -> MediaProperties {
        self.properties[media as usize]
    }
}

#[test]
fn walnut_shell_particle_mass() {
    use crate::assert_ft_approx_eq;

    let walnut = MediaType::Walnut.default_properties();
    // pi/6 * (5 mm)^3 * 640.7 kg/m^3
    assert_ft_approx_eq(walnut.mass(), 4.1933e-5, 1e-8, || "walnut mass".to_string());
    assert_ft_approx_eq(walnut.hardness_factor(), 0.475, 1e-12, || "walnut hardness".to_string());
}

#[test]
fn overrides_replace_single_fields() {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        MediaType::Steel,
        MediaOverride {
            restitution: Some(0.6),
            ..MediaOverride::default()
        },
    );
    let table = MediaTable::with_overrides(&overrides).unwrap();
    assert_eq!(table.get(MediaType::Steel).restitution, 0.6);
    assert_eq!(table.get(MediaType::Steel).density, 7800.);
    assert_eq!(table.get(MediaType::Walnut), MediaType::Walnut.default_properties());
}

#[test]
fn overrides_are_validated() {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        MediaType::Ceramic,
        MediaOverride {
            restitution: Some(1.5),
            ..MediaOverride::default()
        },
    );
    assert!(matches!(
        MediaTable::with_overrides(&overrides),
        Err(ConfigurationError::InvalidParameter { name: "media_overrides", .. })
    ));
}
