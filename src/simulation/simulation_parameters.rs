use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    error::{ConfigurationError, SimulationError, SimulationResult},
    floating_type_mod::FT,
    impact::ImpactParams,
    media::{MediaOverride, MediaType},
};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// One particle with its trajectory recorded.
    Single,
    Multi,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    Sequential,
    Parallel,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionStrategy {
    Axial,
    Spiral,
    Random,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationScheme {
    SemiImplicitEuler,
    Midpoint,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowModel {
    DevelopingJet,
    Uniform,
}

/// Initial deposit layer. All thicknesses in m.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DepositInit {
    Uniform { thickness: FT },
    Random { min: FT, max: FT },
    // plate cells above deposit-plugged holes get [min, max], everything else `background`
    Inspection { background: FT, min: FT, max: FT },
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridParams {
    /// height above the outlet divided by the chamber height
    pub relative_position: FT,
    pub holes: usize,
    pub plugged_refractory: usize,
    pub plugged_deposit: usize,
}

impl GridParams {
    /// Grid with the plugging fractions assumed for the uninspected grids.
    pub fn with_assumed_plugging(relative_position: FT, holes: usize) -> GridParams {
        GridParams {
            relative_position,
            holes,
            plugged_refractory: (holes as FT * LOWER_GRID_REFRACTORY_FRACTION) as usize,
            plugged_deposit: (holes as FT * LOWER_GRID_DEPOSIT_FRACTION) as usize,
        }
    }

    pub fn open_holes(&self) -> usize {
        self.holes.saturating_sub(self.plugged_refractory + self.plugged_deposit)
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChamberParams {
    pub inlet_diameter: FT,
    pub grid_diameter: FT,
    pub height: FT,
    pub hole_diameter: FT,
    pub pattern_radius: FT,
    /// ordered from the outlet upwards
    pub grids: Vec<GridParams>,
}

impl Default for ChamberParams {
    fn default() -> Self {
        let last = GRID_HOLES.len() - 1;
        let grids = GRID_RELATIVE_POSITIONS
            .iter()
            .zip(GRID_HOLES.iter())
            .enumerate()
            .map(|(i, (&relative_position, &holes))| {
                if i == last {
                    GridParams {
                        relative_position,
                        holes,
                        plugged_refractory: TOP_GRID_PLUGGED_REFRACTORY,
                        plugged_deposit: TOP_GRID_PLUGGED_DEPOSIT,
                    }
                } else {
                    GridParams::with_assumed_plugging(relative_position, holes)
                }
            })
            .collect();

        ChamberParams {
            inlet_diameter: INLET_DIAMETER,
            grid_diameter: GRID_DIAMETER,
            height: CHAMBER_HEIGHT,
            hole_diameter: HOLE_DIAMETER,
            pattern_radius: PATTERN_RADIUS,
            grids,
        }
    }
}

impl ChamberParams {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let geometry = |reason: String| Err(ConfigurationError::InvalidGeometry(reason));

        for (name, value) in [
            ("inlet diameter", self.inlet_diameter),
            ("grid diameter", self.grid_diameter),
            ("chamber height", self.height),
            ("hole diameter", self.hole_diameter),
            ("pattern radius", self.pattern_radius),
        ] {
            if !(value > 0.) || !value.is_finite() {
                return geometry(format!("{} must be positive, got {}", name, value));
            }
        }
        if self.inlet_diameter > self.grid_diameter {
            return geometry(format!(
                "inlet diameter {} exceeds the grid diameter {}",
                self.inlet_diameter, self.grid_diameter
            ));
        }
        if self.grids.is_empty() {
            return geometry("no grids defined".to_string());
        }

        let mut previous: Option<FT> = None;
        for (i, grid) in self.grids.iter().enumerate() {
            if !(grid.relative_position > 0. && grid.relative_position < 1.) {
                return geometry(format!(
                    "grid {} lies outside the chamber (relative position {})",
                    i, grid.relative_position
                ));
            }
            if previous.map_or(false, |p| grid.relative_position <= p) {
                return geometry(format!("grid positions are not strictly increasing at grid {}", i));
            }
            previous = Some(grid.relative_position);

            if grid.holes == 0 {
                return geometry(format!("grid {} has no holes", i));
            }
            if grid.plugged_refractory + grid.plugged_deposit > grid.holes {
                return geometry(format!(
                    "grid {} has more plugged holes ({} + {}) than holes ({})",
                    i, grid.plugged_refractory, grid.plugged_deposit, grid.holes
                ));
            }
            // the plate needs solid area left for deposit cells
            let hole_radius = 0.5 * self.hole_diameter;
            let hole_area = grid.holes as FT * hole_radius * hole_radius;
            if hole_area >= self.radius() * self.radius() {
                return geometry(format!(
                    "the {} holes of grid {} cover the whole plate (hole diameter {})",
                    grid.holes, i, self.hole_diameter
                ));
            }
        }
        Ok(())
    }

    pub fn radius(&self) -> FT {
        self.grid_diameter * 0.5
    }
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowParams {
    pub temperature: FT,
    pub pressure: FT,
    pub velocity_min: FT,
    pub velocity_max: FT,
    pub model: FlowModel,

    // developing jet only
    /// decay length of the inlet jet in inlet diameters
    pub jet_decay_diameters: FT,
    pub inlet_peaking: FT,
    pub developed_peaking: FT,
}

impl Default for FlowParams {
    fn default() -> Self {
        FlowParams {
            temperature: INLET_TEMPERATURE,
            pressure: PRESSURE,
            velocity_min: VELOCITY_MIN,
            velocity_max: VELOCITY_MAX,
            model: FlowModel::DevelopingJet,
            jet_decay_diameters: 2.,
            inlet_peaking: 0.5,
            developed_peaking: 0.2,
        }
    }
}

impl FlowParams {
    pub fn inlet_velocity(&self) -> FT {
        0.5 * (self.velocity_min + self.velocity_max)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let flow = |reason: String| Err(ConfigurationError::InvalidFlowConditions(reason));

        if !(self.temperature > 0.) {
            return flow(format!("temperature must be positive, got {}", self.temperature));
        }
        if !(self.pressure > 0.) {
            return flow(format!("pressure must be positive, got {}", self.pressure));
        }
        if !(self.velocity_min >= 0.) || !(self.velocity_max >= 0.) {
            return flow(format!(
                "negative velocity range [{}, {}]",
                self.velocity_min, self.velocity_max
            ));
        }
        if self.velocity_min > self.velocity_max {
            return flow(format!(
                "velocity range [{}, {}] is inverted",
                self.velocity_min, self.velocity_max
            ));
        }
        if !(self.jet_decay_diameters > 0.) {
            return flow(format!("jet decay length must be positive, got {}", self.jet_decay_diameters));
        }
        // the radial profile 1 + a (1 - 2 rho^2) must stay positive
        for peaking in [self.inlet_peaking, self.developed_peaking] {
            if !(peaking >= 0. && peaking < 1.) {
                return flow(format!("velocity peaking {} outside [0, 1)", peaking));
            }
        }
        Ok(())
    }
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DepositParams {
    pub init: DepositInit,
    pub axial_cells: usize,
    pub angular_cells: usize,
    /// per grid plate
    pub radial_cells: usize,
    /// kg/m³
    pub bulk_density: FT,
    /// Pa
    pub adhesion_strength: FT,
    pub silica_content: FT,
    pub moisture: FT,
    pub growth_rate_mm_per_day: FT,
    pub cleaning_interval_days: FT,
    pub accumulate_between_cycles: bool,
}

impl Default for DepositParams {
    fn default() -> Self {
        DepositParams {
            init: DepositInit::Random {
                min: DEPOSIT_THICKNESS_MIN,
                max: DEPOSIT_THICKNESS_MAX,
            },
            axial_cells: 48,
            angular_cells: 36,
            radial_cells: 8,
            bulk_density: DEPOSIT_BULK_DENSITY,
            adhesion_strength: DEPOSIT_ADHESION_STRENGTH,
            silica_content: DEPOSIT_SILICA_CONTENT,
            moisture: DEPOSIT_MOISTURE,
            growth_rate_mm_per_day: DEPOSIT_GROWTH_MM_PER_DAY,
            cleaning_interval_days: CLEANING_INTERVAL_DAYS,
            accumulate_between_cycles: true,
        }
    }
}

impl DepositParams {
    /// Thickness growth in m/s.
    pub fn growth_rate(&self) -> FT {
        self.growth_rate_mm_per_day * MM / SECONDS_PER_DAY
    }

    /// Time between two cleaning cycles in s.
    pub fn cleaning_interval(&self) -> FT {
        self.cleaning_interval_days * SECONDS_PER_DAY
    }

    /// Energy per removed deposit mass in J/kg.
    pub fn specific_removal_energy(&self) -> FT {
        self.adhesion_strength * (1. + self.silica_content) / (1. + self.moisture) / self.bulk_density
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let non_negative = |name: &'static str, v: FT| {
            if v >= 0. && v.is_finite() {
                Ok(())
            } else {
                Err(ConfigurationError::parameter(name, format!("must not be negative, got {}", v)))
            }
        };

        match self.init {
            DepositInit::Uniform { thickness } => non_negative("deposit.init.thickness", thickness)?,
            DepositInit::Random { min, max } | DepositInit::Inspection { min, max, .. } => {
                non_negative("deposit.init.min", min)?;
                non_negative("deposit.init.max", max)?;
                if min > max {
                    return Err(ConfigurationError::parameter(
                        "deposit.init",
                        format!("thickness range [{}, {}] is inverted", min, max),
                    ));
                }
            }
        }
        if let DepositInit::Inspection { background, .. } = self.init {
            non_negative("deposit.init.background", background)?;
        }

        if self.axial_cells == 0 || self.angular_cells == 0 || self.radial_cells == 0 {
            return Err(ConfigurationError::parameter(
                "deposit",
                "cell counts must be at least one",
            ));
        }
        if !(self.bulk_density > 0.) {
            return Err(ConfigurationError::parameter("deposit.bulk_density", "must be positive"));
        }
        if !(self.adhesion_strength > 0.) {
            return Err(ConfigurationError::parameter("deposit.adhesion_strength", "must be positive"));
        }
        non_negative("deposit.silica_content", self.silica_content)?;
        non_negative("deposit.moisture", self.moisture)?;
        non_negative("deposit.growth_rate_mm_per_day", self.growth_rate_mm_per_day)?;
        non_negative("deposit.cleaning_interval_days", self.cleaning_interval_days)?;
        Ok(())
    }
}

/// Integration settings of the trajectory loop.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationParams {
    pub dt: FT,
    pub max_steps: usize,
    pub scheme: IntegrationScheme,
    pub gravity: FT,
    pub buoyancy: bool,
    /// J, a particle slower than this after a collision comes to rest
    pub min_kinetic_energy: FT,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            dt: TIME_STEP,
            max_steps: (MAX_SIMULATION_TIME / TIME_STEP).round() as usize,
            scheme: IntegrationScheme::SemiImplicitEuler,
            gravity: GRAVITY,
            buoyancy: true,
            min_kinetic_energy: MIN_KINETIC_ENERGY,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.dt > 0.) || !self.dt.is_finite() {
            return Err(ConfigurationError::parameter("simulation.dt", "must be positive"));
        }
        if self.max_steps == 0 {
            return Err(ConfigurationError::parameter("simulation.max_steps", "must be at least one"));
        }
        if !self.gravity.is_finite() {
            return Err(ConfigurationError::parameter("simulation.gravity", "must be finite"));
        }
        if !(self.min_kinetic_energy >= 0.) {
            return Err(ConfigurationError::parameter(
                "simulation.min_kinetic_energy",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

/**
 * Everything a cleaning run needs. Every section is optional in the YAML file and falls back to
 * the values of the constants table.
 */
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub particle_count: usize,
    /// particle `i` uses `media[i % media.len()]`
    pub media: Vec<MediaType>,
    pub cycles: usize,
    pub seed: u64,
    pub mode: RunMode,
    pub execution: Execution,
    pub injection: InjectionStrategy,
    pub record_trajectories: bool,

    pub chamber: ChamberParams,
    pub flow: FlowParams,
    pub deposit: DepositParams,
    pub simulation: SimulationParams,
    pub impact: ImpactParams,
    pub media_overrides: BTreeMap<MediaType, MediaOverride>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            particle_count: 100,
            media: vec![MediaType::Walnut],
            cycles: 1,
            seed: 0,
            mode: RunMode::Multi,
            execution: Execution::Sequential,
            injection: InjectionStrategy::Spiral,
            record_trajectories: false,
            chamber: ChamberParams::default(),
            flow: FlowParams::default(),
            deposit: DepositParams::default(),
            simulation: SimulationParams::default(),
            impact: ImpactParams::default(),
            media_overrides: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    pub fn from_yaml_file(path: &Path, overwrite_path: Option<&Path>) -> SimulationResult<RunConfig> {
        let base = std::fs::read_to_string(path).map_err(|e| SimulationError::io(path, e))?;
        let overwrite = overwrite_path
            .map(|p| std::fs::read_to_string(p).map_err(|e| SimulationError::io(p, e)))
            .transpose()?;
        RunConfig::from_yaml_str(&base, overwrite.as_deref())
    }

    /**
     * Parses a configuration document. The optional overwrite document is a flat mapping whose
     * entries replace the top-level entries of the base document.
     */
    pub fn from_yaml_str(base: &str, overwrite: Option<&str>) -> SimulationResult<RunConfig> {
        // serde_yaml reports an empty stream as an error instead of null
        let has_content = base
            .lines()
            .map(str::trim)
            .any(|line| !line.is_empty() && !line.starts_with('#') && line != "---");
        let mut document: serde_yaml::Value = if has_content {
            serde_yaml::from_str(base)?
        } else {
            serde_yaml::Value::Null
        };
        if document.is_null() {
            document = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
        }

        if let Some(overwrite) = overwrite {
            let overwrite: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(overwrite)?;
            let known = serde_yaml::to_value(RunConfig::default())?;

            let mapping = document.as_mapping_mut().ok_or_else(|| {
                ConfigurationError::parameter("configuration", "top level of the document is not a mapping")
            })?;
            for (k, v) in overwrite.into_iter() {
                let key = serde_yaml::Value::String(k.clone());
                if !known.as_mapping().map_or(false, |m| m.contains_key(&key)) {
                    return Err(ConfigurationError::UnknownOverride(k).into());
                }
                mapping.insert(key, v);
            }
        }

        let config: RunConfig = serde_yaml::from_value(document)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.particle_count == 0 {
            return Err(ConfigurationError::parameter("particle_count", "must be at least one"));
        }
        if self.media.is_empty() {
            return Err(ConfigurationError::parameter("media", "no cleaning media given"));
        }
        if self.cycles == 0 {
            return Err(ConfigurationError::parameter("cycles", "must be at least one"));
        }
        self.chamber.validate()?;
        self.flow.validate()?;
        self.deposit.validate()?;
        self.simulation.validate()?;
        self.impact.validate()?;
        Ok(())
    }

    pub fn effective_particle_count(&self) -> usize {
        match self.mode {
            RunMode::Single => 1,
            RunMode::Multi => self.particle_count,
        }
    }

    pub fn records_trajectories(&self) -> bool {
        self.record_trajectories || self.mode == RunMode::Single
    }

    pub fn media_of_particle(&self, index: usize) -> MediaType {
        self.media[index % self.media.len()]
    }
}
