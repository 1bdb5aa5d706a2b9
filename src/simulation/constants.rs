//! Default values for chamber, operating conditions and deposit.
//!
//! Everything is SI. Values that are quoted in millimetres elsewhere are converted with [`MM`].

use crate::floating_type_mod::FT;

pub const MM: FT = 1. / 1000.;

// ------------------------------------
// chamber geometry

pub const INLET_DIAMETER: FT = 2.558;
pub const GRID_DIAMETER: FT = 3.8;
pub const CHAMBER_HEIGHT: FT = 12.;

/// Grid heights relative to the chamber height, bottom to top.
pub const GRID_RELATIVE_POSITIONS: [FT; 4] = [0.2, 0.4, 0.6, 0.8];

/// Holes per grid, same order as [`GRID_RELATIVE_POSITIONS`]. The top grid (285 holes) is
/// "grid 1" of the inspection report.
pub const GRID_HOLES: [usize; 4] = [330, 315, 300, 285];

pub const HOLE_DIAMETER: FT = 0.05;
pub const PATTERN_RADIUS: FT = 1.9;

pub const MIN_HOLES_PER_RING: usize = 8;
pub const PATTERN_SPACING: FT = 1.5;

// inspection data of the top grid
pub const TOP_GRID_PLUGGED_REFRACTORY: usize = 22;
pub const TOP_GRID_PLUGGED_DEPOSIT: usize = 133;

// assumed for the grids below it
pub const LOWER_GRID_REFRACTORY_FRACTION: FT = 0.05;
pub const LOWER_GRID_DEPOSIT_FRACTION: FT = 0.15;

// ------------------------------------
// operating conditions

pub const INLET_TEMPERATURE: FT = 715. + 273.15;
/// 1.52 kg/cm² in Pa
pub const PRESSURE: FT = 1.52 * 98066.5;
pub const VELOCITY_MIN: FT = 17.2;
pub const VELOCITY_MAX: FT = 17.7;

// ------------------------------------
// gas

pub const GAS_CONSTANT: FT = 287.05;
pub const REFERENCE_VISCOSITY: FT = 1.458e-6;
pub const SUTHERLAND_TEMPERATURE: FT = 110.4;

pub const GRAVITY: FT = -9.81;

// ------------------------------------
// deposit (fouling analysis)

pub const DEPOSIT_MOISTURE: FT = 0.0085;
pub const DEPOSIT_SILICA_CONTENT: FT = 0.7591;
pub const DEPOSIT_ADHESION_STRENGTH: FT = 150000.;
pub const DEPOSIT_BULK_DENSITY: FT = 1500.;
pub const DEPOSIT_THICKNESS_MIN: FT = 0.001;
pub const DEPOSIT_THICKNESS_MAX: FT = 0.005;

pub const DEPOSIT_GROWTH_MM_PER_DAY: FT = 0.1;
pub const CLEANING_INTERVAL_DAYS: FT = 7.;
pub const SECONDS_PER_DAY: FT = 24. * 3600.;

// ------------------------------------
// integration

pub const TIME_STEP: FT = 0.001;
pub const MAX_SIMULATION_TIME: FT = 10.;
pub const MIN_KINETIC_ENERGY: FT = 1e-5;

/// Mohs value that maps to a hardness factor of 1.
pub const REFERENCE_MOHS_HARDNESS: FT = 10.;
