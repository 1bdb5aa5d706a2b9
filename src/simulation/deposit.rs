use std::collections::BTreeMap;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    chamber::{ChamberGeometry, SurfaceId},
    concurrency::par_iter_mut1,
    floating_type_mod::{FT, TAU},
    simulation_parameters::{DepositInit, DepositParams},
    V3,
};

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CellId(pub usize);

/// Patch of interior surface with the deposit on it.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DepositCell {
    pub surface: SurfaceId,
    /// height of the cell center
    pub z: FT,
    /// distance of the cell center from the axis
    pub r: FT,
    /// angle of the cell center
    pub theta: FT,
    /// m², only the solid part of a grid plate
    pub area: FT,
    /// kg
    pub mass: FT,
    pub impacts: u32,
}

/**
 * Deposit on the chamber wall and on the grid plates.
 *
 * The wall is divided into `axial_cells x angular_cells` cells, every grid plate into
 * `radial_cells x angular_cells` cells. The roof carries no deposit. Cell lookup is a direct
 * index computation. The stored quantity is the mass; the thickness follows from the cell area
 * and the bulk density.
 */
#[derive(PartialEq, Debug, Clone)]
pub struct DepositField {
    cells: Vec<DepositCell>,
    axial_cells: usize,
    angular_cells: usize,
    radial_cells: usize,
    height: FT,
    radius: FT,
    grid_heights: Vec<FT>,
    bulk_density: FT,
    specific_removal_energy: FT,
}

impl DepositField {
    pub fn new(params: &DepositParams, chamber: &ChamberGeometry, rng: &mut impl Rng) -> DepositField {
        let na = params.axial_cells;
        let nt = params.angular_cells;
        let nr = params.radial_cells;
        let height = chamber.height();
        let radius = chamber.radius();
        let dz = height / na as FT;
        let dtheta = TAU / nt as FT;
        let dr = radius / nr as FT;

        let mut cells = Vec::with_capacity(na * nt + chamber.grids().len() * nr * nt);
        for k in 0..na {
            for j in 0..nt {
                cells.push(DepositCell {
                    surface: SurfaceId::Wall,
                    z: (k as FT + 0.5) * dz,
                    r: radius,
                    theta: (j as FT + 0.5) * dtheta,
                    area: radius * dtheta * dz,
                    mass: 0.,
                    impacts: 0,
                });
            }
        }
        for (g, grid) in chamber.grids().iter().enumerate() {
            let solid_fraction = 1. - grid.pattern().perforated_fraction(radius);
            for i in 0..nr {
                let r_in = i as FT * dr;
                let r_out = r_in + dr;
                for j in 0..nt {
                    cells.push(DepositCell {
                        surface: SurfaceId::Grid(g),
                        z: grid.z(),
                        r: r_in + 0.5 * dr,
                        theta: (j as FT + 0.5) * dtheta,
                        area: 0.5 * (r_out * r_out - r_in * r_in) * dtheta * solid_fraction,
                        mass: 0.,
                        impacts: 0,
                    });
                }
            }
        }

        let mut field = DepositField {
            cells,
            axial_cells: na,
            angular_cells: nt,
            radial_cells: nr,
            height,
            radius,
            grid_heights: chamber.grids().iter().map(|g| g.z()).collect(),
            bulk_density: params.bulk_density,
            specific_removal_energy: params.specific_removal_energy(),
        };
        field.initialize(params.init, chamber, rng);
        debug!(
            "deposit field with {} cells, initial mass {:.1} kg",
            field.cells.len(),
            field.total_mass()
        );
        field
    }

    fn initialize(&mut self, init: DepositInit, chamber: &ChamberGeometry, rng: &mut impl Rng) {
        match init {
            DepositInit::Uniform { thickness } => self.set_uniform_thickness(thickness),
            DepositInit::Random { min, max } => {
                for i in 0..self.cells.len() {
                    let thickness = draw_thickness(rng, min, max);
                    self.set_thickness(CellId(i), thickness);
                }
            }
            DepositInit::Inspection { background, min, max } => {
                self.set_uniform_thickness(background);

                // deposit plugged holes follow the open ones in hole order
                for (g, grid) in chamber.grids().iter().enumerate() {
                    let pattern = grid.pattern();
                    let first = pattern.open_holes();
                    let last = (first + grid.plugged_deposit()).min(pattern.len());
                    for center in &pattern.centers()[first..last] {
                        let point = V3::new(center.x, center.y, grid.z());
                        if let Some(cell) = self.cell_on_surface(SurfaceId::Grid(g), point) {
                            let thickness = draw_thickness(rng, min, max);
                            self.set_thickness(cell, thickness.max(self.thickness(cell)));
                        }
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[DepositCell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> &DepositCell {
        &self.cells[id.0]
    }

    pub fn bulk_density(&self) -> FT {
        self.bulk_density
    }

    /// J/kg needed to detach deposit.
    pub fn specific_removal_energy(&self) -> FT {
        self.specific_removal_energy
    }

    pub fn thickness(&self, id: CellId) -> FT {
        let cell = self.cell(id);
        if cell.area <= 0. {
            return 0.;
        }
        cell.mass / (cell.area * self.bulk_density)
    }

    pub fn set_thickness(&mut self, id: CellId, thickness: FT) {
        let bulk_density = self.bulk_density;
        let cell = &mut self.cells[id.0];
        cell.mass = thickness.max(0.) * cell.area * bulk_density;
    }

    pub fn set_uniform_thickness(&mut self, thickness: FT) {
        for i in 0..self.cells.len() {
            self.set_thickness(CellId(i), thickness);
        }
    }

    fn angular_index(&self, x: V3) -> usize {
        let angle = x.y.atan2(x.x).rem_euclid(TAU);
        ((angle / TAU * self.angular_cells as FT) as usize).min(self.angular_cells - 1)
    }

    /// Cell of `surface` that contains the projection of `x`. The roof has no cells.
    pub fn cell_on_surface(&self, surface: SurfaceId, x: V3) -> Option<CellId> {
        let j = self.angular_index(x);
        match surface {
            SurfaceId::Wall => {
                let k = (x.z / self.height * self.axial_cells as FT).max(0.) as usize;
                Some(CellId(k.min(self.axial_cells - 1) * self.angular_cells + j))
            }
            SurfaceId::Grid(g) if g < self.grid_heights.len() => {
                let i = (x.xy().norm() / self.radius * self.radial_cells as FT) as usize;
                let offset = self.axial_cells * self.angular_cells + g * self.radial_cells * self.angular_cells;
                Some(CellId(offset + i.min(self.radial_cells - 1) * self.angular_cells + j))
            }
            SurfaceId::Grid(_) | SurfaceId::Roof => None,
        }
    }

    /// Cell on the deposit-carrying surface closest to `x`.
    pub fn nearest_cell(&self, x: V3) -> CellId {
        let mut surface = SurfaceId::Wall;
        let mut distance = (self.radius - x.xy().norm()).abs();
        for (g, &z) in self.grid_heights.iter().enumerate() {
            let d = (x.z - z).abs();
            if d < distance {
                distance = d;
                surface = SurfaceId::Grid(g);
            }
        }
        // wall and grid cells always exist
        self.cell_on_surface(surface, x).unwrap_or(CellId(0))
    }

    /**
     * Removes up to `amount` kg and returns what was actually removed. The cell never drops below
     * zero mass.
     */
    pub fn remove_mass(&mut self, id: CellId, amount: FT) -> FT {
        let cell = &mut self.cells[id.0];
        let amount = amount.max(0.);
        if amount >= cell.mass {
            let removed = cell.mass;
            cell.mass = 0.;
            removed
        } else {
            cell.mass -= amount;
            amount
        }
    }

    /// Grows every cell by `rate * dt` of thickness (`rate` in m/s).
    pub fn accumulate(&mut self, dt: FT, rate: FT) {
        if !(dt > 0.) || !(rate > 0.) {
            return;
        }
        let bulk_density = self.bulk_density;
        par_iter_mut1(&mut self.cells, |_, cell| {
            cell.mass += rate * dt * cell.area * bulk_density;
        });
    }

    pub fn record_impact(&mut self, id: CellId) {
        self.cells[id.0].impacts += 1;
    }

    pub fn total_mass(&self) -> FT {
        self.cells.iter().map(|c| c.mass).sum()
    }

    pub fn impact_counts(&self) -> Vec<u32> {
        self.cells.iter().map(|c| c.impacts).collect()
    }

    /// Fraction of cells that received an impact since `counts` was taken.
    pub fn coverage_since(&self, counts: &[u32]) -> FT {
        if self.cells.is_empty() {
            return 0.;
        }
        let touched = self
            .cells
            .iter()
            .zip(counts.iter().copied().chain(std::iter::repeat(0)))
            .filter(|(cell, before)| cell.impacts > *before)
            .count();
        touched as FT / self.cells.len() as FT
    }

    /// Cells whose deposit is still thicker than `threshold`.
    pub fn uncleaned_cells(&self, threshold: FT) -> Vec<CellId> {
        (0..self.cells.len())
            .map(CellId)
            .filter(|&id| self.thickness(id) > threshold)
            .collect()
    }

    /**
     * Thickness of every cell of `surface` as rows of `angular_cells` values. Wall rows go
     * upwards, grid rows outwards.
     */
    pub fn thickness_map(&self, surface: SurfaceId) -> Vec<Vec<FT>> {
        let (offset, rows) = match surface {
            SurfaceId::Wall => (0, self.axial_cells),
            SurfaceId::Grid(g) if g < self.grid_heights.len() => (
                self.axial_cells * self.angular_cells + g * self.radial_cells * self.angular_cells,
                self.radial_cells,
            ),
            SurfaceId::Grid(_) | SurfaceId::Roof => return Vec::new(),
        };

        (0..rows)
            .map(|row| {
                (0..self.angular_cells)
                    .map(|j| self.thickness(CellId(offset + row * self.angular_cells + j)))
                    .collect()
            })
            .collect()
    }

    pub fn snapshot(&self) -> DepositSnapshot {
        DepositSnapshot {
            bulk_density: self.bulk_density,
            total_mass: self.total_mass(),
            cells: self
                .cells
                .iter()
                .enumerate()
                .map(|(i, cell)| CellSnapshot {
                    surface: cell.surface,
                    z: cell.z,
                    r: cell.r,
                    theta: cell.theta,
                    thickness: self.thickness(CellId(i)),
                    mass: cell.mass,
                    impacts: cell.impacts,
                })
                .collect(),
        }
    }

    /// Applies the removals of a ledger, clamped to the current masses. Returns the removed mass.
    pub fn commit_ledger(&mut self, ledger: &DepositLedger) -> FT {
        let mut removed = 0.;
        for (&cell, &amount) in ledger.removed.iter() {
            removed += self.remove_mass(cell, amount);
        }
        for (&cell, &count) in ledger.impacts.iter() {
            self.cells[cell.0].impacts += count;
        }
        removed
    }
}

fn draw_thickness(rng: &mut impl Rng, min: FT, max: FT) -> FT {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub surface: SurfaceId,
    pub z: FT,
    pub r: FT,
    pub theta: FT,
    pub thickness: FT,
    pub mass: FT,
    pub impacts: u32,
}

/// Deposit surface map for plotting.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DepositSnapshot {
    pub bulk_density: FT,
    pub total_mass: FT,
    pub cells: Vec<CellSnapshot>,
}

/// Read and removal access to the deposit as seen by one particle.
pub trait DepositAccess {
    fn field(&self) -> &DepositField;

    fn mass(&self, id: CellId) -> FT;

    fn remove_mass(&mut self, id: CellId, amount: FT) -> FT;

    fn record_impact(&mut self, id: CellId);

    fn thickness(&self, id: CellId) -> FT {
        let field = self.field();
        let area = field.cell(id).area;
        if area <= 0. {
            return 0.;
        }
        self.mass(id) / (area * field.bulk_density())
    }

    /// Deposit thickness on `surface` near `x`, zero where there are no cells.
    fn surface_thickness(&self, surface: SurfaceId, x: V3) -> FT {
        self.field()
            .cell_on_surface(surface, x)
            .map_or(0., |id| self.thickness(id))
    }
}

impl DepositAccess for DepositField {
    fn field(&self) -> &DepositField {
        self
    }

    fn mass(&self, id: CellId) -> FT {
        self.cell(id).mass
    }

    fn remove_mass(&mut self, id: CellId, amount: FT) -> FT {
        DepositField::remove_mass(self, id, amount)
    }

    fn record_impact(&mut self, id: CellId) {
        DepositField::record_impact(self, id)
    }
}

/// Removals and impacts of one particle that are not yet applied to the field.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct DepositLedger {
    removed: BTreeMap<CellId, FT>,
    impacts: BTreeMap<CellId, u32>,
}

impl DepositLedger {
    pub fn new() -> DepositLedger {
        DepositLedger::default()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.impacts.is_empty()
    }

    pub fn removed_mass(&self) -> FT {
        self.removed.values().sum()
    }

    pub fn clear(&mut self) {
        self.removed.clear();
        self.impacts.clear();
    }
}

/// The field as it was when the view was created, minus the removals recorded in the ledger.
pub struct LedgerView<'a> {
    base: &'a DepositField,
    ledger: &'a mut DepositLedger,
}

impl<'a> LedgerView<'a> {
    pub fn new(base: &'a DepositField, ledger: &'a mut DepositLedger) -> LedgerView<'a> {
        LedgerView { base, ledger }
    }
}

impl<'a> DepositAccess for LedgerView<'a> {
    fn field(&self) -> &DepositField {
        self.base
    }

    fn mass(&self, id: CellId) -> FT {
        let removed = self.ledger.removed.get(&id).copied().unwrap_or(0.);
        (self.base.cell(id).mass - removed).max(0.)
    }

    fn remove_mass(&mut self, id: CellId, amount: FT) -> FT {
        let actual = amount.max(0.).min(self.mass(id));
        if actual > 0. {
            *self.ledger.removed.entry(id).or_insert(0.) += actual;
        }
        actual
    }

    fn record_impact(&mut self, id: CellId) {
        *self.ledger.impacts.entry(id).or_insert(0) += 1;
    }
}
