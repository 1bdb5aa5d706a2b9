use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigurationError,
    floating_type_mod::{FT, PI},
    fluid::{discharge_coefficient, FluidProperties},
    hole_pattern::HolePattern,
    sdf::{Sdf, SdfCylinder, SdfPlane, SdfPlate},
    simulation_parameters::ChamberParams,
    vec3f, V3,
};

/// Interior surface a particle can strike.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SurfaceId {
    Wall,
    /// index into [`ChamberGeometry::grids`], counted from the outlet upwards
    Grid(usize),
    /// annulus around the inlet opening
    Roof,
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ExitBoundary {
    Inlet,
    Outlet,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct SurfaceContact {
    pub surface: SurfaceId,
    /// fraction of the tested segment
    pub fraction: FT,
    pub point: V3,
    /// unit normal pointing into the fluid
    pub normal: V3,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ChamberEvent {
    Contact(SurfaceContact),
    Exit {
        boundary: ExitBoundary,
        fraction: FT,
        point: V3,
    },
}

impl ChamberEvent {
    pub fn fraction(&self) -> FT {
        match self {
            ChamberEvent::Contact(contact) => contact.fraction,
            ChamberEvent::Exit { fraction, .. } => *fraction,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Grid {
    z: FT,
    sdf: Sdf,
    pattern: HolePattern,
    plugged_refractory: usize,
    plugged_deposit: usize,
}

impl Grid {
    pub fn z(&self) -> FT {
        self.z
    }

    pub fn pattern(&self) -> &HolePattern {
        &self.pattern
    }

    pub fn total_holes(&self) -> usize {
        self.pattern.len()
    }

    pub fn open_holes(&self) -> usize {
        self.pattern.open_holes()
    }

    pub fn plugged_refractory(&self) -> usize {
        self.plugged_refractory
    }

    pub fn plugged_deposit(&self) -> usize {
        self.plugged_deposit
    }

    pub fn open_area(&self) -> FT {
        let r = self.pattern.hole_radius();
        PI * r * r * self.open_holes() as FT
    }
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridPluggingStatistics {
    /// 1 is the top grid
    pub grid_number: usize,
    pub total_holes: usize,
    pub open_fraction: FT,
    pub refractory_plugging: FT,
    pub deposit_plugging: FT,
    pub total_plugging: FT,
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridPressureDrop {
    pub grid_number: usize,
    pub open_area: FT,
    pub hole_velocity: FT,
    pub reynolds_number: FT,
    pub discharge_coefficient: FT,
    /// Pa
    pub pressure_drop: FT,
}

/**
 * Vertical cylinder between the outlet at `z = 0` and the roof at `z = height`. The roof has a
 * central inlet opening; the grids are horizontal perforated plates in between.
 */
#[derive(Clone, Debug)]
pub struct ChamberGeometry {
    inlet_diameter: FT,
    grid_diameter: FT,
    height: FT,
    wall: Sdf,
    roof: Sdf,
    grids: Vec<Grid>,
}

impl ChamberGeometry {
    pub fn new(params: &ChamberParams) -> Result<ChamberGeometry, ConfigurationError> {
        params.validate()?;

        let grids = params
            .grids
            .iter()
            .map(|grid| {
                let z = grid.relative_position * params.height;
                Grid {
                    z,
                    sdf: SdfPlate::new(z).into(),
                    pattern: HolePattern::new(
                        grid.holes,
                        params.pattern_radius,
                        params.hole_diameter,
                        grid.open_holes(),
                    ),
                    plugged_refractory: grid.plugged_refractory,
                    plugged_deposit: grid.plugged_deposit,
                }
            })
            .collect();

        Ok(ChamberGeometry {
            inlet_diameter: params.inlet_diameter,
            grid_diameter: params.grid_diameter,
            height: params.height,
            wall: SdfCylinder::new(params.radius()).into(),
            roof: SdfPlane::new_roof(params.height).into(),
            grids,
        })
    }

    pub fn radius(&self) -> FT {
        self.grid_diameter * 0.5
    }

    pub fn inlet_radius(&self) -> FT {
        self.inlet_diameter * 0.5
    }

    pub fn inlet_diameter(&self) -> FT {
        self.inlet_diameter
    }

    pub fn grid_diameter(&self) -> FT {
        self.grid_diameter
    }

    pub fn height(&self) -> FT {
        self.height
    }

    pub fn grids(&self) -> &[Grid] {
        &self.grids
    }

    pub fn cross_section_area(&self) -> FT {
        PI * self.radius() * self.radius()
    }

    pub fn inlet_area(&self) -> FT {
        PI * self.inlet_radius() * self.inlet_radius()
    }

    fn sdf(&self, surface: SurfaceId) -> &Sdf {
        match surface {
            SurfaceId::Wall => &self.wall,
            SurfaceId::Grid(i) => &self.grids[i].sdf,
            SurfaceId::Roof => &self.roof,
        }
    }

    /// Distance of `x` to `surface`, positive on the fluid side.
    pub fn surface_distance(&self, surface: SurfaceId, x: V3) -> FT {
        self.sdf(surface).probe(x)
    }

    pub fn is_inside(&self, x: V3) -> bool {
        x.xy().norm() <= self.radius() && x.z >= 0. && x.z <= self.height
    }

    /**
     * Radial projection of `x` onto the cylinder wall together with the inward pointing normal.
     */
    pub fn nearest_wall_point(&self, x: V3) -> (V3, V3) {
        let normal = self.wall.gradient(x);
        let point = vec3f(-normal.x * self.radius(), -normal.y * self.radius(), x.z);
        (point, normal)
    }

    /// `x` lies over an open hole of grid `grid_index`. Plugged holes do not count.
    pub fn is_near_grid_hole(&self, x: V3, grid_index: usize) -> bool {
        self.grids
            .get(grid_index)
            .map_or(false, |grid| grid.pattern.is_over_open_hole(x.xy()))
    }

    /**
     * Earliest event on the straight segment `start -> end` of a sphere with `particle_radius`.
     *
     * `surface_offset(surface, x)` returns the extra distance (deposit thickness) at which the
     * sphere already touches `surface` near `x`. Grid contacts inside an open hole that the
     * sphere fits through are ignored. Crossing the roof plane inside the inlet opening or the
     * outlet plane leaves the chamber.
     */
    pub fn first_event(
        &self,
        start: V3,
        end: V3,
        particle_radius: FT,
        surface_offset: impl Fn(SurfaceId, V3) -> FT,
    ) -> Option<ChamberEvent> {
        let lerp = |t: FT| start + (end - start) * t;
        let mut best: Option<ChamberEvent> = None;
        let mut consider = |event: ChamberEvent| {
            if best.map_or(true, |b| event.fraction() < b.fraction()) {
                best = Some(event);
            }
        };

        let contact = |surface: SurfaceId, t: FT| {
            let point = lerp(t);
            let mut normal = self.sdf(surface).gradient(point);
            if normal.dot(&(end - start)) > 0. {
                normal = -normal;
            }
            ChamberEvent::Contact(SurfaceContact {
                surface,
                fraction: t,
                point,
                normal,
            })
        };

        // the deposit thickness is taken from the cell under the contact point
        let touch = |surface: SurfaceId| {
            let sdf = self.sdf(surface);
            let offset = |x: V3| particle_radius + surface_offset(surface, x);
            let t = sdf.segment_contact(start, end, offset(start))?;
            sdf.segment_contact(start, end, offset(lerp(t))).or(Some(t))
        };

        if let Some(t) = touch(SurfaceId::Wall) {
            consider(contact(SurfaceId::Wall, t));
        }

        for (i, grid) in self.grids.iter().enumerate() {
            let surface = SurfaceId::Grid(i);
            if let Some(t) = touch(surface) {
                let passes = |x: V3| grid.pattern.passes_through(x.xy(), particle_radius);
                let through_hole = passes(lerp(t))
                    && crossing(start.z, end.z, grid.z).map_or(true, |tc| passes(lerp(tc)));
                if !through_hole {
                    consider(contact(surface, t));
                }
            }
        }

        let inlet_radius = self.inlet_radius();
        if let Some(t) = touch(SurfaceId::Roof).filter(|&t| lerp(t).xy().norm() > inlet_radius) {
            consider(contact(SurfaceId::Roof, t));
        }
        if end.z >= self.height {
            if let Some(t) = crossing(start.z, end.z, self.height) {
                let point = lerp(t);
                if point.xy().norm() <= inlet_radius {
                    consider(ChamberEvent::Exit {
                        boundary: ExitBoundary::Inlet,
                        fraction: t,
                        point,
                    });
                } else {
                    consider(contact(SurfaceId::Roof, t));
                }
            }
        }

        if end.z <= 0. {
            if let Some(t) = crossing(start.z, end.z, 0.) {
                consider(ChamberEvent::Exit {
                    boundary: ExitBoundary::Outlet,
                    fraction: t,
                    point: lerp(t),
                });
            }
        }

        best
    }

    /// Grid numbering follows the inspection report: 1 is the top grid.
    pub fn plugging_statistics(&self) -> Vec<GridPluggingStatistics> {
        self.grids
            .iter()
            .rev()
            .enumerate()
            .map(|(i, grid)| {
                let total = grid.total_holes() as FT;
                let open_fraction = grid.open_holes() as FT / total;
                GridPluggingStatistics {
                    grid_number: i + 1,
                    total_holes: grid.total_holes(),
                    open_fraction,
                    refractory_plugging: grid.plugged_refractory as FT / total,
                    deposit_plugging: grid.plugged_deposit as FT / total,
                    total_plugging: 1. - open_fraction,
                }
            })
            .collect()
    }

    /// Open flow area per grid in m², top grid first.
    pub fn grid_flow_areas(&self) -> Vec<FT> {
        self.grids.iter().rev().map(Grid::open_area).collect()
    }

    /**
     * Orifice pressure drop `0.5 rho v^2 (1 - cd^2)` per grid, top grid first. The hole velocity
     * follows from continuity with the inlet stream. A grid without open holes has an infinite
     * pressure drop.
     */
    pub fn grid_pressure_drops(&self, fluid: &FluidProperties, inlet_velocity: FT) -> Vec<GridPressureDrop> {
        let hole_diameter = 2. * self.grids.first().map_or(0., |g| g.pattern.hole_radius());

        self.grid_flow_areas()
            .into_iter()
            .enumerate()
            .map(|(i, open_area)| {
                let hole_velocity = if open_area > 0. {
                    inlet_velocity * self.inlet_area() / open_area
                } else {
                    FT::INFINITY
                };
                let reynolds_number = fluid.reynolds_number(hole_velocity, hole_diameter);
                let cd = discharge_coefficient(reynolds_number);
                GridPressureDrop {
                    grid_number: i + 1,
                    open_area,
                    hole_velocity,
                    reynolds_number,
                    discharge_coefficient: cd,
                    pressure_drop: 0.5 * fluid.density * hole_velocity * hole_velocity * (1. - cd * cd),
                }
            })
            .collect()
    }
}

/// Fraction at which `z0 -> z1` passes the height `z`, `z1` reaching it counts as a crossing.
fn crossing(z0: FT, z1: FT, z: FT) -> Option<FT> {
    let d0 = z0 - z;
    let d1 = z1 - z;
    if d0 == 0. || d0 == d1 || d0 * d1 > 0. {
        return None;
    }
    Some(d0 / (d0 - d1))
}
