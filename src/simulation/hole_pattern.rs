use rstar::{primitives::GeomWithData, Point, RTree};

use crate::{
    constants::{MIN_HOLES_PER_RING, PATTERN_SPACING},
    floating_type_mod::{FT, TAU},
    vec2f, V2,
};

#[derive(Clone, Copy, PartialEq, Debug)]
struct HoleCenter {
    p: V2,
}

impl Point for HoleCenter {
    type Scalar = FT;

    const DIMENSIONS: usize = 2;

    fn generate(mut generator: impl FnMut(usize) -> Self::Scalar) -> Self {
        HoleCenter {
            p: vec2f(generator(0), generator(1)),
        }
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        self.p[index]
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        &mut self.p[index]
    }
}

impl From<V2> for HoleCenter {
    fn from(p: V2) -> Self {
        HoleCenter { p }
    }
}

type HoleElem = GeomWithData<HoleCenter, usize>;

/**
 * Hole centers of a perforated plate, arranged in concentric rings.
 *
 * The number of rings is `floor(sqrt(num_holes))`, ring `k` sits at `radius * (k + 1) / rings`
 * and receives at least `MIN_HOLES_PER_RING * (k + 1)` holes until all holes are placed. Holes
 * of one ring are evenly spaced starting at angle zero.
 */
pub fn generate_radial_pattern(num_holes: usize, radius: FT) -> Vec<V2> {
    let num_rings = (num_holes as FT).sqrt() as usize;
    let mut remaining = num_holes;
    let mut coordinates = Vec::with_capacity(num_holes);

    for ring in 0..num_rings {
        let ring_radius = radius * (ring + 1) as FT / num_rings as FT;
        let circumference = TAU * ring_radius;
        let by_spacing = (circumference / (radius / num_rings as FT) / PATTERN_SPACING) as usize;

        let holes_in_ring = usize::max(MIN_HOLES_PER_RING * (ring + 1), by_spacing).min(remaining);
        if holes_in_ring == 0 {
            break;
        }

        let angular_step = TAU / holes_in_ring as FT;
        for i in 0..holes_in_ring {
            let angle = i as FT * angular_step;
            coordinates.push(vec2f(ring_radius * angle.cos(), ring_radius * angle.sin()));
        }
        remaining -= holes_in_ring;
    }

    coordinates
}

/**
 * Holes of one grid with their plugging state. Holes are numbered in generation order and every
 * hole with an index of at least `open_holes` is plugged. A plugged hole is solid plate area.
 */
#[derive(Clone, Debug)]
pub struct HolePattern {
    centers: Vec<V2>,
    hole_radius: FT,
    open_holes: usize,
    rtree: RTree<HoleElem>,
}

impl HolePattern {
    pub fn new(num_holes: usize, pattern_radius: FT, hole_diameter: FT, open_holes: usize) -> HolePattern {
        let centers = generate_radial_pattern(num_holes, pattern_radius);

        let rtree_elems: Vec<_> = centers
            .iter()
            .enumerate()
            .map(|(idx, center)| HoleElem::new(HoleCenter::from(*center), idx))
            .collect();

        HolePattern {
            open_holes: open_holes.min(centers.len()),
            centers,
            hole_radius: hole_diameter * 0.5,
            rtree: RTree::bulk_load(rtree_elems),
        }
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn centers(&self) -> &[V2] {
        &self.centers
    }

    pub fn hole_radius(&self) -> FT {
        self.hole_radius
    }

    pub fn open_holes(&self) -> usize {
        self.open_holes
    }

    pub fn is_open(&self, hole: usize) -> bool {
        hole < self.open_holes
    }

    /// Nearest hole center as `(hole index, distance)`.
    pub fn nearest_hole(&self, p: V2) -> Option<(usize, FT)> {
        self.rtree
            .nearest_neighbor(&HoleCenter::from(p))
            .map(|elem| (elem.data, (self.centers[elem.data] - p).norm()))
    }

    /// `p` lies over an open hole.
    pub fn is_over_open_hole(&self, p: V2) -> bool {
        self.passes_through(p, 0.)
    }

    /// A sphere of `particle_radius` centered at `p` fits completely into an open hole.
    pub fn passes_through(&self, p: V2, particle_radius: FT) -> bool {
        match self.nearest_hole(p) {
            Some((hole, distance)) => self.is_open(hole) && distance + particle_radius <= self.hole_radius,
            None => false,
        }
    }

    /// Fraction of the plate area covered by holes, open or plugged.
    pub fn perforated_fraction(&self, plate_radius: FT) -> FT {
        let hole_area = self.hole_radius * self.hole_radius * self.len() as FT;
        (hole_area / (plate_radius * plate_radius)).min(1.)
    }
}
