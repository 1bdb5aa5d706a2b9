use crate::{floating_type_mod::FT, vec3f, VF, V3};

use super::linear_contact;

/// Half space `dir . x + delta >= 0`.
#[derive(Clone, Debug)]
pub struct SdfPlane<const D: usize> {
    dir: VF<D>,
    delta: FT,
}

impl SdfPlane<3> {
    /**
     * Horizontal plane at height `z` with the fluid below it (a roof).
     */
    pub fn new_roof(z: FT) -> SdfPlane<3> {
        SdfPlane::new(vec3f(0., 0., -1.), z)
    }
}

impl<const D: usize> SdfPlane<D> {
    /// `dir` has to be normalized.
    pub fn new(dir: VF<D>, delta: FT) -> SdfPlane<D> {
        Self { dir, delta }
    }

    pub fn probe(&self, x: VF<D>) -> FT {
        self.dir.dot(&x) + self.delta
    }

    pub fn gradient(&self, _x: VF<D>) -> VF<D> {
        self.dir
    }

    pub fn segment_contact(&self, start: VF<D>, end: VF<D>, offset: FT) -> Option<FT> {
        linear_contact(self.probe(start), self.probe(end), offset)
    }
}

/**
 * Two-sided plate of zero thickness at height `z`. Both sides are fluid, the distance is measured
 * to the plate plane.
 */
#[derive(Clone, Debug)]
pub struct SdfPlate {
    z: FT,
}

impl SdfPlate {
    pub fn new(z: FT) -> SdfPlate {
        SdfPlate { z }
    }

    pub fn probe(&self, x: V3) -> FT {
        (x.z - self.z).abs()
    }

    pub fn gradient(&self, x: V3) -> V3 {
        if x.z >= self.z {
            vec3f(0., 0., 1.)
        } else {
            vec3f(0., 0., -1.)
        }
    }

    /// The side of the plate the segment starts on decides which face can be hit.
    pub fn segment_contact(&self, start: V3, end: V3, offset: FT) -> Option<FT> {
        let side = if start.z > self.z {
            1.
        } else if start.z < self.z {
            -1.
        } else if end.z <= start.z {
            // on the plane, the face opposite to the motion
            1.
        } else {
            -1.
        };

        linear_contact(side * (start.z - self.z), side * (end.z - self.z), offset)
    }
}
