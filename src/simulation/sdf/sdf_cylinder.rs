use crate::{floating_type_mod::FT, vec3f, V3};

/// Inside of an infinite vertical cylinder around the z axis.
#[derive(Clone, Debug)]
pub struct SdfCylinder {
    radius: FT,
}

impl SdfCylinder {
    pub fn new(radius: FT) -> SdfCylinder {
        SdfCylinder { radius }
    }

    pub fn radius(&self) -> FT {
        self.radius
    }

    pub fn probe(&self, x: V3) -> FT {
        self.radius - x.xy().norm()
    }

    /**
     * Points towards the axis. On the axis itself the direction is arbitrary and `-x` is returned.
     */
    pub fn gradient(&self, x: V3) -> V3 {
        let r = x.xy().norm();
        if r > 0. {
            vec3f(-x.x / r, -x.y / r, 0.)
        } else {
            vec3f(-1., 0., 0.)
        }
    }

    /**
     * Solves `|a + t b| = radius - offset` in the horizontal plane for the outgoing root.
     */
    pub fn segment_contact(&self, start: V3, end: V3, offset: FT) -> Option<FT> {
        let a = start.xy();
        let b = end.xy() - a;

        let target = self.radius - offset;
        let qa = b.norm_squared();
        let qb = 2. * a.dot(&b);
        let qc = a.norm_squared() - target * target;

        if target <= 0. || qc >= 0. {
            // already in contact range, only a contact if the particle moves outwards
            return if qb > 0. { Some(0.) } else { None };
        }
        if qa == 0. {
            return None;
        }

        let discriminant = qb * qb - 4. * qa * qc;
        let t = (-qb + discriminant.sqrt()) / (2. * qa);
        if t <= 1. {
            Some(t.max(0.))
        } else {
            None
        }
    }
}
