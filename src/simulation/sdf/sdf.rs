use crate::{floating_type_mod::FT, V3};

use super::{SdfCylinder, SdfPlane, SdfPlate};

/// Chamber surface as a signed distance field, positive on the fluid side.
#[derive(Clone, Debug)]
pub enum Sdf {
    SdfCylinder(SdfCylinder),
    SdfPlane(SdfPlane<3>),
    SdfPlate(SdfPlate),
}

impl From<SdfCylinder> for Sdf {
    fn from(v: SdfCylinder) -> Sdf {
        Sdf::SdfCylinder(v)
    }
}

impl From<SdfPlane<3>> for Sdf {
    fn from(v: SdfPlane<3>) -> Sdf {
        Sdf::SdfPlane(v)
    }
}

impl From<SdfPlate> for Sdf {
    fn from(v: SdfPlate) -> Sdf {
        Sdf::SdfPlate(v)
    }
}

impl Sdf {
    pub fn probe(&self, x: V3) -> FT {
        match self {
            Sdf::SdfCylinder(sdf) => sdf.probe(x),
            Sdf::SdfPlane(sdf) => sdf.probe(x),
            Sdf::SdfPlate(sdf) => sdf.probe(x),
        }
    }

    /**
     * Analytic gradient, normalized. Equal to the surface normal pointing into the fluid.
     */
    pub fn gradient(&self, x: V3) -> V3 {
        match self {
            Sdf::SdfCylinder(sdf) => sdf.gradient(x),
            Sdf::SdfPlane(sdf) => sdf.gradient(x),
            Sdf::SdfPlate(sdf) => sdf.gradient(x),
        }
    }

    /**
     * Returns the first fraction `t` in `[0, 1]` of the straight segment `start -> end` at which the
     * distance to the surface drops to `offset`. Only approaching motion counts: a segment that
     * starts within `offset` but moves away has no contact.
     */
    pub fn segment_contact(&self, start: V3, end: V3, offset: FT) -> Option<FT> {
        match self {
            Sdf::SdfCylinder(sdf) => sdf.segment_contact(start, end, offset),
            Sdf::SdfPlane(sdf) => sdf.segment_contact(start, end, offset),
            Sdf::SdfPlate(sdf) => sdf.segment_contact(start, end, offset),
        }
    }

    /**
     * This gradient is NOT normalized.
     */
    pub fn finite_diff_gradient(&self, x: V3, eps: FT) -> V3 {
        let inv_2eps = 1. / (2. * eps);

        let iter = (0..3).map(|i| {
            let mut xp = x;
            let mut xn = x;
            xp[i] += eps;
            xn[i] -= eps;
            (self.probe(xp) - self.probe(xn)) * inv_2eps
        });

        V3::from_iterator(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert_ft_approx_eq, vec3f};

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let sdfs: Vec<Sdf> = vec![
            SdfCylinder::new(1.9).into(),
            SdfPlane::new_roof(12.).into(),
            SdfPlate::new(9.6).into(),
        ];
        let points = [vec3f(0.3, -0.8, 2.), vec3f(-1.2, 0.1, 10.1), vec3f(0.5, 0.5, 9.)];

        for sdf in &sdfs {
            for &p in &points {
                let analytic = sdf.gradient(p);
                let numeric = sdf.finite_diff_gradient(p, 1e-6);
                for i in 0..3 {
                    assert_ft_approx_eq(analytic[i], numeric[i], 1e-5, || format!("{:?} at {:?}", sdf, p));
                }
            }
        }
    }

    #[test]
    fn wall_contact_is_exact() {
        let wall: Sdf = SdfCylinder::new(1.).into();
        let t = wall.segment_contact(vec3f(0., 0., 0.), vec3f(2., 0., 0.), 0.1).unwrap();
        assert_ft_approx_eq(t, 0.45, 1e-12, || "contact fraction".into());

        // moving inwards from inside the contact range
        assert_eq!(wall.segment_contact(vec3f(0.95, 0., 0.), vec3f(0.5, 0., 0.), 0.1), None);
        // moving outwards from inside the contact range
        assert_eq!(wall.segment_contact(vec3f(0.95, 0., 0.), vec3f(0.97, 0., 0.), 0.1), Some(0.));
        // purely axial motion never touches the wall
        assert_eq!(wall.segment_contact(vec3f(0.5, 0., 0.), vec3f(0.5, 0., -3.), 0.1), None);
    }

    #[test]
    fn plate_is_hit_from_either_side() {
        let plate: Sdf = SdfPlate::new(5.).into();
        let from_above = plate.segment_contact(vec3f(0., 0., 6.), vec3f(0., 0., 4.), 0.5).unwrap();
        assert_ft_approx_eq(from_above, 0.25, 1e-12, || "above".into());
        let from_below = plate.segment_contact(vec3f(0., 0., 4.), vec3f(0., 0., 6.), 0.5).unwrap();
        assert_ft_approx_eq(from_below, 0.25, 1e-12, || "below".into());
        assert_eq!(plate.segment_contact(vec3f(0., 0., 6.), vec3f(0., 0., 7.), 0.5), None);
    }
}
