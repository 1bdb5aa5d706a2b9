pub use self::{
    sdf::Sdf,
    sdf_cylinder::SdfCylinder,
    sdf_plane::{SdfPlane, SdfPlate},
};

use crate::floating_type_mod::FT;

mod sdf;
mod sdf_cylinder;
mod sdf_plane;

/**
 * First fraction at which a distance that varies linearly from `d0` to `d1` drops to `offset`.
 * Returns `Some(0)` if the start is already within `offset` and the distance keeps decreasing.
 */
fn linear_contact(d0: FT, d1: FT, offset: FT) -> Option<FT> {
    if d1 >= d0 {
        return None;
    }
    if d0 <= offset {
        return Some(0.);
    }
    if d1 > offset {
        return None;
    }
    Some((d0 - offset) / (d0 - d1))
}
