use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    chamber::{SurfaceContact, SurfaceId},
    deposit::{CellId, DepositAccess},
    error::ConfigurationError,
    floating_type_mod::FT,
    particle::{Particle, ParticleState},
    V3,
};

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImpactParams {
    /// J, normal impact energy below which an impact removes nothing
    pub threshold_energy: FT,
    pub removal_coefficient: FT,
    /// m, deposit thickness at which the removal per impact is halved
    pub reference_thickness: FT,
    /// relative spread of the removed mass, `0` is deterministic
    pub removal_variability: FT,
}

impl Default for ImpactParams {
    fn default() -> Self {
        ImpactParams {
            threshold_energy: 1e-4,
            removal_coefficient: 1.,
            reference_thickness: 0.001,
            removal_variability: 0.1,
        }
    }
}

impl ImpactParams {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.threshold_energy >= 0.) {
            return Err(ConfigurationError::parameter("impact.threshold_energy", "must not be negative"));
        }
        if !(self.removal_coefficient >= 0.) {
            return Err(ConfigurationError::parameter(
                "impact.removal_coefficient",
                "must not be negative",
            ));
        }
        if !(self.reference_thickness > 0.) {
            return Err(ConfigurationError::parameter("impact.reference_thickness", "must be positive"));
        }
        if !(self.removal_variability >= 0. && self.removal_variability <= 1.) {
            return Err(ConfigurationError::parameter(
                "impact.removal_variability",
                "must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Transient record of one collision.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ImpactEvent {
    pub particle: usize,
    pub time: FT,
    pub surface: SurfaceId,
    /// `None` on surfaces without deposit cells
    pub cell: Option<CellId>,
    pub point: V3,
    pub normal: V3,
    /// magnitude of the normal velocity component before the impact
    pub impact_speed: FT,
    /// J, normal kinetic energy
    pub energy: FT,
    /// J, kinetic energy lost in the impact
    pub energy_consumed: FT,
    /// kg
    pub requested_removal: FT,
    /// kg
    pub removed: FT,
    /// there was deposit on the cell when it was hit
    pub struck_deposit: bool,
    pub velocity_before: V3,
    pub rebound_velocity: V3,
}

/// `0.5 m v_n^2` of the velocity component towards the surface, zero when moving away.
pub fn impact_energy(mass: FT, velocity: V3, normal: V3) -> FT {
    let vn = velocity.dot(&normal);
    if vn < 0. {
        0.5 * mass * vn * vn
    } else {
        0.
    }
}

/**
 * Mirrors the normal component and scales the whole velocity with the restitution coefficient.
 * A particle that does not move towards the surface keeps its velocity.
 */
pub fn rebound_velocity(velocity: V3, normal: V3, restitution: FT) -> V3 {
    let vn = velocity.dot(&normal);
    if vn < 0. {
        (velocity - normal * (2. * vn)) * restitution
    } else {
        velocity
    }
}

/**
 * Deposit mass in kg that an impact of normal energy `energy` detaches:
 *
 * `k * hardness * (1 - e^2) * (energy - threshold) / specific_energy / (1 + thickness / t_ref)`
 *
 * Only the energy above the threshold and only the inelastic share `1 - e^2` of it does work on
 * the deposit. A thick layer damps the impact. Never negative; non-decreasing in energy and
 * hardness, non-increasing in thickness.
 */
pub fn removal_amount(
    energy: FT,
    restitution: FT,
    hardness: FT,
    thickness: FT,
    specific_energy: FT,
    params: &ImpactParams,
) -> FT {
    if !(energy >= params.threshold_energy) || !(specific_energy > 0.) {
        return 0.;
    }
    let inelastic = (1. - restitution * restitution).max(0.);
    let damping = 1. + thickness.max(0.) / params.reference_thickness;
    let amount = params.removal_coefficient * hardness.max(0.) * inelastic * (energy - params.threshold_energy)
        / specific_energy
        / damping;
    amount.max(0.)
}

/**
 * Resolves the collision of `particle` at `contact`: computes the impact energy, removes deposit
 * from the struck cell through `deposit` and applies the rebound to the particle.
 */
pub fn resolve(
    particle: &mut Particle,
    contact: &SurfaceContact,
    time: FT,
    deposit: &mut impl DepositAccess,
    params: &ImpactParams,
    rng: &mut impl Rng,
) -> ImpactEvent {
    particle.state = ParticleState::Colliding;

    let velocity_before = particle.velocity;
    let vn = velocity_before.dot(&contact.normal);
    let energy = impact_energy(particle.mass, velocity_before, contact.normal);
    let rebound = rebound_velocity(velocity_before, contact.normal, particle.restitution);
    let energy_consumed = 0.5 * particle.mass * (velocity_before.norm_squared() - rebound.norm_squared());

    let cell = deposit.field().cell_on_surface(contact.surface, contact.point);
    let mut requested_removal = 0.;
    let mut removed = 0.;
    let mut struck_deposit = false;

    if let Some(cell) = cell {
        struck_deposit = deposit.mass(cell) > 0.;
        if struck_deposit {
            let amount = removal_amount(
                energy,
                particle.restitution,
                particle.hardness,
                deposit.thickness(cell),
                deposit.field().specific_removal_energy(),
                params,
            );
            if amount > 0. {
                let spread = params.removal_variability;
                let factor = if spread > 0. {
                    (1. + spread * rng.gen_range(-1. ..=1.)).max(0.)
                } else {
                    1.
                };
                requested_removal = amount * factor;
                removed = deposit.remove_mass(cell, requested_removal);
            }
        }
        deposit.record_impact(cell);
    }

    particle.velocity = rebound;
    particle.impacts += 1;

    log::trace!(
        "particle {} hit {:?} at {:.3?} with {:.3e} J, removed {:.3e} kg",
        particle.id,
        contact.surface,
        contact.point.as_slice(),
        energy,
        removed
    );

    ImpactEvent {
        particle: particle.id,
        time,
        surface: contact.surface,
        cell,
        point: contact.point,
        normal: contact.normal,
        impact_speed: (-vn).max(0.),
        energy,
        energy_consumed,
        requested_removal,
        removed,
        struck_deposit,
        velocity_before,
        rebound_velocity: rebound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assert_ft_approx_eq,
        chamber::ChamberGeometry,
        deposit::DepositField,
        media::MediaType,
        simulation_parameters::{ChamberParams, DepositInit, DepositParams},
        vec3f,
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn deposit(thickness: FT) -> DepositField {
        let chamber = ChamberGeometry::new(&ChamberParams::default()).unwrap();
        let params = DepositParams {
            init: DepositInit::Uniform { thickness },
            ..DepositParams::default()
        };
        DepositField::new(&params, &chamber, &mut ChaCha8Rng::seed_from_u64(0))
    }

    fn wall_contact() -> SurfaceContact {
        SurfaceContact {
            surface: SurfaceId::Wall,
            fraction: 0.5,
            point: vec3f(1.89, 0., 5.),
            normal: vec3f(-1., 0., 0.),
        }
    }

    fn walnut(velocity: V3) -> Particle {
        Particle::from_media(
            4,
            MediaType::Walnut,
            &MediaType::Walnut.default_properties(),
            vec3f(1.89, 0., 5.),
            velocity,
        )
    }

    #[test]
    fn energy_uses_the_normal_component() {
        let v = vec3f(3., 4., -10.);
        let n = vec3f(-1., 0., 0.);
        assert_eq!(impact_energy(2., v, n), 9.);
        assert_eq!(impact_energy(2., -v, n), 0.);

        let rebound = rebound_velocity(v, n, 0.5);
        assert_eq!(rebound, vec3f(-1.5, 2., -5.));
    }

    #[test]
    fn removal_is_zero_below_threshold() {
        let params = ImpactParams::default();
        assert_eq!(removal_amount(0.5e-4, 0.5, 0.5, 0.001, 174., &params), 0.);
        assert_eq!(removal_amount(-1., 0.5, 0.5, 0.001, 174., &params), 0.);
        assert!(removal_amount(1e-2, 0.5, 0.5, 0.001, 174., &params) > 0.);
    }

    #[test]
    fn removal_damped_by_thick_deposit() {
        let params = ImpactParams::default();
        let thin = removal_amount(1e-2, 0.5, 0.5, 0.001, 174., &params);
        let thick = removal_amount(1e-2, 0.5, 0.5, 0.005, 174., &params);
        assert!(thick < thin);
        assert_ft_approx_eq(thin / thick, 3., 1e-12, || "damping ratio".into());
    }

    #[test]
    fn sub_threshold_impact_is_a_pure_bounce() {
        let mut field = deposit(0.002);
        let before = field.total_mass();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        // 0.5 * 4.19e-5 kg * (1 m/s)^2 is far below 1e-4 J
        let mut particle = walnut(vec3f(1., 0.5, 0.));
        let speed = particle.velocity.norm();
        let event = resolve(&mut particle, &wall_contact(), 0.1, &mut field, &ImpactParams::default(), &mut rng);

        assert_eq!(event.removed, 0.);
        assert!(event.struck_deposit);
        assert_eq!(field.total_mass(), before);
        assert_ft_approx_eq(particle.velocity.norm(), speed * 0.5, 1e-12, || "rebound speed".into());
        assert!(particle.velocity.x < 0.);
        assert_eq!(particle.impacts, 1);
    }

    #[test]
    fn energetic_impact_removes_deposit() {
        let mut field = deposit(0.002);
        let before = field.total_mass();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut particle = walnut(vec3f(30., 0., -5.));
        let event = resolve(&mut particle, &wall_contact(), 0.1, &mut field, &ImpactParams::default(), &mut rng);

        assert!(event.removed > 0.);
        assert_eq!(event.removed, event.requested_removal);
        assert_ft_approx_eq(field.total_mass(), before - event.removed, 1e-9, || "mass balance".into());
        assert_ft_approx_eq(event.energy, 0.5 * particle.mass * 900., 1e-12, || "energy".into());
        assert!(event.energy_consumed > 0.);
        assert_eq!(field.cell(event.cell.unwrap()).impacts, 1);
    }

    #[test]
    fn clean_surface_is_not_struck_deposit() {
        let mut field = deposit(0.);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut particle = walnut(vec3f(30., 0., 0.));
        let event = resolve(&mut particle, &wall_contact(), 0., &mut field, &ImpactParams::default(), &mut rng);
        assert!(!event.struck_deposit);
        assert_eq!(event.removed, 0.);
        assert_eq!(field.cell(event.cell.unwrap()).impacts, 1);
    }
}
