use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::{
    chamber::{ChamberGeometry, ExitBoundary},
    floating_type_mod::{FT, TAU},
    fluid::FluidProperties,
    media::{MediaProperties, MediaType},
    simulation_parameters::InjectionStrategy,
    vec3f, V3,
};

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ExpiryReason {
    NumericalDivergence,
    StepCapExceeded,
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Termination {
    Exited(ExitBoundary),
    /// came to rest after a collision
    Settled,
    Expired(ExpiryReason),
}

/// `Injected -> InFlight -> (Colliding <-> InFlight)* -> Terminated`
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ParticleState {
    Injected,
    InFlight,
    Colliding,
    Terminated(Termination),
}

#[derive(PartialEq, Debug, Clone)]
pub struct Particle {
    pub id: usize,
    pub media: MediaType,
    pub position: V3,
    pub velocity: V3,
    pub mass: FT,
    pub diameter: FT,
    pub density: FT,
    pub restitution: FT,
    pub hardness: FT,
    pub distance_traveled: FT,
    pub impacts: u32,
    pub state: ParticleState,
}

impl Particle {
    pub fn from_media(id: usize, media: MediaType, properties: &MediaProperties, position: V3, velocity: V3) -> Particle {
        Particle {
            id,
            media,
            position,
            velocity,
            mass: properties.mass(),
            diameter: properties.diameter,
            density: properties.density,
            restitution: properties.restitution,
            hardness: properties.hardness_factor(),
            distance_traveled: 0.,
            impacts: 0,
            state: ParticleState::Injected,
        }
    }

    pub fn radius(&self) -> FT {
        0.5 * self.diameter
    }

    pub fn kinetic_energy(&self) -> FT {
        0.5 * self.mass * self.velocity.norm_squared()
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, ParticleState::Terminated(_))
    }

    pub fn has_impacted(&self) -> bool {
        self.impacts > 0
    }

    pub fn terminate(&mut self, termination: Termination) {
        self.state = ParticleState::Terminated(termination);
    }

    /// Gas drag with the Schiller-Naumann drag coefficient, as acceleration.
    pub fn drag_acceleration(&self, velocity: V3, fluid_velocity: V3, fluid: &FluidProperties) -> V3 {
        let relative = fluid_velocity - velocity;
        let relative_speed = relative.norm();
        if relative_speed == 0. {
            return V3::zeros();
        }

        let reynolds_number = fluid.reynolds_number(relative_speed, self.diameter);
        let cd = drag_coefficient(reynolds_number);
        relative * (3. * fluid.density * cd * relative_speed / (4. * self.density * self.diameter))
    }
}

pub fn drag_coefficient(reynolds_number: FT) -> FT {
    if reynolds_number < 0.1 {
        24. / reynolds_number
    } else if reynolds_number < 1000. {
        24. / reynolds_number * (1. + 0.15 * reynolds_number.powf(0.687))
    } else {
        0.44
    }
}

/**
 * Entry point and velocity of a new particle below the roof opening. Every strategy gives the
 * particle the inlet speed downwards.
 *
 * - `Axial`: on the chamber axis, no lateral motion.
 * - `Spiral`: on a circle of radius `D / 16` at a random angle, moving outwards with 20 % of
 *   the inlet speed.
 * - `Random`: uniform in the square `|x|, |y| <= D / 8` with normally distributed lateral speed
 *   (30 % of the inlet speed as standard deviation).
 */
pub fn inject(
    strategy: InjectionStrategy,
    chamber: &ChamberGeometry,
    inlet_velocity: FT,
    particle_radius: FT,
    rng: &mut impl Rng,
) -> (V3, V3) {
    let z = chamber.height() - 2. * particle_radius;
    let d = chamber.grid_diameter();

    match strategy {
        InjectionStrategy::Axial => (vec3f(0., 0., z), vec3f(0., 0., -inlet_velocity)),
        InjectionStrategy::Spiral => {
            let angle = rng.gen_range(0. ..TAU);
            let (sin, cos) = angle.sin_cos();
            let radius = d / 16.;
            let lateral = 0.2 * inlet_velocity;
            (
                vec3f(radius * cos, radius * sin, z),
                vec3f(lateral * cos, lateral * sin, -inlet_velocity),
            )
        }
        InjectionStrategy::Random => {
            let half = d / 8.;
            let x = rng.gen_range(-half..half);
            let y = rng.gen_range(-half..half);
            let spread = 0.3 * inlet_velocity;
            let (vx, vy) = match Normal::new(0., spread) {
                Ok(normal) => (normal.sample(rng), normal.sample(rng)),
                // only for a non-finite inlet speed
                Err(_) => (0., 0.),
            };
            (vec3f(x, y, z), vec3f(vx, vy, -inlet_velocity))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assert_ft_approx_eq,
        constants::{INLET_TEMPERATURE, PRESSURE},
        simulation_parameters::ChamberParams,
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn walnut(velocity: V3) -> Particle {
        Particle::from_media(
            0,
            MediaType::Walnut,
            &MediaType::Walnut.default_properties(),
            vec3f(0., 0., 6.),
            velocity,
        )
    }

    #[test]
    fn drag_vanishes_without_slip() {
        let fluid = FluidProperties::new(INLET_TEMPERATURE, PRESSURE);
        let particle = walnut(vec3f(0., 0., -10.));
        assert_eq!(
            particle.drag_acceleration(particle.velocity, vec3f(0., 0., -10.), &fluid),
            V3::zeros()
        );
    }

    #[test]
    fn drag_pulls_towards_the_gas_velocity() {
        let fluid = FluidProperties::new(INLET_TEMPERATURE, PRESSURE);
        let particle = walnut(vec3f(1., 0., 0.));
        let a = particle.drag_acceleration(particle.velocity, vec3f(0., 0., -17.), &fluid);
        assert!(a.x < 0.);
        assert!(a.z < 0.);
        assert_eq!(a.y, 0.);
    }

    #[test]
    fn drag_coefficient_regimes() {
        assert_ft_approx_eq(drag_coefficient(0.05), 480., 1e-9, || "stokes".into());
        assert_eq!(drag_coefficient(5000.), 0.44);
        let at_1000 = 24. / 1000. * (1. + 0.15 * (1000. as FT).powf(0.687));
        assert_ft_approx_eq(drag_coefficient(999.999), at_1000, 1e-4, || "transition".into());
    }

    #[test]
    fn injection_starts_inside_below_the_inlet() {
        let chamber = ChamberGeometry::new(&ChamberParams::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for strategy in [InjectionStrategy::Axial, InjectionStrategy::Spiral, InjectionStrategy::Random] {
            for _ in 0..50 {
                let (x, v) = inject(strategy, &chamber, 17.45, 0.0025, &mut rng);
                assert!(chamber.is_inside(x));
                assert!(x.xy().norm() < chamber.inlet_radius());
                assert_eq!(v.z, -17.45);
            }
        }

        let (x, v) = inject(InjectionStrategy::Spiral, &chamber, 17.45, 0.0025, &mut rng);
        assert_ft_approx_eq(x.xy().norm(), 3.8 / 16., 1e-12, || "spiral radius".into());
        assert!(x.xy().dot(&v.xy()) > 0.);
    }

    #[test]
    fn new_particle_state() {
        let particle = walnut(vec3f(0., 0., -2.));
        assert_eq!(particle.state, ParticleState::Injected);
        assert!(!particle.has_impacted());
        assert!(!particle.is_terminated());
        assert_ft_approx_eq(particle.kinetic_energy(), 2. * particle.mass, 1e-15, || "energy".into());
    }
}
