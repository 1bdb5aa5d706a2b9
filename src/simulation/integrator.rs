use serde::{Deserialize, Serialize};

use crate::{
    chamber::{ChamberEvent, ChamberGeometry, ExitBoundary, SurfaceContact},
    deposit::DepositAccess,
    floating_type_mod::FT,
    flow_field::{FlowField, FlowFieldTrait},
    fluid::FluidProperties,
    particle::{Particle, ParticleState},
    simulation_parameters::{IntegrationScheme, SimulationParams},
    vec3f, V3,
};

/// Read-only environment of the trajectory integration.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub chamber: &'a ChamberGeometry,
    pub flow: &'a FlowField,
    pub fluid: &'a FluidProperties,
    pub params: &'a SimulationParams,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum StepOutcome {
    Continuing,
    /// particle was moved to the contact point, the collision is not resolved yet
    Collided(SurfaceContact),
    Exited(ExitBoundary),
    /// non-finite state, the particle was not moved
    Diverged,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Step {
    pub outcome: StepOutcome,
    /// simulated time covered by the step, less than `dt` if the step was cut at an event
    pub elapsed: FT,
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub time: FT,
    pub position: V3,
    pub velocity: V3,
}

/// Replayable path of one particle, one sample per integration step plus the injection state.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trajectory {
    pub particle: usize,
    pub samples: Vec<TrajectorySample>,
}

impl Trajectory {
    pub fn new(particle: usize) -> Trajectory {
        Trajectory {
            particle,
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, time: FT, particle: &Particle) {
        self.samples.push(TrajectorySample {
            time,
            position: particle.position,
            velocity: particle.velocity,
        });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Drag, gravity and (optionally) buoyancy acting on `particle` at the given state.
pub fn acceleration(particle: &Particle, position: V3, velocity: V3, ctx: &StepContext) -> V3 {
    let fluid_velocity = ctx.flow.velocity_at(position);
    let drag = particle.drag_acceleration(velocity, fluid_velocity, ctx.fluid);

    let mut g = ctx.params.gravity;
    if ctx.params.buoyancy {
        g -= ctx.params.gravity * ctx.fluid.density / particle.density;
    }

    drag + vec3f(0., 0., g)
}

fn is_finite(v: &V3) -> bool {
    v.iter().all(|c| c.is_finite())
}

/**
 * Advances `particle` by at most `dt`.
 *
 * The new state is integrated with the configured scheme and the straight segment between the
 * old and the new position is tested against the chamber. On a contact or an exit the particle
 * is placed at the event point with its end-of-step velocity and only the covered part of `dt`
 * elapses. Contacts are measured against the deposit surface, i.e. the local deposit thickness
 * is added to the particle radius.
 */
pub fn step(particle: &mut Particle, dt: FT, ctx: &StepContext, deposit: &impl DepositAccess) -> Step {
    let x0 = particle.position;
    let v0 = particle.velocity;

    let (x1, v1) = match ctx.params.scheme {
        IntegrationScheme::SemiImplicitEuler => {
            let a = acceleration(particle, x0, v0, ctx);
            let v1 = v0 + a * dt;
            (x0 + v1 * dt, v1)
        }
        IntegrationScheme::Midpoint => {
            let a0 = acceleration(particle, x0, v0, ctx);
            let xm = x0 + v0 * (0.5 * dt);
            let vm = v0 + a0 * (0.5 * dt);
            let am = acceleration(particle, xm, vm, ctx);
            (x0 + vm * dt, v0 + am * dt)
        }
    };

    if !is_finite(&x1) || !is_finite(&v1) {
        return Step {
            outcome: StepOutcome::Diverged,
            elapsed: 0.,
        };
    }

    if particle.state == ParticleState::Injected {
        particle.state = ParticleState::InFlight;
    }

    let event = ctx
        .chamber
        .first_event(x0, x1, particle.radius(), |surface, x| deposit.surface_thickness(surface, x));

    let segment_length = (x1 - x0).norm();
    let (fraction, outcome, position) = match event {
        None => (1., StepOutcome::Continuing, x1),
        Some(ChamberEvent::Contact(contact)) => (contact.fraction, StepOutcome::Collided(contact), contact.point),
        Some(ChamberEvent::Exit {
            boundary,
            fraction,
            point,
        }) => (fraction, StepOutcome::Exited(boundary), point),
    };

    particle.position = position;
    particle.velocity = v1;
    particle.distance_traveled += fraction * segment_length;

    Step {
        outcome,
        elapsed: fraction * dt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chamber::SurfaceId,
        deposit::DepositField,
        media::MediaType,
        simulation_parameters::{ChamberParams, DepositInit, DepositParams, FlowParams},
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Setup {
        chamber: ChamberGeometry,
        flow: FlowField,
        fluid: FluidProperties,
        params: SimulationParams,
        deposit: DepositField,
    }

    impl Setup {
        fn new(thickness: FT) -> Setup {
            let chamber = ChamberGeometry::new(&ChamberParams::default()).unwrap();
            let flow_params = FlowParams::default();
            let deposit_params = DepositParams {
                init: DepositInit::Uniform { thickness },
                ..DepositParams::default()
            };
            Setup {
                flow: FlowField::new(&flow_params, &chamber),
                fluid: FluidProperties::new(flow_params.temperature, flow_params.pressure),
                params: SimulationParams::default(),
                deposit: DepositField::new(&deposit_params, &chamber, &mut ChaCha8Rng::seed_from_u64(0)),
                chamber,
            }
        }

        fn ctx(&self) -> StepContext {
            StepContext {
                chamber: &self.chamber,
                flow: &self.flow,
                fluid: &self.fluid,
                params: &self.params,
            }
        }
    }

    fn steel(position: V3, velocity: V3) -> Particle {
        Particle::from_media(
            0,
            MediaType::Steel,
            &MediaType::Steel.default_properties(),
            position,
            velocity,
        )
    }

    #[test]
    fn free_flight_follows_gravity_and_drag() {
        let setup = Setup::new(0.);
        let mut particle = steel(vec3f(0., 0., 11.), vec3f(0., 0., 0.));
        let step = step(&mut particle, 1e-3, &setup.ctx(), &setup.deposit);

        assert_eq!(step.outcome, StepOutcome::Continuing);
        assert_eq!(step.elapsed, 1e-3);
        assert_eq!(particle.state, ParticleState::InFlight);
        // gas and gravity both point downwards
        assert!(particle.velocity.z < -9.81e-3);
        assert!(particle.position.z < 11.);
    }

    #[test]
    fn collision_places_particle_on_the_deposit_surface() {
        let thickness = 0.004;
        let setup = Setup::new(thickness);
        let top_grid = setup.chamber.grids()[3].z();
        let mut particle = steel(vec3f(0., 0., top_grid + 0.03), vec3f(0., 0., -40.));
        let step = step(&mut particle, 1e-3, &setup.ctx(), &setup.deposit);

        match step.outcome {
            StepOutcome::Collided(contact) => {
                assert_eq!(contact.surface, SurfaceId::Grid(3));
                let expected = top_grid + particle.radius() + thickness;
                assert!((particle.position.z - expected).abs() < 1e-9);
                assert!(step.elapsed > 0. && step.elapsed < 1e-3);
            }
            other => panic!("expected a collision, got {:?}", other),
        }
    }

    #[test]
    fn midpoint_and_euler_agree_for_small_steps() {
        let mut setup = Setup::new(0.);
        let start = vec3f(0.4, 0.1, 11.);
        let v = vec3f(1., 0., -5.);

        let mut euler = steel(start, v);
        for _ in 0..100 {
            step(&mut euler, 1e-4, &setup.ctx(), &setup.deposit);
        }

        setup.params.scheme = IntegrationScheme::Midpoint;
        let mut midpoint = steel(start, v);
        for _ in 0..100 {
            step(&mut midpoint, 1e-4, &setup.ctx(), &setup.deposit);
        }

        assert!((euler.position - midpoint.position).norm() < 1e-4);
    }

    #[test]
    fn non_finite_state_diverges() {
        let setup = Setup::new(0.);
        let mut particle = steel(vec3f(0., 0., 11.), vec3f(FT::NAN, 0., 0.));
        let step = step(&mut particle, 1e-3, &setup.ctx(), &setup.deposit);
        assert_eq!(step.outcome, StepOutcome::Diverged);
        assert_eq!(particle.position, vec3f(0., 0., 11.));
    }
}
