//! Property-based tests of the removal model, the deposit bookkeeping and the trajectory step.

use orifice_clean::{
    chamber::ChamberGeometry,
    deposit::{CellId, DepositAccess, DepositField, DepositLedger, LedgerView},
    flow_field::FlowField,
    fluid::FluidProperties,
    impact::{impact_energy, rebound_velocity, removal_amount, ImpactParams},
    integrator::{step, StepContext, StepOutcome},
    media::MediaType,
    particle::Particle,
    simulation_parameters::{ChamberParams, DepositInit, DepositParams, FlowParams, SimulationParams},
    vec3f,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// walnut shell on the default deposit, J/kg
const SPECIFIC_ENERGY: f64 = 174.4;

fn deposit_field(seed: u64) -> (ChamberGeometry, DepositField) {
    let chamber = ChamberGeometry::new(&ChamberParams::default()).unwrap();
    let params = DepositParams {
        init: DepositInit::Random { min: 0., max: 0.005 },
        axial_cells: 12,
        angular_cells: 12,
        radial_cells: 3,
        ..DepositParams::default()
    };
    let field = DepositField::new(&params, &chamber, &mut ChaCha8Rng::seed_from_u64(seed));
    (chamber, field)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: a harder medium never removes less at the same impact energy
    #[test]
    fn removal_non_decreasing_in_hardness(
        energy in 0.0f64..1.0,
        h1 in 0.0f64..1.0,
        h2 in 0.0f64..1.0,
        restitution in 0.0f64..1.0,
        thickness in 0.0f64..0.01,
    ) {
        let params = ImpactParams::default();
        let (soft, hard) = if h1 <= h2 { (h1, h2) } else { (h2, h1) };
        let a = removal_amount(energy, restitution, soft, thickness, SPECIFIC_ENERGY, &params);
        let b = removal_amount(energy, restitution, hard, thickness, SPECIFIC_ENERGY, &params);
        prop_assert!(a <= b);
        prop_assert!(a >= 0.);
    }

    /// Property: more energy never removes less, thicker deposit never removes more
    #[test]
    fn removal_monotone_in_energy_and_thickness(
        e1 in 0.0f64..1.0,
        e2 in 0.0f64..1.0,
        t1 in 0.0f64..0.01,
        t2 in 0.0f64..0.01,
        hardness in 0.0f64..1.0,
    ) {
        let params = ImpactParams::default();
        let (low, high) = if e1 <= e2 { (e1, e2) } else { (e2, e1) };
        let (thin, thick) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        prop_assert!(
            removal_amount(low, 0.5, hardness, thin, SPECIFIC_ENERGY, &params)
                <= removal_amount(high, 0.5, hardness, thin, SPECIFIC_ENERGY, &params)
        );
        prop_assert!(
            removal_amount(high, 0.5, hardness, thick, SPECIFIC_ENERGY, &params)
                <= removal_amount(high, 0.5, hardness, thin, SPECIFIC_ENERGY, &params)
        );
    }

    /// Property: impact energy is never negative and the rebound never speeds the particle up
    #[test]
    fn impact_energy_and_rebound_bounds(
        vx in -50.0f64..50.0,
        vy in -50.0f64..50.0,
        vz in -50.0f64..50.0,
        restitution in 0.0f64..1.0,
    ) {
        let v = vec3f(vx, vy, vz);
        let n = vec3f(0., 0., 1.);
        prop_assert!(impact_energy(1e-3, v, n) >= 0.);
        prop_assert!(rebound_velocity(v, n, restitution).norm() <= v.norm() + 1e-12);
    }

    /// Property: removals never take more than the cell holds and never leave negative mass
    #[test]
    fn remove_mass_is_clamped(seed in 0u64..1000, cell in 0usize..500, amount in 0.0f64..10.0) {
        let (_, mut field) = deposit_field(seed);
        let id = CellId(cell % field.len());
        let before = field.cell(id).mass;

        let removed = field.remove_mass(id, amount);
        prop_assert!(removed <= before);
        prop_assert!(removed <= amount);
        prop_assert!(field.cell(id).mass >= 0.);
        prop_assert!((field.cell(id).mass - (before - removed)).abs() <= 1e-12);
    }

    /// Property: a ledger view clamps like the field and committing it removes the same mass
    #[test]
    fn ledger_matches_direct_removal(seed in 0u64..1000, amounts in prop::collection::vec((0usize..500, 0.0f64..2.0), 1..20)) {
        let (_, field) = deposit_field(seed);
        let mut direct = field.clone();
        let mut committed = field.clone();

        let mut ledger = DepositLedger::new();
        let mut removed_in_view = 0.;
        {
            let mut view = LedgerView::new(&field, &mut ledger);
            for &(cell, amount) in &amounts {
                let id = CellId(cell % field.len());
                let removed = view.remove_mass(id, amount);
                prop_assert!(view.mass(id) >= 0.);
                removed_in_view += removed;
                direct.remove_mass(id, amount);
            }
        }

        let removed = committed.commit_ledger(&ledger);
        prop_assert!((removed - removed_in_view).abs() <= 1e-9);
        prop_assert!((committed.total_mass() - direct.total_mass()).abs() <= 1e-9);
    }

    /// Property: after a step the particle is inside the chamber or has left it through an opening
    #[test]
    fn step_keeps_particle_inside(
        r in 0.0f64..1.85,
        angle in 0.0f64..6.28,
        z in 0.1f64..11.9,
        vx in -50.0f64..50.0,
        vy in -50.0f64..50.0,
        vz in -50.0f64..50.0,
    ) {
        let (chamber, field) = deposit_field(1);
        let flow_params = FlowParams::default();
        let flow = FlowField::new(&flow_params, &chamber);
        let fluid = FluidProperties::new(flow_params.temperature, flow_params.pressure);
        let params = SimulationParams::default();
        let ctx = StepContext { chamber: &chamber, flow: &flow, fluid: &fluid, params: &params };

        let start = vec3f(r * angle.cos(), r * angle.sin(), z);
        let mut particle = Particle::from_media(
            0,
            MediaType::Ceramic,
            &MediaType::Ceramic.default_properties(),
            start,
            vec3f(vx, vy, vz),
        );

        let result = step(&mut particle, params.dt, &ctx, &field);
        match result.outcome {
            StepOutcome::Exited(_) => {}
            StepOutcome::Diverged => prop_assert!(false, "finite input diverged"),
            _ => prop_assert!(chamber.is_inside(particle.position), "{:?}", particle.position),
        }
        prop_assert!(result.elapsed >= 0. && result.elapsed <= params.dt);
    }
}
