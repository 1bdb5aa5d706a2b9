use enum_dispatch::enum_dispatch;

use crate::{
    chamber::ChamberGeometry,
    floating_type_mod::FT,
    simulation_parameters::{FlowModel, FlowParams},
    vec3f, V3,
};

/**
 * Prescribed gas velocity inside the chamber. Implementations have to be continuous everywhere,
 * including outside of the chamber, because the integrator samples arbitrary points.
 */
#[enum_dispatch]
pub trait FlowFieldTrait {
    fn velocity_at(&self, x: V3) -> V3;
}

#[enum_dispatch(FlowFieldTrait)]
#[derive(Clone, Debug)]
pub enum FlowField {
    DevelopingJetFlow(DevelopingJetFlow),
    UniformFlow(UniformFlow),
}

impl FlowField {
    pub fn new(params: &FlowParams, chamber: &ChamberGeometry) -> FlowField {
        match params.model {
            FlowModel::DevelopingJet => DevelopingJetFlow::new(params, chamber).into(),
            FlowModel::Uniform => UniformFlow::new(params, chamber).into(),
        }
    }
}

/// Mean velocity of the fully mixed flow over the chamber cross section.
fn continuity_velocity(inlet_velocity: FT, chamber: &ChamberGeometry) -> FT {
    let ratio = chamber.inlet_diameter() / chamber.grid_diameter();
    inlet_velocity * ratio * ratio
}

/**
 * Downward jet entering through the roof opening and spreading to the full cross section.
 *
 * The mean axial speed decays exponentially with the distance below the roof from the inlet
 * speed to the continuity speed. The radial profile `1 + a (1 - 2 rho^2)` with `rho = r / R`
 * keeps the cross section mean and peaks on the axis; its peaking `a` relaxes over the same
 * decay length.
 */
#[derive(Clone, Debug)]
pub struct DevelopingJetFlow {
    height: FT,
    radius: FT,
    inlet_velocity: FT,
    developed_velocity: FT,
    decay_length: FT,
    inlet_peaking: FT,
    developed_peaking: FT,
}

impl DevelopingJetFlow {
    pub fn new(params: &FlowParams, chamber: &ChamberGeometry) -> DevelopingJetFlow {
        let inlet_velocity = params.inlet_velocity();
        DevelopingJetFlow {
            height: chamber.height(),
            radius: chamber.radius(),
            inlet_velocity,
            developed_velocity: continuity_velocity(inlet_velocity, chamber),
            decay_length: params.jet_decay_diameters * chamber.inlet_diameter(),
            inlet_peaking: params.inlet_peaking,
            developed_peaking: params.developed_peaking,
        }
    }

    /// Cross section mean of the downward speed at height `z`.
    pub fn mean_speed(&self, z: FT) -> FT {
        let s = self.decay(z);
        self.developed_velocity + (self.inlet_velocity - self.developed_velocity) * s
    }

    fn decay(&self, z: FT) -> FT {
        let depth = self.height - z.max(0.).min(self.height);
        (-depth / self.decay_length).exp()
    }
}

impl FlowFieldTrait for DevelopingJetFlow {
    fn velocity_at(&self, x: V3) -> V3 {
        let s = self.decay(x.z);
        let peaking = self.developed_peaking + (self.inlet_peaking - self.developed_peaking) * s;

        let rho = (x.xy().norm() / self.radius).min(1.);
        let profile = 1. + peaking * (1. - 2. * rho * rho);

        vec3f(0., 0., -self.mean_speed(x.z) * profile)
    }
}

/// Plug flow at the continuity speed.
#[derive(Clone, Debug)]
pub struct UniformFlow {
    velocity: FT,
}

impl UniformFlow {
    pub fn new(params: &FlowParams, chamber: &ChamberGeometry) -> UniformFlow {
        UniformFlow {
            velocity: continuity_velocity(params.inlet_velocity(), chamber),
        }
    }
}

impl FlowFieldTrait for UniformFlow {
    fn velocity_at(&self, _x: V3) -> V3 {
        vec3f(0., 0., -self.velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert_ft_approx_eq, floating_type_mod::TAU, simulation_parameters::ChamberParams};

    fn setup(model: FlowModel) -> (FlowField, ChamberGeometry) {
        let chamber = ChamberGeometry::new(&ChamberParams::default()).unwrap();
        let params = FlowParams {
            model,
            ..FlowParams::default()
        };
        (FlowField::new(&params, &chamber), chamber)
    }

    #[test]
    fn jet_is_fastest_on_the_axis_and_decays_downwards() {
        let (flow, _) = setup(FlowModel::DevelopingJet);

        let axis_top = flow.velocity_at(vec3f(0., 0., 11.9));
        let wall_top = flow.velocity_at(vec3f(1.9, 0., 11.9));
        let axis_bottom = flow.velocity_at(vec3f(0., 0., 0.1));

        assert!(axis_top.z < 0.);
        assert!(axis_top.z < wall_top.z);
        assert!(axis_top.z < axis_bottom.z);
        assert_eq!(axis_top.x, 0.);
        assert_eq!(axis_top.y, 0.);
    }

    #[test]
    fn jet_profile_preserves_the_mean_speed() {
        let (flow, chamber) = setup(FlowModel::DevelopingJet);
        let jet = match &flow {
            FlowField::DevelopingJetFlow(jet) => jet.clone(),
            _ => unreachable!(),
        };

        // midpoint rule over rings of the cross section
        let z = 8.;
        let n = 2000;
        let dr = chamber.radius() / n as FT;
        let flux: FT = (0..n)
            .map(|i| {
                let r = (i as FT + 0.5) * dr;
                -flow.velocity_at(vec3f(r, 0., z)).z * TAU * r * dr
            })
            .sum();
        let mean = flux / chamber.cross_section_area();
        assert_ft_approx_eq(mean, jet.mean_speed(z), 1e-4, || "mean speed".into());
    }

    #[test]
    fn field_is_continuous_outside_the_chamber() {
        let (flow, _) = setup(FlowModel::DevelopingJet);
        let inside = flow.velocity_at(vec3f(1.9, 0., 12.));
        let outside = flow.velocity_at(vec3f(2.5, 0., 12.5));
        assert_eq!(inside, outside);
    }

    #[test]
    fn uniform_flow_is_continuity_speed() {
        let (flow, chamber) = setup(FlowModel::Uniform);
        let expected = 17.45 * (chamber.inlet_area() / chamber.cross_section_area());
        let v = flow.velocity_at(vec3f(0.3, 0.2, 4.));
        assert_ft_approx_eq(-v.z, expected, 1e-9, || "uniform".into());
    }
}
