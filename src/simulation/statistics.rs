use std::{collections::BTreeMap, fmt::Write};

use serde::{Deserialize, Serialize};

use crate::{
    chamber::{ExitBoundary, GridPluggingStatistics, GridPressureDrop},
    floating_type_mod::FT,
    impact::ImpactEvent,
    media::{MediaProperties, MediaType},
    particle::{ExpiryReason, Termination},
};

/// Impact energy counts in logarithmically spaced bins.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct EnergyHistogram {
    /// J, `counts.len() + 1` ascending bin edges
    pub edges: Vec<FT>,
    pub counts: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
}

impl Default for EnergyHistogram {
    fn default() -> Self {
        EnergyHistogram::new(1e-6, 10., 28)
    }
}

impl EnergyHistogram {
    pub fn new(min: FT, max: FT, bins: usize) -> EnergyHistogram {
        let log_min = min.log10();
        let log_max = max.log10();
        let edges = (0..=bins)
            .map(|i| (10 as FT).powf(log_min + (log_max - log_min) * i as FT / bins as FT))
            .collect();
        EnergyHistogram {
            edges,
            counts: vec![0; bins],
            underflow: 0,
            overflow: 0,
        }
    }

    pub fn add(&mut self, energy: FT) {
        let bins = self.counts.len();
        if bins == 0 || energy < self.edges[0] {
            self.underflow += 1;
        } else if energy >= self.edges[bins] {
            self.overflow += 1;
        } else {
            // the last edge smaller or equal to the energy
            let bin = self.edges.partition_point(|&edge| edge <= energy) - 1;
            self.counts[bin.min(bins - 1)] += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.underflow + self.overflow
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaStatistics {
    pub particles: usize,
    pub impacts: usize,
    /// kg
    pub removed_mass: FT,
    /// kg of media injected
    pub media_mass: FT,
    /// USD
    pub cost: FT,
}

/// What happened to the particles of a cycle.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub exited_inlet: usize,
    pub exited_outlet: usize,
    pub settled: usize,
    pub expired_step_cap: usize,
    pub diverged: usize,
}

impl Diagnostics {
    pub fn record(&mut self, termination: Termination) {
        match termination {
            Termination::Exited(ExitBoundary::Inlet) => self.exited_inlet += 1,
            Termination::Exited(ExitBoundary::Outlet) => self.exited_outlet += 1,
            Termination::Settled => self.settled += 1,
            Termination::Expired(ExpiryReason::StepCapExceeded) => self.expired_step_cap += 1,
            Termination::Expired(ExpiryReason::NumericalDivergence) => self.diverged += 1,
        }
    }

    pub fn expired(&self) -> usize {
        self.expired_step_cap + self.diverged
    }
}

/**
 * Aggregate of one cleaning cycle. Impacts of expired particles are not part of any impact
 * figure, those particles only show up in `particles_injected` and the diagnostics.
 */
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CycleStatistics {
    pub cycle: usize,
    pub particles_injected: usize,
    /// impacts that found deposit on the struck cell
    pub total_impacts: usize,
    /// impacts that detached deposit
    pub removing_impacts: usize,
    /// every wall, grid or roof contact
    pub surface_contacts: usize,
    /// kg
    pub initial_deposit_mass: FT,
    /// kg
    pub removed_mass: FT,
    pub removal_efficiency: FT,
    /// fraction of deposit cells touched during the cycle
    pub coverage: FT,
    /// J, over all surface contacts
    pub mean_impact_energy: FT,
    pub max_impact_energy: FT,
    pub energy_histogram: EnergyHistogram,
    pub per_media: BTreeMap<MediaType, MediaStatistics>,
    pub total_cost: FT,
    pub diagnostics: Diagnostics,
}

impl CycleStatistics {
    pub fn new(cycle: usize, initial_deposit_mass: FT) -> CycleStatistics {
        CycleStatistics {
            cycle,
            particles_injected: 0,
            total_impacts: 0,
            removing_impacts: 0,
            surface_contacts: 0,
            initial_deposit_mass,
            removed_mass: 0.,
            removal_efficiency: 0.,
            coverage: 0.,
            mean_impact_energy: 0.,
            max_impact_energy: 0.,
            energy_histogram: EnergyHistogram::default(),
            per_media: BTreeMap::new(),
            total_cost: 0.,
            diagnostics: Diagnostics::default(),
        }
    }

    /**
     * Adds one particle. `removed_mass` is the mass that was actually taken from the field for
     * this particle.
     */
    pub fn record_particle(
        &mut self,
        media: MediaType,
        properties: &MediaProperties,
        termination: Termination,
        impacts: &[ImpactEvent],
        removed_mass: FT,
    ) {
        self.particles_injected += 1;
        self.diagnostics.record(termination);

        let media_mass = properties.mass();
        let media_stats = self.per_media.entry(media).or_default();
        media_stats.particles += 1;
        media_stats.media_mass += media_mass;
        media_stats.cost += media_mass * properties.cost_per_kg;
        self.total_cost += media_mass * properties.cost_per_kg;

        if matches!(termination, Termination::Expired(_)) {
            return;
        }

        let energy_sum = self.mean_impact_energy * self.surface_contacts as FT;
        let mut new_energy = 0.;
        for impact in impacts {
            self.surface_contacts += 1;
            new_energy += impact.energy;
            self.max_impact_energy = self.max_impact_energy.max(impact.energy);
            self.energy_histogram.add(impact.energy);
            if impact.struck_deposit {
                self.total_impacts += 1;
                media_stats.impacts += 1;
            }
            if impact.removed > 0. {
                self.removing_impacts += 1;
            }
        }
        if self.surface_contacts > 0 {
            self.mean_impact_energy = (energy_sum + new_energy) / self.surface_contacts as FT;
        }

        media_stats.removed_mass += removed_mass;
        self.removed_mass += removed_mass;
    }

    pub fn finish(&mut self, coverage: FT) {
        self.coverage = coverage;
        self.removal_efficiency = efficiency(self.removed_mass, self.initial_deposit_mass);
    }
}

fn efficiency(removed: FT, initial: FT) -> FT {
    if initial > 0. {
        removed / initial
    } else {
        0.
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    pub cycles: Vec<CycleStatistics>,
    /// kg before the first cycle
    pub initial_deposit_mass: FT,
    /// kg grown between the cycles
    pub accumulated_mass: FT,
    /// kg after the last cycle
    pub final_deposit_mass: FT,
    pub removed_mass: FT,
    /// removed mass over the initial deposit plus everything accumulated in between
    pub removal_efficiency: FT,
}

impl RunStatistics {
    /// `accumulated_mass` is the deposit grown between the cycles.
    pub fn new(
        cycles: Vec<CycleStatistics>,
        initial_deposit_mass: FT,
        accumulated_mass: FT,
        final_deposit_mass: FT,
    ) -> RunStatistics {
        let removed_mass: FT = cycles.iter().map(|c| c.removed_mass).sum();
        RunStatistics {
            removal_efficiency: efficiency(removed_mass, initial_deposit_mass + accumulated_mass),
            cycles,
            initial_deposit_mass,
            accumulated_mass,
            final_deposit_mass,
            removed_mass,
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.cycles.iter().fold(Diagnostics::default(), |mut acc, c| {
            acc.exited_inlet += c.diagnostics.exited_inlet;
            acc.exited_outlet += c.diagnostics.exited_outlet;
            acc.settled += c.diagnostics.settled;
            acc.expired_step_cap += c.diagnostics.expired_step_cap;
            acc.diverged += c.diagnostics.diverged;
            acc
        })
    }
}

/// Human readable overview of a run.
pub fn write_summary(statistics: &RunStatistics) -> String {
    let mut s = String::new();

    writeln!(
        s,
        "deposit: initial {:.3} kg, accumulated {:.3} kg, final {:.3} kg, removed {:.6} kg (efficiency {:.4e})",
        statistics.initial_deposit_mass,
        statistics.accumulated_mass,
        statistics.final_deposit_mass,
        statistics.removed_mass,
        statistics.removal_efficiency
    )
    .unwrap();
    writeln!(s).unwrap();

    writeln!(
        s,
        "{:>5} {:>9} {:>9} {:>9} {:>12} {:>11} {:>9} {:>11} {:>9}",
        "cycle", "particles", "impacts", "contacts", "removed/kg", "efficiency", "coverage", "mean E/J", "cost/USD"
    )
    .unwrap();
    for c in &statistics.cycles {
        writeln!(
            s,
            "{:>5} {:>9} {:>9} {:>9} {:>12.4e} {:>11.4e} {:>9.4} {:>11.4e} {:>9.3}",
            c.cycle,
            c.particles_injected,
            c.total_impacts,
            c.surface_contacts,
            c.removed_mass,
            c.removal_efficiency,
            c.coverage,
            c.mean_impact_energy,
            c.total_cost
        )
        .unwrap();
    }
    writeln!(s).unwrap();

    let d = statistics.diagnostics();
    writeln!(
        s,
        "particles: {} exited inlet, {} exited outlet, {} settled, {} expired (step cap), {} diverged",
        d.exited_inlet, d.exited_outlet, d.settled, d.expired_step_cap, d.diverged
    )
    .unwrap();

    s
}

/// One line per cleaning medium, the most effective medium per unit cost is marked.
pub fn write_media_comparison(results: &[(MediaType, RunStatistics)]) -> String {
    let mut s = String::new();

    let removal_per_cost = |stats: &RunStatistics| {
        let cost: FT = stats.cycles.iter().map(|c| c.total_cost).sum();
        if cost > 0. {
            stats.removed_mass / cost
        } else {
            0.
        }
    };
    let best = results
        .iter()
        .map(|(media, stats)| (*media, removal_per_cost(stats)))
        .fold(None, |best: Option<(MediaType, FT)>, (media, value)| match best {
            Some((_, best_value)) if best_value >= value => best,
            _ => Some((media, value)),
        })
        .map(|(media, _)| media);

    writeln!(
        s,
        "{:<14} {:>9} {:>12} {:>11} {:>9} {:>11} {:>12}",
        "media", "impacts", "removed/kg", "efficiency", "coverage", "cost/USD", "kg/USD"
    )
    .unwrap();
    for (media, stats) in results {
        let impacts: usize = stats.cycles.iter().map(|c| c.total_impacts).sum();
        let cost: FT = stats.cycles.iter().map(|c| c.total_cost).sum();
        let coverage = stats.cycles.iter().map(|c| c.coverage).fold(0., FT::max);
        writeln!(
            s,
            "{:<14} {:>9} {:>12.4e} {:>11.4e} {:>9.4} {:>11.3} {:>12.4e}{}",
            media.name(),
            impacts,
            stats.removed_mass,
            stats.removal_efficiency,
            coverage,
            cost,
            removal_per_cost(stats),
            if Some(*media) == best { "  *" } else { "" }
        )
        .unwrap();
    }

    s
}

/// Plugging and pressure drop of every grid, top grid first.
pub fn write_chamber_report(plugging: &[GridPluggingStatistics], pressure_drops: &[GridPressureDrop]) -> String {
    let mut s = String::new();

    writeln!(
        s,
        "{:>4} {:>6} {:>9} {:>11} {:>9} {:>11} {:>10} {:>12}",
        "grid", "holes", "open", "refractory", "deposit", "area/m2", "v/(m/s)", "dp/Pa"
    )
    .unwrap();
    for (p, dp) in plugging.iter().zip(pressure_drops.iter()) {
        writeln!(
            s,
            "{:>4} {:>6} {:>8.1}% {:>10.1}% {:>8.1}% {:>11.4} {:>10.2} {:>12.1}",
            p.grid_number,
            p.total_holes,
            100. * p.open_fraction,
            100. * p.refractory_plugging,
            100. * p.deposit_plugging,
            dp.open_area,
            dp.hole_velocity,
            dp.pressure_drop
        )
        .unwrap();
    }
    let total: FT = pressure_drops.iter().map(|dp| dp.pressure_drop).sum();
    writeln!(s, "total pressure drop: {:.1} Pa", total).unwrap();

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chamber::SurfaceId, deposit::CellId, vec3f};

    fn impact(energy: FT, struck_deposit: bool, removed: FT) -> ImpactEvent {
        ImpactEvent {
            particle: 0,
            time: 0.,
            surface: SurfaceId::Wall,
            cell: Some(CellId(0)),
            point: vec3f(1.9, 0., 1.),
            normal: vec3f(-1., 0., 0.),
            impact_speed: 1.,
            energy,
            energy_consumed: 0.,
            requested_removal: removed,
            removed,
            struck_deposit,
            velocity_before: vec3f(1., 0., 0.),
            rebound_velocity: vec3f(-0.5, 0., 0.),
        }
    }

    #[test]
    fn histogram_bins() {
        let mut histogram = EnergyHistogram::default();
        assert_eq!(histogram.edges.len(), 29);
        histogram.add(1e-7);
        histogram.add(1e-6);
        histogram.add(0.5);
        histogram.add(10.);
        assert_eq!(histogram.underflow, 1);
        assert_eq!(histogram.overflow, 1);
        assert_eq!(histogram.counts[0], 1);
        assert_eq!(histogram.total(), 4);
    }

    #[test]
    fn expired_particles_are_excluded_from_impacts() {
        let walnut = MediaType::Walnut.default_properties();
        let mut stats = CycleStatistics::new(0, 10.);

        stats.record_particle(
            MediaType::Walnut,
            &walnut,
            Termination::Settled,
            &[impact(1e-3, true, 0.1), impact(3e-3, false, 0.)],
            0.1,
        );
        stats.record_particle(
            MediaType::Walnut,
            &walnut,
            Termination::Expired(ExpiryReason::StepCapExceeded),
            &[impact(1., true, 1.)],
            0.,
        );
        stats.finish(0.25);

        assert_eq!(stats.particles_injected, 2);
        assert_eq!(stats.total_impacts, 1);
        assert_eq!(stats.removing_impacts, 1);
        assert_eq!(stats.surface_contacts, 2);
        assert_eq!(stats.max_impact_energy, 3e-3);
        assert!((stats.mean_impact_energy - 2e-3).abs() < 1e-15);
        assert!((stats.removal_efficiency - 0.01).abs() < 1e-15);
        assert_eq!(stats.diagnostics.expired(), 1);
        assert_eq!(stats.per_media[&MediaType::Walnut].particles, 2);
        assert!((stats.total_cost - 2. * walnut.mass() * 2.5).abs() < 1e-15);
    }

    #[test]
    fn comparison_marks_cheapest_removal() {
        let run = |removed: FT, cost: FT| {
            let mut cycle = CycleStatistics::new(0, 10.);
            cycle.removed_mass = removed;
            cycle.total_cost = cost;
            RunStatistics::new(vec![cycle], 10., 0., 10. - removed)
        };
        let text = write_media_comparison(&[
            (MediaType::Walnut, run(1., 1.)),
            (MediaType::Steel, run(1., 4.)),
        ]);
        let walnut_line = text.lines().find(|l| l.starts_with("walnut")).unwrap();
        let steel_line = text.lines().find(|l| l.starts_with("steel")).unwrap();
        assert!(walnut_line.ends_with('*'));
        assert!(!steel_line.ends_with('*'));
    }

    #[test]
    fn zero_initial_mass_has_zero_efficiency() {
        let mut stats = CycleStatistics::new(0, 0.);
        stats.finish(0.);
        assert_eq!(stats.removal_efficiency, 0.);
    }
}
