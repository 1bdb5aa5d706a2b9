use std::{
    collections::BTreeMap,
    fmt::{Display, Write},
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use num_traits::Float;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    chamber::ChamberGeometry,
    concurrency::par_map_indexed,
    deposit::{DepositField, DepositLedger, LedgerView},
    error::{ConfigurationError, SimulationResult},
    floating_type_mod::FT,
    flow_field::FlowField,
    fluid::FluidProperties,
    impact::{self, ImpactEvent},
    integrator::{self, StepContext, StepOutcome, Trajectory},
    media::{MediaTable, MediaType},
    particle::{inject, ExpiryReason, Particle, ParticleState, Termination},
    simulation_parameters::{Execution, RunConfig},
    statistics::{CycleStatistics, RunStatistics},
};

/// Stream of the random source that fills the initial deposit field.
const DEPOSIT_STREAM: u64 = u64::MAX;

#[derive(Clone)]
struct Counter<T> {
    values: Vec<T>,
    last_start: Instant,
}
impl<T> Counter<T> {
    fn new() -> Self {
        Counter::<T> {
            last_start: Instant::now(),
            values: Vec::new(),
        }
    }
    fn add_value(&mut self, v: T) {
        self.values.push(v);
    }
}
impl Counter<FT> {
    fn avg(&self) -> FT {
        if self.values.is_empty() {
            return 0.;
        }
        self.values.iter().cloned().sum::<FT>() / self.values.len() as FT
    }
    fn min(&self) -> FT {
        self.values.iter().cloned().fold(FT::max_value(), |a, b| FT::min(a, b))
    }
    fn max(&self) -> FT {
        self.values.iter().cloned().fold(FT::min_value(), |a, b| FT::max(a, b))
    }
}
impl Counter<Duration> {
    fn begin(&mut self) {
        self.last_start = Instant::now();
    }

    fn end(&mut self) {
        self.values.push(Instant::now() - self.last_start);
    }

    fn avg(&self) -> Duration {
        self.values.iter().cloned().sum::<Duration>() / self.values.len().max(1) as u32
    }

    fn sum(&self) -> Duration {
        self.values.iter().cloned().sum::<Duration>()
    }
}

#[derive(Clone)]
struct ValueCounters {
    counters: BTreeMap<String, Counter<FT>>,
    enabled: bool,
}
impl ValueCounters {
    fn new(enabled: bool) -> ValueCounters {
        ValueCounters {
            counters: BTreeMap::new(),
            enabled,
        }
    }

    fn add_value(&mut self, id: &str, v: FT) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(Counter::<FT>::new)
                .add_value(v);
        }
    }
}

#[derive(Clone)]
struct PerformanceCounters {
    counters: BTreeMap<String, Counter<Duration>>,
    enabled: bool,
}
impl PerformanceCounters {
    fn new(enabled: bool) -> PerformanceCounters {
        PerformanceCounters {
            counters: BTreeMap::new(),
            enabled,
        }
    }

    fn begin(&mut self, id: &str) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(Counter::<Duration>::new)
                .begin();
        }
    }
    fn end(&mut self, id: &str) {
        if self.enabled {
            if let Some(counter) = self.counters.get_mut(id) {
                counter.end();
            }
        }
    }
}

/**
 * Read-only state shared by all particles of a run: the configuration and everything derived
 * from it.
 */
pub struct SimulationContext {
    pub config: RunConfig,
    pub chamber: ChamberGeometry,
    pub fluid: FluidProperties,
    pub flow: FlowField,
    pub media: MediaTable,
    /// m/s
    pub inlet_velocity: FT,
}

impl SimulationContext {
    pub fn new(config: RunConfig) -> Result<SimulationContext, ConfigurationError> {
        config.validate()?;
        let chamber = ChamberGeometry::new(&config.chamber)?;
        let media = MediaTable::with_overrides(&config.media_overrides)?;
        let fluid = FluidProperties::new(config.flow.temperature, config.flow.pressure);
        let flow = FlowField::new(&config.flow, &chamber);
        let inlet_velocity = config.flow.inlet_velocity();

        Ok(SimulationContext {
            config,
            chamber,
            fluid,
            flow,
            media,
            inlet_velocity,
        })
    }

    pub fn step_context(&self) -> StepContext {
        StepContext {
            chamber: &self.chamber,
            flow: &self.flow,
            fluid: &self.fluid,
            params: &self.config.simulation,
        }
    }

    /// Independent random stream of particle `index` in `cycle`.
    pub fn particle_rng(&self, cycle: usize, index: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        rng.set_stream(((cycle as u64) << 32) | (index as u64 & 0xffff_ffff));
        rng
    }
}

/// Everything one particle did during its lifetime.
#[derive(PartialEq, Debug, Clone)]
pub struct ParticleOutcome {
    pub index: usize,
    pub media: MediaType,
    pub termination: Termination,
    pub steps: usize,
    /// s of simulated time
    pub time: FT,
    pub distance_traveled: FT,
    pub impacts: Vec<ImpactEvent>,
    /// removals of the particle that are not applied to the deposit field yet
    pub ledger: DepositLedger,
    pub trajectory: Option<Trajectory>,
}

impl ParticleOutcome {
    pub fn is_expired(&self) -> bool {
        matches!(self.termination, Termination::Expired(_))
    }
}

/**
 * Simulates the complete lifetime of particle `index` of `cycle` against `deposit`.
 *
 * The deposit field is not modified: removals go into the returned ledger and are seen by the
 * later impacts of the same particle. The result only depends on the arguments and the run seed.
 */
pub fn simulate_one(context: &SimulationContext, deposit: &DepositField, cycle: usize, index: usize) -> ParticleOutcome {
    let config = &context.config;
    let params = &config.simulation;
    let step_context = context.step_context();
    let mut rng = context.particle_rng(cycle, index);

    let media = config.media_of_particle(index);
    let properties = context.media.get(media);
    let (position, velocity) = inject(
        config.injection,
        &context.chamber,
        context.inlet_velocity,
        properties.radius(),
        &mut rng,
    );
    let mut particle = Particle::from_media(index, media, &properties, position, velocity);

    let mut trajectory = config.records_trajectories().then(|| Trajectory::new(index));
    if let Some(trajectory) = trajectory.as_mut() {
        trajectory.push(0., &particle);
    }

    let mut ledger = DepositLedger::new();
    let mut impacts = Vec::new();
    let mut time = 0.;
    let mut steps = 0;

    let termination = {
        let mut view = LedgerView::new(deposit, &mut ledger);
        loop {
            if steps >= params.max_steps {
                break Termination::Expired(ExpiryReason::StepCapExceeded);
            }

            let step = integrator::step(&mut particle, params.dt, &step_context, &view);
            steps += 1;
            time += step.elapsed;

            if let Some(trajectory) = trajectory.as_mut() {
                trajectory.push(time, &particle);
            }

            match step.outcome {
                StepOutcome::Continuing => {}
                StepOutcome::Collided(contact) => {
                    let event = impact::resolve(&mut particle, &contact, time, &mut view, &config.impact, &mut rng);
                    impacts.push(event);
                    if particle.kinetic_energy() < params.min_kinetic_energy {
                        break Termination::Settled;
                    }
                    particle.state = ParticleState::InFlight;
                }
                StepOutcome::Exited(boundary) => break Termination::Exited(boundary),
                StepOutcome::Diverged => break Termination::Expired(ExpiryReason::NumericalDivergence),
            }
        }
    };
    particle.terminate(termination);

    match termination {
        Termination::Expired(reason) => warn!(
            "particle {} of cycle {} expired ({:?}) after {} steps at z={:.3}",
            index, cycle, reason, steps, particle.position.z
        ),
        _ => debug!(
            "particle {} ({}) {:?} after {} steps, {:.3} s, {:.2} m, {} impacts, removed {:.3e} kg",
            index,
            media.name(),
            termination,
            steps,
            time,
            particle.distance_traveled,
            impacts.len(),
            ledger.removed_mass()
        ),
    }

    ParticleOutcome {
        index,
        media,
        termination,
        steps,
        time,
        distance_traveled: particle.distance_traveled,
        impacts,
        ledger,
        trajectory,
    }
}

/**
 * Runs the configured particles through one or more cleaning cycles against a single deposit
 * field.
 *
 * With sequential execution every particle's removals are applied before the next particle
 * starts. With parallel execution all particles of a cycle see the field as it was at the start
 * of the cycle and their removals are applied afterwards in particle order, clamped to what is
 * left on each cell. Removals of expired particles are discarded in both modes.
 */
pub struct CleaningSimulation {
    context: SimulationContext,
    deposit: DepositField,
    initial_deposit_mass: FT,
    accumulated_mass: FT,
    cycles: Vec<CycleStatistics>,
    trajectories: Vec<Trajectory>,

    pcounters: PerformanceCounters,
    vcounters: ValueCounters,
}

impl CleaningSimulation {
    pub fn new(config: RunConfig) -> SimulationResult<CleaningSimulation> {
        let context = SimulationContext::new(config)?;

        let mut rng = ChaCha8Rng::seed_from_u64(context.config.seed);
        rng.set_stream(DEPOSIT_STREAM);
        let deposit = DepositField::new(&context.config.deposit, &context.chamber, &mut rng);
        let initial_deposit_mass = deposit.total_mass();

        info!(
            "chamber {:.3} m x {:.3} m with {} grids, inlet velocity {:.2} m/s, {} deposit cells holding {:.2} kg",
            context.chamber.grid_diameter(),
            context.chamber.height(),
            context.chamber.grids().len(),
            context.inlet_velocity,
            deposit.len(),
            initial_deposit_mass
        );

        Ok(CleaningSimulation {
            context,
            deposit,
            initial_deposit_mass,
            accumulated_mass: 0.,
            cycles: Vec::new(),
            trajectories: Vec::new(),
            pcounters: PerformanceCounters::new(false),
            vcounters: ValueCounters::new(false),
        })
    }

    /// Tracks timings and per-particle values for [`write_statistics`].
    pub fn enable_performance_counters(&mut self) {
        self.pcounters.enabled = true;
        self.vcounters.enabled = true;
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    pub fn config(&self) -> &RunConfig {
        &self.context.config
    }

    pub fn deposit(&self) -> &DepositField {
        &self.deposit
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    /// Aggregate of all cycles run so far.
    pub fn statistics(&self) -> RunStatistics {
        RunStatistics::new(
            self.cycles.clone(),
            self.initial_deposit_mass,
            self.accumulated_mass,
            self.deposit.total_mass(),
        )
    }

    /// Runs the remaining configured cycles.
    pub fn run(&mut self) -> RunStatistics {
        while self.cycles.len() < self.context.config.cycles {
            self.run_cycle();
        }
        self.statistics()
    }

    /**
     * Runs one cycle. Every cycle after the first starts with the deposit growth of one cleaning
     * interval if accumulation is enabled.
     */
    pub fn run_cycle(&mut self) -> &CycleStatistics {
        let cycle = self.cycles.len();
        self.pcounters.begin("cycle");

        if cycle > 0 {
            self.accumulate_between_cycles();
        }

        let initial_mass = self.deposit.total_mass();
        let impact_counts = self.deposit.impact_counts();
        let mut statistics = CycleStatistics::new(cycle, initial_mass);
        let n = self.context.config.effective_particle_count();

        info!(
            "cycle {}: injecting {} particles ({:?}), deposit {:.3} kg",
            cycle, n, self.context.config.execution, initial_mass
        );

        match self.context.config.execution {
            Execution::Sequential => {
                for index in 0..n {
                    self.pcounters.begin("particle");
                    let outcome = simulate_one(&self.context, &self.deposit, cycle, index);
                    self.pcounters.end("particle");
                    self.record_outcome(&mut statistics, outcome);
                }
            }
            Execution::Parallel => {
                self.pcounters.begin("particles");
                let context = &self.context;
                let deposit = &self.deposit;
                let outcomes = par_map_indexed(n, |index| simulate_one(context, deposit, cycle, index));
                self.pcounters.end("particles");

                self.pcounters.begin("commit");
                for outcome in outcomes {
                    self.record_outcome(&mut statistics, outcome);
                }
                self.pcounters.end("commit");
            }
        }

        statistics.finish(self.deposit.coverage_since(&impact_counts));
        self.pcounters.end("cycle");

        info!(
            "cycle {} done: {} impacts on deposit, {} surface contacts, removed {:.4e} kg (efficiency {:.4e}), coverage {:.3}",
            cycle,
            statistics.total_impacts,
            statistics.surface_contacts,
            statistics.removed_mass,
            statistics.removal_efficiency,
            statistics.coverage
        );
        if statistics.diagnostics.expired() > 0 {
            warn!(
                "cycle {}: {} particles expired ({} step cap, {} diverged)",
                cycle,
                statistics.diagnostics.expired(),
                statistics.diagnostics.expired_step_cap,
                statistics.diagnostics.diverged
            );
        }

        self.cycles.push(statistics);
        &self.cycles[cycle]
    }

    fn accumulate_between_cycles(&mut self) {
        let params = &self.context.config.deposit;
        if !params.accumulate_between_cycles {
            return;
        }
        let before = self.deposit.total_mass();
        self.deposit.accumulate(params.cleaning_interval(), params.growth_rate());
        let grown = self.deposit.total_mass() - before;
        self.accumulated_mass += grown;
        info!(
            "deposit grew by {:.3} kg over {} days",
            grown, params.cleaning_interval_days
        );
    }

    fn record_outcome(&mut self, statistics: &mut CycleStatistics, outcome: ParticleOutcome) {
        let removed = if outcome.is_expired() {
            0.
        } else {
            self.deposit.commit_ledger(&outcome.ledger)
        };

        let properties = self.context.media.get(outcome.media);
        statistics.record_particle(
            outcome.media,
            &properties,
            outcome.termination,
            &outcome.impacts,
            removed,
        );

        self.vcounters.add_value("particle-steps", outcome.steps as FT);
        self.vcounters.add_value("particle-impacts", outcome.impacts.len() as FT);
        self.vcounters.add_value("particle-time", outcome.time);
        self.vcounters.add_value("particle-distance", outcome.distance_traveled);

        if let Some(trajectory) = outcome.trajectory {
            self.trajectories.push(trajectory);
        }
    }
}

/**
 * Runs `config` once per cleaning medium with all particles of that medium. Everything else,
 * including the seed, stays the same.
 */
pub fn compare_media(config: &RunConfig) -> SimulationResult<Vec<(MediaType, RunStatistics)>> {
    let mut results = Vec::new();
    for media in MediaType::ALL {
        let mut media_config = config.clone();
        media_config.media = vec![media];
        info!("comparing media: {}", media.name());
        let mut simulation = CleaningSimulation::new(media_config)?;
        results.push((media, simulation.run()));
    }
    Ok(results)
}

pub fn is_ft_approx_eq<FT: Float>(a: FT, b: FT, tolerance: FT) -> bool {
    assert!(!a.is_nan());
    assert!(!b.is_nan());
    b <= a + tolerance && b >= a - tolerance
}

pub fn assert_ft_approx_eq2<FT: Float + Display>(
    a: FT,
    b: FT,
    tolerance: FT,
    s: impl FnOnce() -> (String, String, String),
) {
    if !is_ft_approx_eq(a, b, tolerance) {
        let (desc, astr, bstr) = s();
        panic!(
            "{} value not equal with a tolerance of {}:\n\t{}={}\n\t{}={}\n",
            desc, tolerance, astr, a, bstr, b
        );
    }
}

pub fn assert_ft_approx_eq<FT: Float + Display>(a: FT, b: FT, tolerance: FT, s: impl FnOnce() -> String) {
    if !is_ft_approx_eq(a, b, tolerance) {
        panic!(
            "{} value not equal with a tolerance of {}:\n\ta={}\n\tb={}\n",
            s(),
            tolerance,
            a,
            b
        );
    }
}

/// Timings and per-particle value ranges collected by the performance counters.
pub fn write_statistics(simulation: &CleaningSimulation) -> String {
    let mut s = String::new();

    let simulation_time = simulation
        .pcounters
        .counters
        .get("cycle")
        .map_or(0., |c| c.sum().as_secs_f64());

    writeln!(s, "simulation-time: {:.1}ms", simulation_time * 1000.).unwrap();
    writeln!(s).unwrap();

    for (label, pcounter) in simulation.pcounters.counters.iter() {
        writeln!(
            s,
            "{}: avg:{:.3}ms sum:{:.1}ms",
            label,
            pcounter.avg().as_secs_f64() * 1000.,
            pcounter.sum().as_secs_f64() * 1000.
        )
        .unwrap();
    }
    writeln!(s).unwrap();

    for (label, vcounter) in simulation.vcounters.counters.iter() {
        writeln!(
            s,
            "{}: min:{} max:{} avg:{}",
            label,
            vcounter.min(),
            vcounter.max(),
            vcounter.avg()
        )
        .unwrap();
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_parameters::{DepositInit, InjectionStrategy, RunMode};

    fn small_config() -> RunConfig {
        let mut config = RunConfig::default();
        config.particle_count = 6;
        config.seed = 42;
        config.deposit.init = DepositInit::Uniform { thickness: 0.003 };
        config
    }

    #[test]
    fn simulate_one_is_reproducible() {
        let simulation = CleaningSimulation::new(small_config()).unwrap();
        let a = simulate_one(simulation.context(), simulation.deposit(), 0, 3);
        let b = simulate_one(simulation.context(), simulation.deposit(), 0, 3);
        assert_eq!(a, b);

        let other = simulate_one(simulation.context(), simulation.deposit(), 1, 3);
        assert_eq!(other.index, 3);
    }

    #[test]
    fn particle_streams_differ() {
        use rand::RngCore;
        let context = SimulationContext::new(small_config()).unwrap();
        let a = context.particle_rng(0, 1).next_u64();
        let b = context.particle_rng(0, 2).next_u64();
        let c = context.particle_rng(1, 1).next_u64();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, context.particle_rng(0, 1).next_u64());
    }

    #[test]
    fn expired_particles_leave_the_deposit_untouched() {
        let mut config = small_config();
        config.simulation.max_steps = 1;
        let mut simulation = CleaningSimulation::new(config).unwrap();
        let before = simulation.deposit().total_mass();

        let stats = simulation.run_cycle().clone();
        assert_eq!(stats.particles_injected, 6);
        assert_eq!(stats.diagnostics.expired_step_cap, 6);
        assert_eq!(stats.total_impacts, 0);
        assert_eq!(stats.removed_mass, 0.);
        assert_eq!(simulation.deposit().total_mass(), before);
    }

    #[test]
    fn diverging_particles_are_tallied_and_discarded() {
        // gravity times dt overflows on the first step
        let mut config = small_config();
        config.simulation.gravity = -FT::MAX;
        config.simulation.dt = 10.;
        config.validate().unwrap();
        let mut simulation = CleaningSimulation::new(config).unwrap();
        let before = simulation.deposit().clone();

        let outcome = simulate_one(simulation.context(), simulation.deposit(), 0, 0);
        assert_eq!(outcome.termination, Termination::Expired(ExpiryReason::NumericalDivergence));
        assert!(outcome.is_expired());

        let stats = simulation.run();
        let cycle = &stats.cycles[0];
        assert_eq!(cycle.particles_injected, 6);
        assert_eq!(cycle.diagnostics.diverged, 6);
        assert_eq!(cycle.diagnostics.expired(), 6);
        assert_eq!(cycle.total_impacts, 0);
        assert_eq!(stats.removed_mass, 0.);
        assert_eq!(simulation.deposit(), &before);
    }

    #[test]
    fn deposit_accumulates_between_cycles() {
        let mut config = small_config();
        config.particle_count = 1;
        config.cycles = 3;
        config.simulation.max_steps = 1;
        let growth = config.deposit.growth_rate() * config.deposit.cleaning_interval();
        let density = config.deposit.bulk_density;

        let mut simulation = CleaningSimulation::new(config).unwrap();
        let area: FT = simulation.deposit().cells().iter().map(|c| c.area).sum();
        let initial = simulation.deposit().total_mass();
        let stats = simulation.run();

        assert_eq!(stats.cycles.len(), 3);
        let expected = 2. * growth * area * density;
        assert_ft_approx_eq2(stats.accumulated_mass, expected, 1e-6 * expected, || {
            ("accumulation".into(), "accumulated".into(), "expected".into())
        });
        assert_ft_approx_eq(stats.final_deposit_mass, initial + expected, 1e-6 * expected, || {
            "final mass".into()
        });
        assert!(stats.cycles[1].initial_deposit_mass > stats.cycles[0].initial_deposit_mass);
    }

    #[test]
    fn accumulation_can_be_disabled() {
        let mut config = small_config();
        config.particle_count = 1;
        config.cycles = 2;
        config.simulation.max_steps = 1;
        config.deposit.accumulate_between_cycles = false;

        let mut simulation = CleaningSimulation::new(config).unwrap();
        let stats = simulation.run();
        assert_eq!(stats.accumulated_mass, 0.);
        assert_eq!(stats.cycles[0].initial_deposit_mass, stats.cycles[1].initial_deposit_mass);
    }

    #[test]
    fn single_mode_records_one_trajectory() {
        let mut config = small_config();
        config.mode = RunMode::Single;
        config.injection = InjectionStrategy::Axial;

        let mut simulation = CleaningSimulation::new(config).unwrap();
        let stats = simulation.run();
        assert_eq!(stats.cycles[0].particles_injected, 1);

        let trajectories = simulation.trajectories();
        assert_eq!(trajectories.len(), 1);
        let samples = &trajectories[0].samples;
        assert_eq!(samples[0].time, 0.);
        assert!(samples.len() > 1);
        assert!(samples.windows(2).all(|w| w[0].time <= w[1].time));
        for sample in samples {
            assert!(sample.position.iter().all(|c| c.is_finite()));
        }
    }

    #[test]
    fn parallel_runs_are_reproducible() {
        let mut config = small_config();
        config.execution = Execution::Parallel;

        let a = CleaningSimulation::new(config.clone()).unwrap().run();
        let b = CleaningSimulation::new(config).unwrap().run();
        assert_eq!(a, b);
    }

    #[test]
    fn performance_counters_are_reported() {
        let mut config = small_config();
        config.particle_count = 2;
        let mut simulation = CleaningSimulation::new(config).unwrap();
        simulation.enable_performance_counters();
        simulation.run();

        let text = write_statistics(&simulation);
        assert!(text.contains("simulation-time"));
        assert!(text.contains("particle-steps"));
    }

    #[test]
    fn empty_counter_averages_to_zero() {
        let mut counter = Counter::<FT>::new();
        assert_eq!(counter.avg(), 0.);
        counter.add_value(2.);
        counter.add_value(4.);
        assert_eq!(counter.avg(), 3.);
        assert_eq!(Counter::<Duration>::new().avg(), Duration::ZERO);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let mut config = small_config();
        config.chamber.height = -1.;
        assert!(CleaningSimulation::new(config).is_err());
    }
}
