use crate::error::AgentResult;
use crate::simulation::agent::{Agent, AgentDims};
use crate::simulation::config::AgentConfig;
use crate::simulation::math::{clip, gaussian, squared_magnitude};
use crate::simulation::oracle::{Mentor, Tutor};
use crate::simulation::planning::random_action;
use crate::simulation::params::{
    CONTROL_ROTATION, DRIFT_SPEED, STEP_SIZE, SUPERVISED_STEPS, TESTING_STEPS, UNSUPERVISED_STEPS,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The agent observes its position, models it in two beliefs, and picks
/// one heading per step.
pub const PLATFORM_DIMS: AgentDims = AgentDims {
    observation: 2,
    belief: 2,
    action: 1,
    max_plan_length: 1,
};

/// Stage of a platform run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The mentor scores the agent's plans.
    Supervised,
    /// No mentor, and the controls have been rotated.
    Unsupervised,
    /// Like `Unsupervised`, but distance to the origin is scored.
    Testing,
    Finished,
}

impl Phase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Supervised => "supervised",
            Self::Unsupervised => "unsupervised",
            Self::Testing => "testing",
            Self::Finished => "finished",
        }
    }
}

/// Number of steps in each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSchedule {
    pub supervised: u64,
    pub unsupervised: u64,
    pub testing: u64,
}

impl Default for PhaseSchedule {
    fn default() -> Self {
        Self {
            supervised: SUPERVISED_STEPS,
            unsupervised: UNSUPERVISED_STEPS,
            testing: TESTING_STEPS,
        }
    }
}

impl PhaseSchedule {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.supervised + self.unsupervised + self.testing
    }

    #[must_use]
    pub const fn phase_for_step(&self, step: u64) -> Phase {
        if step < self.supervised {
            Phase::Supervised
        } else if step < self.supervised + self.unsupervised {
            Phase::Unsupervised
        } else if step < self.total() {
            Phase::Testing
        } else {
            Phase::Finished
        }
    }
}

/// A 2-D platform in `[-1, 1]²` that drifts randomly. The agent wants to
/// stay near the origin.
#[derive(Debug, Clone)]
pub struct DriftingPlatform {
    pub state: [f64; 2],
    pub control_origin: f64,
    pub drift_speed: f64,
    pub step_size: f64,
}

impl Default for DriftingPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl DriftingPlatform {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: [0.0, 0.0],
            control_origin: 0.0,
            drift_speed: DRIFT_SPEED,
            step_size: STEP_SIZE,
        }
    }

    /// Phase of `step` under the default schedule.
    #[must_use]
    pub fn phase_for_step(step: u64) -> Phase {
        PhaseSchedule::default().phase_for_step(step)
    }

    /// The agent observes its position directly.
    #[must_use]
    pub fn observations(&self) -> Vec<f64> {
        self.state.to_vec()
    }

    /// Moves the platform by `drift_speed` in a uniformly random direction.
    pub fn drift(&mut self, rng: &mut impl Rng) {
        let (dx, dy) = (gaussian(rng), gaussian(rng));
        let norm = dx.hypot(dy);
        if norm > 0.0 {
            self.state[0] += self.drift_speed * dx / norm;
            self.state[1] += self.drift_speed * dy / norm;
        }
        clip(&mut self.state, -1.0, 1.0);
    }

    /// Takes one step in the heading chosen by `actions[0]`.
    pub fn apply_action(&mut self, actions: &[f64]) {
        self.state = step_state(self.state, actions, self.control_origin, self.step_size);
    }

    pub fn rotate_controls(&mut self, angle: f64) {
        self.control_origin += angle;
    }

    #[must_use]
    pub fn distance_to_origin(&self) -> f64 {
        squared_magnitude(&self.state).sqrt()
    }
}

/// Position after stepping `step_size` along heading `2π·a + control_origin`.
#[must_use]
pub fn step_state(state: [f64; 2], actions: &[f64], control_origin: f64, step_size: f64) -> [f64; 2] {
    let heading = actions.first().copied().unwrap_or(0.0) * TAU + control_origin;
    let mut next = [
        state[0] + step_size * heading.cos(),
        state[1] + step_size * heading.sin(),
    ];
    clip(&mut next, -1.0, 1.0);
    next
}

/// `exp(-|obs|²)`: 1 at the origin, falling off with distance.
#[must_use]
pub fn closeness(observations: &[f64]) -> f64 {
    (-squared_magnitude(observations)).exp()
}

/// Prefers anticipated positions near the origin. Clones share one on/off
/// switch, so the driver can silence a mentor the agent owns.
#[derive(Debug, Clone)]
pub struct PlatformMentor {
    active: Arc<AtomicBool>,
}

impl Default for PlatformMentor {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformMentor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }
}

impl Mentor for PlatformMentor {
    fn evaluate(&mut self, anticipated_observations: &[f64]) -> Option<f64> {
        self.is_active().then(|| closeness(anticipated_observations))
    }
}

/// Ground truth for the platform, for debugging a failing agent.
#[derive(Debug, Clone)]
pub struct PlatformTutor {
    pub control_origin: f64,
    pub step_size: f64,
}

impl PlatformTutor {
    #[must_use]
    pub const fn for_platform(platform: &DriftingPlatform) -> Self {
        Self {
            control_origin: platform.control_origin,
            step_size: platform.step_size,
        }
    }
}

impl Tutor for PlatformTutor {
    fn observations_to_state(&self, observations: &[f64]) -> Vec<f64> {
        observations.to_vec()
    }

    fn state_to_observations(&self, state: &[f64]) -> Vec<f64> {
        state.to_vec()
    }

    fn transition(&self, state: &[f64], actions: &[f64], next_state: &mut [f64]) {
        let current = [
            state.first().copied().unwrap_or(0.0),
            state.get(1).copied().unwrap_or(0.0),
        ];
        let next = step_state(current, actions, self.control_origin, self.step_size);
        for (dst, src) in next_state.iter_mut().zip(next) {
            *dst = src;
        }
    }

    fn evaluate_state(&self, state: &[f64]) -> f64 {
        closeness(state)
    }

    fn choose_actions(&self, state: &[f64], actions: &mut [f64]) {
        let (x, y) = (
            state.first().copied().unwrap_or(0.0),
            state.get(1).copied().unwrap_or(0.0),
        );
        let heading = (-y).atan2(-x) - self.control_origin;
        if let Some(a) = actions.first_mut() {
            *a = heading.rem_euclid(TAU) / TAU;
        }
    }
}

/// What happened in one step of a [`PlatformRun`].
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub step: u64,
    pub phase: Phase,
    pub distance: f64,
}

/// The three-phase drifting platform scenario driving one agent.
#[derive(Debug)]
pub struct PlatformRun {
    pub platform: DriftingPlatform,
    pub agent: Agent,
    mentor: PlatformMentor,
    schedule: PhaseSchedule,
    rng: StdRng,
    seed: u64,
    baseline: Option<StdRng>,
    step: u64,
    controls_rotated: bool,
    distance_sum: f64,
    test_steps: u64,
}

impl PlatformRun {
    /// Creates a fresh agent seeded from `seed`; the world uses `seed + 1`.
    pub fn new(config: AgentConfig, schedule: PhaseSchedule, seed: u64) -> AgentResult<Self> {
        let mentor = PlatformMentor::new();
        let agent = Agent::new(
            config,
            PLATFORM_DIMS,
            Some(Box::new(mentor.clone())),
            StdRng::seed_from_u64(seed),
        )?;
        Ok(Self::with_agent(agent, mentor, schedule, seed))
    }

    /// Drives an existing agent; `mentor` should be the one it holds.
    #[must_use]
    pub fn with_agent(agent: Agent, mentor: PlatformMentor, schedule: PhaseSchedule, seed: u64) -> Self {
        Self {
            platform: DriftingPlatform::new(),
            agent,
            mentor,
            schedule,
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            seed,
            baseline: None,
            step: 0,
            controls_rotated: false,
            distance_sum: 0.0,
            test_steps: 0,
        }
    }

    /// Drives the platform with uniform random headings instead of the
    /// agent. The world sees the same drift as an agent-driven run with the
    /// same seed, so the two test scores are comparable.
    #[must_use]
    pub fn with_random_actions(mut self) -> Self {
        self.baseline = Some(StdRng::seed_from_u64(self.seed.wrapping_add(2)));
        self
    }

    #[must_use]
    pub const fn is_random_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.schedule.phase_for_step(self.step)
    }

    #[must_use]
    pub const fn schedule(&self) -> PhaseSchedule {
        self.schedule
    }

    #[must_use]
    pub const fn mentor(&self) -> &PlatformMentor {
        &self.mentor
    }

    /// Mean distance to the origin over the testing steps so far.
    #[must_use]
    pub fn mean_test_distance(&self) -> Option<f64> {
        (self.test_steps > 0).then(|| self.distance_sum / self.test_steps as f64)
    }

    /// Runs one step: drift, observe, think, act. Returns `None` once the
    /// schedule is exhausted.
    pub fn advance(&mut self) -> AgentResult<Option<StepReport>> {
        let phase = self.phase();
        if phase == Phase::Finished {
            return Ok(None);
        }
        if phase != Phase::Supervised && !self.controls_rotated {
            self.mentor.set_active(false);
            self.platform.rotate_controls(CONTROL_ROTATION);
            self.controls_rotated = true;
            log::info!("step {}: mentor removed, controls rotated", self.step);
        }

        self.platform.drift(&mut self.rng);
        if let Some(rng) = &mut self.baseline {
            let actions = random_action(PLATFORM_DIMS.action, rng);
            self.platform.apply_action(&actions);
        } else {
            let observations = self.platform.observations();
            let actions = self.agent.think(&observations)?;
            self.platform.apply_action(actions);
        }

        let distance = self.platform.distance_to_origin();
        if phase == Phase::Testing {
            self.distance_sum += distance;
            self.test_steps += 1;
        }
        let report = StepReport {
            step: self.step,
            phase,
            distance,
        };
        self.step += 1;
        if self.phase() == Phase::Finished {
            if let Some(mean) = self.mean_test_distance() {
                log::info!("testing finished: mean distance to origin {mean:.4}");
            }
        }
        Ok(Some(report))
    }

    /// Runs until the schedule is exhausted and returns the test score.
    pub fn run_to_end(&mut self) -> AgentResult<Option<f64>> {
        while self.advance()?.is_some() {}
        Ok(self.mean_test_distance())
    }
}
