use crate::error::{check_len, AgentError, AgentResult};
use crate::simulation::config::AgentConfig;
use crate::simulation::models::LearnedModels;
use crate::simulation::oracle::{Mentor, Tutor, TutorFlags};
use crate::simulation::planning::{Plan, PlanningSystem};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fixed sizes of an agent's interface with its world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDims {
    pub observation: usize,
    pub belief: usize,
    pub action: usize,
    pub max_plan_length: usize,
}

impl AgentDims {
    pub fn validate(&self) -> AgentResult<()> {
        if self.observation == 0 || self.belief == 0 || self.action == 0 {
            return Err(AgentError::InvalidDimensions(format!(
                "dimensions must be positive: {self:?}"
            )));
        }
        if self.belief > self.observation {
            return Err(AgentError::InvalidDimensions(format!(
                "belief dims ({}) must not exceed observation dims ({})",
                self.belief, self.observation
            )));
        }
        if self.max_plan_length == 0 {
            return Err(AgentError::InvalidDimensions(
                "max plan length must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn unseeded_rng() -> StdRng {
    StdRng::seed_from_u64(0)
}

/// A model-based learning agent.
///
/// Each call to [`think`](Self::think) first learns from the new observation
/// (perception, then dynamics) and then decides on the next actions by
/// refining its plan population.
#[derive(Debug, Serialize, Deserialize)]
pub struct Agent {
    config: AgentConfig,
    dims: AgentDims,
    models: LearnedModels,
    planner: PlanningSystem,
    beliefs: Vec<f64>,
    anticipated_beliefs: Vec<f64>,
    actions: Vec<f64>,
    teleported: bool,
    steps: u64,
    #[serde(skip, default = "unseeded_rng")]
    rng: StdRng,
}

impl Agent {
    /// Builds a fresh agent. It starts teleported, so its first observation
    /// records no transition.
    pub fn new(
        config: AgentConfig,
        dims: AgentDims,
        mentor: Option<Box<dyn Mentor>>,
        mut rng: StdRng,
    ) -> AgentResult<Self> {
        config.validate()?;
        dims.validate()?;
        let models = LearnedModels::new(dims.observation, dims.belief, dims.action, &config, &mut rng)?;
        let planner = PlanningSystem::new(
            dims.action,
            dims.max_plan_length,
            &config.planning,
            mentor,
            &mut rng,
        )?;
        Ok(Self {
            config,
            dims,
            models,
            planner,
            beliefs: vec![0.0; dims.belief],
            anticipated_beliefs: vec![0.0; dims.belief],
            actions: vec![0.0; dims.action],
            teleported: true,
            steps: 0,
            rng,
        })
    }

    /// Rebuilds every model for a new world, keeping the config and the
    /// random stream. On error the agent is left untouched.
    pub fn reset(&mut self, mentor: Option<Box<dyn Mentor>>, dims: AgentDims) -> AgentResult<()> {
        *self = Self::new(self.config.clone(), dims, mentor, self.rng.clone())?;
        Ok(())
    }

    /// Marks a discontinuity in the world; the next observation is not
    /// treated as the consequence of the last actions.
    pub fn teleport(&mut self) {
        self.teleported = true;
    }

    /// Learns from `observations` and returns the actions to perform next.
    pub fn think(&mut self, observations: &[f64]) -> AgentResult<&[f64]> {
        check_len("observations", self.dims.observation, observations.len())?;
        if let Some((index, &value)) = observations
            .iter()
            .enumerate()
            .find(|(_, v)| !(-1.0..=1.0).contains(*v))
        {
            return Err(AgentError::ObservationOutOfRange { index, value });
        }
        self.learn_from_experience(observations)?;
        self.decide_what_to_do()?;
        self.steps += 1;
        Ok(&self.actions)
    }

    fn learn_from_experience(&mut self, observations: &[f64]) -> AgentResult<()> {
        let models = &mut self.models;
        models
            .observation
            .train_incremental(observations, &mut models.transition, &mut self.rng)?;
        models
            .observation
            .calibrate_beliefs(&mut self.anticipated_beliefs, observations)?;
        if !self.teleported {
            models.transition.train_incremental(
                &self.beliefs,
                &self.actions,
                &self.anticipated_beliefs,
                &mut self.rng,
            )?;
        }
        self.teleported = false;
        Ok(())
    }

    fn decide_what_to_do(&mut self) -> AgentResult<()> {
        std::mem::swap(&mut self.beliefs, &mut self.anticipated_beliefs);
        self.planner.advance_time();
        self.planner
            .refine_plans(&mut self.models, &self.beliefs, &mut self.rng)?;
        self.planner.choose_next_actions(
            &mut self.models,
            &self.beliefs,
            &mut self.actions,
            &mut self.rng,
        )?;
        self.models.transition.anticipate_next_beliefs_in_place(
            &self.beliefs,
            &self.actions,
            &mut self.anticipated_beliefs,
        )
    }

    /// Observations the agent expects after executing `plan` from its
    /// current beliefs.
    pub fn anticipate_observations(&mut self, plan: &Plan) -> AgentResult<Vec<f64>> {
        let end = self.models.transition.final_beliefs(&self.beliefs, plan)?;
        self.models.observation.beliefs_to_observations(&end)
    }

    pub fn set_mentor(&mut self, mentor: Option<Box<dyn Mentor>>) {
        self.planner.set_mentor(mentor);
    }

    /// Lets `tutor` stand in for the models selected by `flags`.
    pub fn set_tutor(&mut self, tutor: Option<Arc<dyn Tutor>>, flags: TutorFlags) {
        let pick = |on: bool| tutor.clone().filter(|_| on);
        self.models.observation.set_tutor(pick(flags.observation));
        self.models.transition.set_tutor(pick(flags.transition));
        self.models.contentment.set_tutor(pick(flags.contentment));
        self.planner.set_tutor(pick(flags.planning));
    }

    /// Replaces the random stream, e.g. after loading a snapshot.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Checks that a restored agent is internally consistent.
    pub fn validate_restored(&self) -> AgentResult<()> {
        self.config.validate()?;
        self.dims.validate()?;
        check_len("restored beliefs", self.dims.belief, self.beliefs.len())?;
        check_len(
            "restored anticipated beliefs",
            self.dims.belief,
            self.anticipated_beliefs.len(),
        )?;
        check_len("restored actions", self.dims.action, self.actions.len())?;
        check_len(
            "restored observation model",
            self.dims.observation,
            self.models.observation.observation_dims(),
        )?;
        check_len(
            "restored observation beliefs",
            self.dims.belief,
            self.models.observation.belief_dims(),
        )?;
        check_len(
            "restored transition model",
            self.dims.belief,
            self.models.transition.belief_dims(),
        )?;
        check_len(
            "restored transition actions",
            self.dims.action,
            self.models.transition.action_dims(),
        )?;
        check_len(
            "restored contentment model",
            self.dims.belief,
            self.models.contentment.network().input_count(),
        )?;
        self.models.check_restored()?;
        check_len("restored plan actions", self.dims.action, self.planner.action_dims())?;
        check_len(
            "restored max plan length",
            self.dims.max_plan_length,
            self.planner.max_plan_length(),
        )?;
        self.planner.validate()
    }

    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub const fn dims(&self) -> AgentDims {
        self.dims
    }

    #[must_use]
    pub fn beliefs(&self) -> &[f64] {
        &self.beliefs
    }

    /// Beliefs expected after the actions last returned by `think`.
    #[must_use]
    pub fn anticipated_beliefs(&self) -> &[f64] {
        &self.anticipated_beliefs
    }

    #[must_use]
    pub fn actions(&self) -> &[f64] {
        &self.actions
    }

    #[must_use]
    pub const fn is_teleported(&self) -> bool {
        self.teleported
    }

    /// Number of completed `think` calls.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    #[must_use]
    pub const fn models(&self) -> &LearnedModels {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut LearnedModels {
        &mut self.models
    }

    #[must_use]
    pub const fn planner(&self) -> &PlanningSystem {
        &self.planner
    }
}
