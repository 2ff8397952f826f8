//! Evolutionary plan search.
//!
//! A population of plans is refined every step by random mutation and by
//! tournaments judged on anticipated contentment. The population persists
//! between steps: plans are rotated as time passes, never rebuilt.

use super::plan::{random_action, Plan};
use crate::error::{check_len, AgentError, AgentResult};
use crate::simulation::config::PlanningConfig;
use crate::simulation::math::gaussian;
use crate::simulation::models::LearnedModels;
use crate::simulation::oracle::{Mentor, Tutor};
use crate::simulation::params::{
    CLONE_THRESHOLD, CROSSOVER_THRESHOLD, ELEMENT_SIGMA, ELEMENT_THRESHOLD, LENGTHEN_THRESHOLD,
    MAX_BLEND, MUTATE_PROB, PLAN_SIGMA, RANDOM_WINNER_PROB, SHORTEN_THRESHOLD, VECTOR_SIGMA,
    VECTOR_THRESHOLD,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanningSystem {
    plans: Vec<Plan>,
    random_plan: Plan,
    action_dims: usize,
    max_plan_length: usize,
    refinement_iters: usize,
    burn_in: usize,
    discount_factor: f64,
    exploration_rate: f64,
    #[serde(skip)]
    last_feedback: Option<f64>,
    #[serde(skip)]
    mentor: Option<Box<dyn Mentor>>,
    #[serde(skip)]
    tutor: Option<Arc<dyn Tutor>>,
}

fn jitter(value: &mut f64, sigma: f64, rng: &mut impl Rng) {
    *value = (*value + sigma * gaussian(rng)).clamp(0.0, 1.0);
}

impl PlanningSystem {
    /// Seeds a population of random plans of length `2..=max_plan_length`
    /// (1 when `max_plan_length` is 1).
    pub fn new(
        action_dims: usize,
        max_plan_length: usize,
        config: &PlanningConfig,
        mentor: Option<Box<dyn Mentor>>,
        rng: &mut impl Rng,
    ) -> AgentResult<Self> {
        if config.population_size < 2 {
            return Err(AgentError::PopulationTooSmall(config.population_size));
        }
        if action_dims == 0 || max_plan_length == 0 {
            return Err(AgentError::InvalidDimensions(format!(
                "action dims ({action_dims}) and max plan length ({max_plan_length}) must be positive"
            )));
        }
        let plans = (0..config.population_size)
            .map(|_| {
                let len = max_plan_length.min(rng.random_range(0..max_plan_length) + 2);
                Plan::random(len, action_dims, rng)
            })
            .collect();
        Ok(Self {
            plans,
            random_plan: Plan::from_steps(vec![vec![0.0; action_dims]]),
            action_dims,
            max_plan_length,
            refinement_iters: config.population_size * config.iters_per_member,
            burn_in: config.burn_in,
            discount_factor: config.discount_factor,
            exploration_rate: config.exploration_rate,
            last_feedback: None,
            mentor,
            tutor: None,
        })
    }

    #[must_use]
    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn plans_mut(&mut self) -> &mut [Plan] {
        &mut self.plans
    }

    #[must_use]
    pub const fn max_plan_length(&self) -> usize {
        self.max_plan_length
    }

    #[must_use]
    pub const fn action_dims(&self) -> usize {
        self.action_dims
    }

    /// The one-step plan holding the exploratory action of the last choice.
    #[must_use]
    pub const fn random_plan(&self) -> &Plan {
        &self.random_plan
    }

    /// Steps remaining before plans are refined and followed.
    #[must_use]
    pub const fn burn_in(&self) -> usize {
        self.burn_in
    }

    /// The most recent present mentor score, if any.
    #[must_use]
    pub const fn last_feedback(&self) -> Option<f64> {
        self.last_feedback
    }

    #[must_use]
    pub fn has_mentor(&self) -> bool {
        self.mentor.is_some()
    }

    pub fn set_mentor(&mut self, mentor: Option<Box<dyn Mentor>>) {
        self.mentor = mentor;
    }

    pub fn set_tutor(&mut self, tutor: Option<Arc<dyn Tutor>>) {
        self.tutor = tutor;
    }

    /// Checks a restored population: at least two plans, every plan
    /// `1..=max_plan_length` steps long and every step `action_dims` wide.
    pub fn validate(&self) -> AgentResult<()> {
        if self.plans.len() < 2 {
            return Err(AgentError::PopulationTooSmall(self.plans.len()));
        }
        check_len("random plan length", 1, self.random_plan.len())?;
        for plan in self.plans.iter().chain(std::iter::once(&self.random_plan)) {
            if !(1..=self.max_plan_length).contains(&plan.len()) {
                return Err(AgentError::InvalidDimensions(format!(
                    "plan length {} outside 1..={}",
                    plan.len(),
                    self.max_plan_length
                )));
            }
            for step in plan.iter() {
                check_len("plan step", self.action_dims, step.len())?;
            }
        }
        Ok(())
    }

    /// Discounted contentment at the end of `plan`.
    pub fn evaluate_plan(
        &self,
        models: &mut LearnedModels,
        beliefs: &[f64],
        plan: &Plan,
    ) -> AgentResult<f64> {
        let end = models.transition.final_beliefs(beliefs, plan)?;
        let contentment = models.contentment.evaluate(&end)?;
        let len = i32::try_from(plan.len()).unwrap_or(i32::MAX);
        Ok(contentment * self.discount_factor.powi(len))
    }

    /// Applies one random perturbation to one random plan.
    pub fn mutate(&mut self, rng: &mut impl Rng) {
        let d = rng.random::<f64>();
        let index = rng.random_range(0..self.plans.len());
        let (action_dims, max_len) = (self.action_dims, self.max_plan_length);
        let steps = self.plans[index].steps_mut();
        if steps.is_empty() {
            return;
        }
        if d < LENGTHEN_THRESHOLD {
            if steps.len() < max_len {
                let at = rng.random_range(0..=steps.len());
                steps.insert(at, random_action(action_dims, rng));
            }
        } else if d < SHORTEN_THRESHOLD {
            if steps.len() > 1 {
                let at = rng.random_range(0..steps.len());
                steps.remove(at);
            }
        } else if d < ELEMENT_THRESHOLD {
            let step = rng.random_range(0..steps.len());
            let element = rng.random_range(0..steps[step].len());
            jitter(&mut steps[step][element], ELEMENT_SIGMA, rng);
        } else if d < VECTOR_THRESHOLD {
            let step = rng.random_range(0..steps.len());
            for v in &mut steps[step] {
                jitter(v, VECTOR_SIGMA, rng);
            }
        } else {
            for v in steps.iter_mut().flatten() {
                jitter(v, PLAN_SIGMA, rng);
            }
        }
    }

    /// Overwrites plan `child` with offspring of random parents.
    pub fn replace(&mut self, child: usize, rng: &mut impl Rng) {
        let d = rng.random::<f64>();
        let n = self.plans.len();
        let offspring = if d < CLONE_THRESHOLD {
            self.plans[rng.random_range(0..n)].clone()
        } else if d < CROSSOVER_THRESHOLD {
            let mother = &self.plans[rng.random_range(0..n)];
            let father = &self.plans[rng.random_range(0..n)];
            let cut = rng.random_range(0..mother.len());
            let steps = mother.steps()[..cut]
                .iter()
                .chain(father.steps().iter().skip(cut))
                .cloned()
                .collect();
            Plan::from_steps(steps)
        } else {
            let mother = &self.plans[rng.random_range(0..n)];
            let father = &self.plans[rng.random_range(0..n)];
            let alpha = rng.random::<f64>() * MAX_BLEND;
            let steps = mother
                .iter()
                .zip(father.iter())
                .map(|(a, b)| {
                    a.iter()
                        .zip(b)
                        .map(|(x, y)| (alpha * x + (1.0 - alpha) * y).clamp(0.0, 1.0))
                        .collect()
                })
                .collect();
            Plan::from_steps(steps)
        };
        self.plans[child] = offspring;
    }

    /// Pits two random plans against each other and replaces the loser.
    pub fn tournament(
        &mut self,
        models: &mut LearnedModels,
        beliefs: &[f64],
        rng: &mut impl Rng,
    ) -> AgentResult<()> {
        let n = self.plans.len();
        let a = rng.random_range(0..n);
        let b = rng.random_range(0..n);
        let a_prevails = if rng.random::<f64>() < RANDOM_WINNER_PROB {
            true
        } else {
            let fitness_a = self.evaluate_plan(models, beliefs, &self.plans[a])?;
            let fitness_b = self.evaluate_plan(models, beliefs, &self.plans[b])?;
            fitness_a >= fitness_b
        };
        self.replace(if a_prevails { b } else { a }, rng);
        Ok(())
    }

    /// Spends the refinement budget on mutations and tournaments.
    /// Does nothing during burn-in.
    pub fn refine_plans(
        &mut self,
        models: &mut LearnedModels,
        beliefs: &[f64],
        rng: &mut impl Rng,
    ) -> AgentResult<()> {
        if self.burn_in > 0 {
            return Ok(());
        }
        for _ in 0..self.refinement_iters {
            if rng.random::<f64>() < MUTATE_PROB {
                self.mutate(rng);
            } else {
                self.tournament(models, beliefs, rng)?;
            }
        }
        Ok(())
    }

    /// Moves every plan's first action to its end.
    pub fn advance_time(&mut self) {
        for plan in &mut self.plans {
            plan.rotate();
        }
    }

    /// Index of the plan with the highest discounted contentment; ties go
    /// to the earlier plan.
    pub fn best_plan_index(
        &self,
        models: &mut LearnedModels,
        beliefs: &[f64],
    ) -> AgentResult<usize> {
        let mut best = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (i, plan) in self.plans.iter().enumerate() {
            let value = self.evaluate_plan(models, beliefs, plan)?;
            if value > best_value {
                best_value = value;
                best = i;
            }
        }
        Ok(best)
    }

    /// Writes the next actions into `actions`, consulting the mentor along
    /// the way so the contentment model keeps learning.
    pub fn choose_next_actions(
        &mut self,
        models: &mut LearnedModels,
        beliefs: &[f64],
        actions: &mut [f64],
        rng: &mut impl Rng,
    ) -> AgentResult<()> {
        check_len("chosen actions", self.action_dims, actions.len())?;
        if let Some(tutor) = &self.tutor {
            tutor.choose_actions(beliefs, actions);
            return Ok(());
        }

        let best = self.best_plan_index(models, beliefs)?;
        let contrast = {
            let pick = rng.random_range(0..self.plans.len() - 1);
            if pick >= best {
                pick + 1
            } else {
                pick
            }
        };
        if let Some(step) = self.random_plan.steps_mut().first_mut() {
            for v in step.iter_mut() {
                *v = rng.random::<f64>();
            }
        }

        if let Some(mentor) = self.mentor.as_deref_mut() {
            let mut responses = 0;
            for plan in [&self.plans[best], &self.plans[contrast], &self.random_plan] {
                if let Some(feedback) = consult(mentor, models, beliefs, plan, rng)? {
                    self.last_feedback = Some(feedback);
                    responses += 1;
                }
            }
            if responses == 0 {
                log::debug!("mentor abstained on every plan");
            }
        }

        let explore = self.burn_in > 0 || rng.random::<f64>() < self.exploration_rate;
        let chosen = if explore {
            self.random_plan.first()
        } else {
            self.plans[best].first()
        };
        if let Some(chosen) = chosen {
            actions.copy_from_slice(chosen);
        }

        if self.burn_in == 1 {
            log::info!("planning burn-in complete");
        }
        self.burn_in = self.burn_in.saturating_sub(1);
        Ok(())
    }
}

/// Asks the mentor about the end state of `plan` and trains the contentment
/// model on the answer. Returns the feedback, if any.
fn consult(
    mentor: &mut dyn Mentor,
    models: &mut LearnedModels,
    beliefs: &[f64],
    plan: &Plan,
    rng: &mut impl Rng,
) -> AgentResult<Option<f64>> {
    let anticipated = models.transition.final_beliefs(beliefs, plan)?;
    let observations = models.observation.beliefs_to_observations(&anticipated)?;
    let Some(feedback) = mentor.evaluate(&observations) else {
        return Ok(None);
    };
    if !(0.0..=1.0).contains(&feedback) {
        return Err(AgentError::FeedbackOutOfRange(feedback));
    }
    models
        .contentment
        .train_incremental(&anticipated, feedback, rng)?;
    Ok(Some(feedback))
}
