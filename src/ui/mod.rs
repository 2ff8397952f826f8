//! Terminal dashboard for a platform run.

pub mod field;
pub mod render;

use crate::simulation::environment::{Phase, PlatformRun};

/// Snapshot of the numbers shown in the HUD.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub step: u64,
    pub phase: Phase,
    pub distance: f64,
    pub mean_test_distance: Option<f64>,
    pub mentor_active: bool,
    pub last_feedback: Option<f64>,
    pub burn_in: usize,
    pub promotions: usize,
    pub transition_error: f64,
    pub random_baseline: bool,
}

impl DashboardState {
    #[must_use]
    pub fn from_run(run: &PlatformRun) -> Self {
        let models = run.agent.models();
        Self {
            step: run.step(),
            phase: run.phase(),
            distance: run.platform.distance_to_origin(),
            mean_test_distance: run.mean_test_distance(),
            mentor_active: run.mentor().is_active(),
            last_feedback: run.agent.planner().last_feedback(),
            burn_in: run.agent.planner().burn_in(),
            promotions: models.observation.promotions(),
            transition_error: models.transition.last_error(),
            random_baseline: run.is_random_baseline(),
        }
    }

    /// One-line HUD text.
    #[must_use]
    pub fn hud_line(&self) -> String {
        let mentor = if self.mentor_active { "on" } else { "off" };
        let feedback = self
            .last_feedback
            .map_or_else(|| "-".to_string(), |f| format!("{f:.2}"));
        let score = self
            .mean_test_distance
            .map_or_else(|| "-".to_string(), |d| format!("{d:.3}"));
        let driver = if self.random_baseline { "[random] " } else { "" };
        format!(
            "{}Step: {} | Phase: {} | Dist: {:.3} | Score: {} | Mentor: {} ({}) | Burn-in: {} | Promotions: {} | T-err: {:.4}",
            driver,
            self.step,
            self.phase.label(),
            self.distance,
            score,
            mentor,
            feedback,
            self.burn_in,
            self.promotions,
            self.transition_error
        )
    }
}
