//! Planning for the agent.
//!
//! This module provides:
//! - [`Plan`]: a sequence of action vectors
//! - [`PlanningSystem`]: a genetic search over a persistent plan population

mod genetic;
mod plan;

pub use genetic::PlanningSystem;
pub use plan::{random_action, Plan};
