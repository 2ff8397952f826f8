//! JSON snapshots of a trained agent.
//!
//! A snapshot holds every network, training buffer and cursor, the plan
//! population, beliefs, last actions and meta-parameters. The mentor, the
//! tutor and the random stream are not stored; the caller supplies them on
//! load.

use crate::error::AgentResult;
use crate::simulation::agent::Agent;
use crate::simulation::oracle::Mentor;
use std::fs;
use std::path::Path;

/// Serializes `agent` to a JSON string.
pub fn to_json(agent: &Agent) -> AgentResult<String> {
    Ok(serde_json::to_string(agent)?)
}

/// Restores an agent from [`to_json`] output.
pub fn from_json(json: &str, mentor: Option<Box<dyn Mentor>>, seed: u64) -> AgentResult<Agent> {
    let mut agent: Agent = serde_json::from_str(json)?;
    agent.validate_restored()?;
    agent.reseed(seed);
    agent.set_mentor(mentor);
    Ok(agent)
}

pub fn save_agent(agent: &Agent, path: impl AsRef<Path>) -> AgentResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(agent)?)?;
    log::info!("Saved agent after {} steps to {:?}", agent.steps(), path);
    Ok(())
}

pub fn load_agent(
    path: impl AsRef<Path>,
    mentor: Option<Box<dyn Mentor>>,
    seed: u64,
) -> AgentResult<Agent> {
    let path = path.as_ref();
    let agent = from_json(&fs::read_to_string(path)?, mentor, seed)?;
    log::info!("Loaded agent with {} steps from {:?}", agent.steps(), path);
    Ok(agent)
}
