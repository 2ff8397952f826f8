pub mod agent;
pub mod config;
pub mod environment;
pub mod math;
pub mod memory;
pub mod models;
pub mod oracle;
pub mod params;
pub mod persistence;
pub mod planning;

pub use agent::{Agent, AgentDims};
pub use config::AgentConfig;
pub use oracle::{Mentor, Tutor, TutorFlags};
