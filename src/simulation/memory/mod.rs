//! Training memory for the learned models.
//!
//! Each model keeps its own bounded buffer of recent examples and
//! trains by sampling from it uniformly.

mod ring_buffer;

pub use ring_buffer::TrainingBuffer;
