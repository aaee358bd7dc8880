//! The fetch service: orchestrator state machine and host lifecycle adapter.

pub mod lifecycle;
pub mod orchestrator;

pub use lifecycle::LifecycleAdapter;
pub use orchestrator::{Collaborators, CycleOutcome, FetchOrchestrator};
