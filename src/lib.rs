//! dripfetch: periodic-fetch service with durable status tracking.
//!
//! A host shell wakes the service on a one-shot alarm. Each wake-up fetches
//! the companion server's info document over an unreliable link, records the
//! outcome in a small status document, and re-arms the next alarm.
//!
//! # Architecture
//!
//! - **Stores** ([`store`]): status and settings JSON documents plus the raw
//!   info payload, all written atomically
//! - **Alarms** ([`alarm`]): one-shot wake-ups, at most one pending
//! - **Transport** ([`transport`]): link probe and the info request
//! - **Service** ([`service`]): the fetch orchestrator state machine and the
//!   lifecycle adapter the host talks to

pub mod alarm;
pub mod app_dirs;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod store;
pub mod transport;

pub use command::Command;
pub use config::ServiceConfig;
pub use error::{FetchError, Result};
pub use service::{Collaborators, CycleOutcome, FetchOrchestrator, LifecycleAdapter};
