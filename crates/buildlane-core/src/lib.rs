//! buildlane core
//!
//! This crate provides the data model shared by every buildlane crate:
//! the build descriptor and its phase state machine, the strategy-specific
//! build tasks, the platform configuration, the workload shapes submitted to
//! the orchestration platform, and the `PlatformClient` abstraction.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               buildlane-build                 │
//! │   handlers / task drivers / scheduler         │
//! └──────────────────┬───────────────────────────┘
//!                    │
//! ┌──────────────────▼───────────────────────────┐
//! │               buildlane-core                  │
//! │  ┌───────────────┐  ┌──────────────────────┐ │
//! │  │  Data model   │  │ trait PlatformClient │ │
//! │  └───────────────┘  └──────────────────────┘ │
//! └───────┬──────────────────────┬───────────────┘
//!         │                      │
//! ┌───────▼───────┐      ┌───────▼───────┐
//! │   in-memory   │      │    docker     │
//! │   platform    │      │   platform    │
//! └───────────────┘      └───────────────┘
//! ```

pub mod client;
pub mod error;
pub mod memory;
pub mod model;
pub mod workload;

// Re-exports
pub use client::{PlatformClient, Resource, Submission, WorkloadPhase, WorkloadStatus};
pub use error::{PlatformError, Result};
pub use memory::InMemoryPlatform;
pub use model::*;
pub use workload::*;
