//! buildlane build scheduling engine
//!
//! This crate turns a platform configuration and a target image name into a
//! builder workload on the orchestration platform, and tracks that workload
//! until the build reaches a terminal phase.
//!
//! ```no_run
//! use buildlane_build::{ContainerBuilderInfo, from_build, new_build};
//! use buildlane_core::{InMemoryPlatform, PlatformBuild};
//! use std::sync::Arc;
//!
//! # async fn run() -> buildlane_build::Result<()> {
//! let client = Arc::new(InMemoryPlatform::new().with_internal_registry("10.0.0.1:5000"));
//! let info = ContainerBuilderInfo::new("greetings:latest", "greetings", PlatformBuild::default());
//!
//! let build = new_build(info)
//!     .with_resource("greetings.sw.json", b"{}".to_vec())
//!     .with_client(client.clone())
//!     .schedule()
//!     .await?;
//!
//! let build = from_build(build).with_client(client).reconcile().await?;
//! println!("{}", build.phase());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod context;
pub mod driver;
pub mod error;
pub mod mount;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod secret;

pub use builder::{Builder, FromBuild, from_build, new_build};
pub use context::{BuildContext, BuildResource, ProxySettings};
pub use driver::{Assembly, JibDriver, KanikoDriver, TaskDriver};
pub use error::{BuildError, Result};
pub use progress::BuildProgress;
pub use registry::{
    ContainerBuilderInfo, HandlerRegistry, JibSchedulerHandler, KanikoSchedulerHandler,
    SchedulerHandler,
};
pub use scheduler::{Scheduler, reconcile_build};
pub use secret::{RegistrySecret, RegistrySecretCatalogue, RegistrySecretResolver, SecretMount};
