//! StackFlow Core
//!
//! Declarative resource graphs with deferred values.
//!
//! A stack program registers resource declarations behind inclusion flags,
//! wires attributes of one resource into the properties of another through
//! [`Deferred`] values, and exports a map of outputs. The [`Engine`] then
//! provisions the active declarations in dependency order through an opaque
//! [`Provisioner`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 stack program                    │
//! │       (flags, declarations, output fragments)    │
//! └─────────────────┬───────────────────────────────┘
//!                   │ StackBuilder::declare_if
//! ┌─────────────────▼───────────────────────────────┐
//! │                 stackflow-core                   │
//! │  ┌────────────┐  ┌────────────┐  ┌───────────┐  │
//! │  │  Deferred  │  │   Engine   │  │  Outputs  │  │
//! │  └────────────┘  └─────┬──────┘  └───────────┘  │
//! └────────────────────────┼────────────────────────┘
//!                          │ trait Provisioner
//!                  ┌───────▼───────┐
//!                  │  provisioner  │
//!                  └───────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut builder = StackBuilder::new();
//! let suffix = Deferred::resolved("ab12cd34".to_string());
//! let storage = builder.declare_if(true, "drifttest-storage", ResourceKind::StorageAccount, |d| {
//!     d.property("accountName", suffix.concat("drifttestsa"))
//! })?;
//!
//! let mut outputs = Outputs::new();
//! if let Some(storage) = &storage {
//!     outputs.export("storageAccountName", storage.name())?;
//! }
//!
//! let deployment = Engine::new(provisioner).deploy(builder.build()?, outputs).await?;
//! ```

pub mod builder;
pub mod declaration;
pub mod deferred;
pub mod engine;
pub mod error;
pub mod handle;
pub mod output;
pub mod plan;
pub mod provider;
pub mod report;
pub mod state;

// Re-exports
pub use builder::{Stack, StackBuilder};
pub use declaration::{Input, ResourceDeclaration, ResourceKind};
pub use deferred::{Deferred, Settled};
pub use engine::Engine;
pub use error::{
    AggregateOutputError, ConfigurationError, DeferredError, FailureReason, OutputFailure,
    ProvisionError, Result, StackError,
};
pub use handle::ResourceHandle;
pub use output::Outputs;
pub use plan::{Plan, PlanSummary, PlannedStep};
pub use provider::{ProvisionRequest, ProvisionedResource, Provisioner};
pub use report::{
    Deployment, DeploymentReport, ReportSummary, ResourceOutcome, ResourceStatus,
};
pub use state::{ResourceRecord, StackState, StateManager};
