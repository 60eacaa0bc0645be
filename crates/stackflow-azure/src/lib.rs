//! Azure stack program for StackFlow
//!
//! This crate holds the drift-test stack: the declarations for every Azure
//! resource it may create, and a local provisioner that previews a run
//! without touching Azure.
//!
//! # Resources
//!
//! - Network security group, virtual network, storage account
//! - App service plan, log analytics workspace
//! - Key vault, Service Bus namespace with queues (off by default)
//!
//! # Example
//!
//! ```ignore
//! use stackflow_azure::{PreviewProvisioner, drifttest};
//! use stackflow_core::{Deferred, Engine, StackBuilder};
//!
//! let mut builder = StackBuilder::new();
//! let suffix = Deferred::resolved(config.unique_suffix.clone());
//! let outputs = drifttest::declare(&config, suffix, &mut builder)?;
//!
//! let provisioner = PreviewProvisioner::new(&config.subscription_id, &config.location);
//! let deployment = Engine::new(Arc::new(provisioner))
//!     .deploy(builder.build()?, outputs)
//!     .await?;
//! ```

pub mod drifttest;
pub mod preview;

pub use drifttest::{QUEUES, QueueSpec, common_tags, declare};
pub use preview::{PreviewProvisioner, resource_type};
