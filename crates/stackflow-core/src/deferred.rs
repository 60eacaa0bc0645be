//! Single-assignment values that become known once provisioning completes
//!
//! A [`Deferred`] is a cheap, cloneable handle onto a value that may not be
//! known yet. Reading it never blocks a thread: dependents either chain a
//! transformation with [`Deferred::map`] or `.await` [`Deferred::settle`]
//! from async code.
//!
//! ```text
//!   suffix ──map(|s| "drifttestsa" + s)──▶ account name ──▶ storage declaration
//! ```
//!
//! Every deferred carries the set of logical resource names it was derived
//! from. The builder turns these sets into dependency edges, so no
//! introspection of property values is needed to order provisioning.

use crate::error::{DeferredError, FailureReason};
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Outcome of a deferred value
pub type Settled<T> = std::result::Result<T, DeferredError>;

/// A value that is resolved at most once, possibly in the future
pub struct Deferred<T> {
    future: Shared<BoxFuture<'static, Settled<T>>>,
    dependencies: Arc<BTreeSet<String>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            dependencies: Arc::clone(&self.dependencies),
        }
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A deferred driven by a producer that awaits nothing owned by a resource
    pub(crate) fn new<F>(producer: F) -> Self
    where
        F: Future<Output = Settled<T>> + Send + 'static,
    {
        Self::with_dependencies(producer, BTreeSet::new())
    }

    /// A value that is already known
    pub fn resolved(value: T) -> Self {
        Self::new(future::ready(Ok(value)))
    }

    /// A value that is already known to have failed
    pub fn failed(error: DeferredError) -> Self {
        Self::new(future::ready(Err(error)))
    }

    /// Create a deferred driven by an asynchronous producer.
    ///
    /// `dependencies` must name every resource whose values the producer
    /// awaits. The builder orders provisioning and detects cycles from these
    /// names only, so an omitted name hides an edge from both. Combine
    /// existing deferred values with [`Deferred::map`] or [`Deferred::zip`]
    /// where possible; they carry their dependencies along.
    ///
    /// The producer is polled lazily, the first time anything awaits the
    /// value, and runs at most once no matter how many clones observe it.
    pub fn with_dependencies<F>(producer: F, dependencies: BTreeSet<String>) -> Self
    where
        F: Future<Output = Settled<T>> + Send + 'static,
    {
        Self {
            future: producer.boxed().shared(),
            dependencies: Arc::new(dependencies),
        }
    }

    /// A settled value attributed to `resource`
    pub(crate) fn settled(resource: &str, outcome: Settled<T>) -> Self {
        Self::with_dependencies(
            future::ready(outcome),
            BTreeSet::from([resource.to_string()]),
        )
    }

    /// A value owned by `resource` that only the returned [`Resolver`] can set.
    ///
    /// If the resolver is dropped without resolving, the value settles with
    /// [`FailureReason::Unresolved`].
    pub(crate) fn pending(resource: &str, attribute: &str) -> (Self, Resolver<T>) {
        let (tx, rx) = oneshot::channel();
        let origin = (resource.to_string(), attribute.to_string());
        let producer = async move {
            rx.await.unwrap_or_else(|_| {
                Err(DeferredError::new(
                    origin.0,
                    origin.1,
                    FailureReason::Unresolved,
                ))
            })
        };
        let deferred = Self::with_dependencies(producer, BTreeSet::from([resource.to_string()]));
        (deferred, Resolver { tx })
    }

    /// Derive a new value by transforming this one once it resolves.
    ///
    /// `transform` runs exactly once, after the source resolves and before
    /// any observer of the returned value sees it. Failures pass through
    /// without invoking `transform`.
    pub fn map<U, F>(&self, transform: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let source = self.future.clone();
        Deferred {
            future: async move { source.await.map(transform) }.boxed().shared(),
            dependencies: Arc::clone(&self.dependencies),
        }
    }

    /// Combine two values; the result depends on both sources
    pub fn zip<U>(&self, other: &Deferred<U>) -> Deferred<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.future.clone();
        let right = other.future.clone();
        let dependencies = self
            .dependencies
            .union(&other.dependencies)
            .cloned()
            .collect();

        Deferred::with_dependencies(
            async move {
                let (left, right) = future::join(left, right).await;
                Ok((left?, right?))
            },
            dependencies,
        )
    }

    /// Wait for the value to settle
    pub async fn settle(&self) -> Settled<T> {
        self.future.clone().await
    }

    /// The outcome, if it is available without waiting
    pub fn peek(&self) -> Option<Settled<T>> {
        self.future.clone().now_or_never()
    }

    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }

    /// Logical names of the resources this value is derived from
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }
}

impl Deferred<String> {
    /// `prefix` followed by the resolved string
    pub fn concat(&self, prefix: impl Into<String>) -> Deferred<String> {
        let prefix = prefix.into();
        self.map(move |value| format!("{prefix}{value}"))
    }
}

impl<T> fmt::Debug for Deferred<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Deferred");
        match self.peek() {
            Some(Ok(value)) => debug.field("value", &value),
            Some(Err(error)) => debug.field("error", &error),
            None => debug.field("value", &format_args!("<pending>")),
        };
        debug
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Write side of a pending [`Deferred`].
///
/// `resolve` consumes the resolver, so a value can be assigned once only.
pub(crate) struct Resolver<T> {
    tx: oneshot::Sender<Settled<T>>,
}

impl<T> Resolver<T> {
    pub(crate) fn resolve(self, outcome: Settled<T>) {
        if self.tx.send(outcome).is_err() {
            tracing::trace!("deferred value dropped before it was resolved");
        }
    }
}
