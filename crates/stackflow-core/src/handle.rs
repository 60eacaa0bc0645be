//! Handles onto registered resources and their attributes

use crate::deferred::{Deferred, Resolver, Settled};
use crate::error::{DeferredError, FailureReason};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Pseudo attribute that settles when the resource does, used for explicit `depends_on` edges
const READY_ATTRIBUTE: &str = "<ready>";

/// Attributes of a provisioned resource, or why it was not provisioned
pub(crate) type Outcome = Result<BTreeMap<String, String>, FailureReason>;

/// Shared, read-only view of a declared resource.
///
/// Attributes can be requested before the resource exists; each request
/// returns a [`Deferred`] that the engine resolves when provisioning returns.
#[derive(Clone)]
pub struct ResourceHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    name: String,
    ready: Deferred<()>,
    slots: Mutex<Slots>,
}

#[derive(Default)]
struct Slots {
    outcome: Option<Outcome>,
    attributes: HashMap<String, Deferred<String>>,
    waiting: Vec<(String, Resolver<String>)>,
    ready: Option<Resolver<()>>,
}

impl ResourceHandle {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (ready, resolver) = Deferred::pending(&name, READY_ATTRIBUTE);
        Self {
            inner: Arc::new(HandleInner {
                name,
                ready,
                slots: Mutex::new(Slots {
                    ready: Some(resolver),
                    ..Slots::default()
                }),
            }),
        }
    }

    /// Logical name of the declaration behind this handle
    pub fn logical_name(&self) -> &str {
        &self.inner.name
    }

    /// A named attribute of the provisioned resource
    pub fn output(&self, attribute: &str) -> Deferred<String> {
        let mut slots = self.inner.slots.lock();
        if let Some(existing) = slots.attributes.get(attribute) {
            return existing.clone();
        }

        let known = slots
            .outcome
            .as_ref()
            .map(|outcome| attribute_outcome(&self.inner.name, attribute, outcome));

        let deferred = match known {
            Some(settled) => Deferred::settled(&self.inner.name, settled),
            None => {
                let (deferred, resolver) = Deferred::pending(&self.inner.name, attribute);
                slots.waiting.push((attribute.to_string(), resolver));
                deferred
            }
        };

        slots
            .attributes
            .insert(attribute.to_string(), deferred.clone());
        deferred
    }

    /// Provider assigned resource ID
    pub fn id(&self) -> Deferred<String> {
        self.output("id")
    }

    /// Provider assigned resource name
    pub fn name(&self) -> Deferred<String> {
        self.output("name")
    }

    /// Settles (with no value) once the resource has been provisioned
    pub(crate) fn ready(&self) -> Deferred<()> {
        self.inner.ready.clone()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.slots.lock().outcome.is_some()
    }

    /// Publish the provisioning outcome to every requested attribute.
    ///
    /// # Panics
    ///
    /// Settling a handle twice violates single assignment and panics.
    pub(crate) fn settle(&self, outcome: Outcome) {
        let name = &self.inner.name;
        let mut slots = self.inner.slots.lock();
        assert!(
            slots.outcome.is_none(),
            "resource `{name}` was settled more than once"
        );

        for (attribute, resolver) in slots.waiting.drain(..) {
            resolver.resolve(attribute_outcome(name, &attribute, &outcome));
        }
        if let Some(ready) = slots.ready.take() {
            ready.resolve(
                outcome
                    .as_ref()
                    .map(|_| ())
                    .map_err(|reason| DeferredError::new(name, READY_ATTRIBUTE, reason.clone())),
            );
        }
        slots.outcome = Some(outcome);
    }
}

fn attribute_outcome(resource: &str, attribute: &str, outcome: &Outcome) -> Settled<String> {
    match outcome {
        Ok(attributes) => attributes.get(attribute).cloned().ok_or_else(|| {
            DeferredError::new(resource, attribute, FailureReason::MissingAttribute)
        }),
        Err(reason) => Err(DeferredError::new(resource, attribute, reason.clone())),
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("name", &self.inner.name)
            .field("settled", &self.is_settled())
            .finish()
    }
}
