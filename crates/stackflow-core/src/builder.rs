//! Conditional assembly of the active declaration set
//!
//! Declarations are registered in caller order, each behind an inclusion
//! flag. Excluded declarations are remembered by name only so that a later
//! reference to them is reported as a configuration error instead of
//! silently waiting forever.

use crate::declaration::{ResourceDeclaration, ResourceKind};
use crate::error::ConfigurationError;
use crate::handle::ResourceHandle;
use crate::plan::Plan;
use std::collections::{BTreeSet, HashMap};

/// Builder for a [`Stack`]
#[derive(Debug)]
pub struct StackBuilder {
    entries: Vec<StackEntry>,
    declared: BTreeSet<String>,
    excluded: BTreeSet<String>,
    handles: HashMap<String, ResourceHandle>,
    enabled: bool,
}

impl Default for StackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StackBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            declared: BTreeSet::new(),
            excluded: BTreeSet::new(),
            handles: HashMap::new(),
            enabled: true,
        }
    }

    /// Declare a resource unconditionally.
    ///
    /// Fails with [`ConfigurationError::DisabledGroup`] inside a disabled
    /// [`group_if`](Self::group_if) scope, where no handle can be returned.
    pub fn declare<F>(
        &mut self,
        name: impl Into<String>,
        kind: ResourceKind,
        factory: F,
    ) -> Result<ResourceHandle, ConfigurationError>
    where
        F: FnOnce(ResourceDeclaration) -> ResourceDeclaration,
    {
        let name = name.into();
        if !self.enabled {
            return Err(ConfigurationError::DisabledGroup(name));
        }
        self.declare_if(true, name.clone(), kind, factory)?
            .ok_or(ConfigurationError::DisabledGroup(name))
    }

    /// Declare a resource when `flag` (and every enclosing group flag) is true.
    ///
    /// The factory receives an empty declaration carrying the logical name and
    /// kind, and is only invoked for included resources. Excluded resources
    /// yield `None`.
    pub fn declare_if<F>(
        &mut self,
        flag: bool,
        name: impl Into<String>,
        kind: ResourceKind,
        factory: F,
    ) -> Result<Option<ResourceHandle>, ConfigurationError>
    where
        F: FnOnce(ResourceDeclaration) -> ResourceDeclaration,
    {
        let name = name.into();
        if !self.declared.insert(name.clone()) {
            return Err(ConfigurationError::DuplicateName(name));
        }

        if !(flag && self.enabled) {
            tracing::debug!(resource = %name, %kind, "declaration excluded");
            self.excluded.insert(name);
            return Ok(None);
        }

        let declaration = factory(ResourceDeclaration::new(name.clone(), kind));
        let handle = self.reference(&name);
        tracing::debug!(resource = %name, %kind, "declaration included");

        self.entries.push(StackEntry {
            declaration,
            handle: handle.clone(),
        });
        Ok(Some(handle))
    }

    /// Run `scope` with every declaration inside it additionally guarded by `flag`.
    ///
    /// The closure always runs so that excluded names are still recorded.
    pub fn group_if<R>(&mut self, flag: bool, scope: impl FnOnce(&mut Self) -> R) -> R {
        let outer = self.enabled;
        self.enabled = outer && flag;
        let result = scope(self);
        self.enabled = outer;
        result
    }

    /// Handle for a logical name that may be declared later
    pub fn reference(&mut self, name: &str) -> ResourceHandle {
        self.handles
            .entry(name.to_string())
            .or_insert_with(|| ResourceHandle::new(name))
            .clone()
    }

    /// Finish assembly, validating references and acyclicity
    pub fn build(self) -> Result<Stack, ConfigurationError> {
        let stack = Stack {
            entries: self.entries,
            excluded: self.excluded,
        };
        stack.validate()?;
        tracing::debug!(
            included = stack.len(),
            excluded = stack.excluded.len(),
            "stack assembled"
        );
        Ok(stack)
    }

    #[cfg(test)]
    pub(crate) fn build_unchecked(self) -> Stack {
        Stack {
            entries: self.entries,
            excluded: self.excluded,
        }
    }
}

#[derive(Debug)]
pub(crate) struct StackEntry {
    pub(crate) declaration: ResourceDeclaration,
    pub(crate) handle: ResourceHandle,
}

/// The active declaration set, in declaration order
#[derive(Debug)]
pub struct Stack {
    pub(crate) entries: Vec<StackEntry>,
    excluded: BTreeSet<String>,
}

impl Stack {
    pub fn declarations(&self) -> impl Iterator<Item = &ResourceDeclaration> {
        self.entries.iter().map(|entry| &entry.declaration)
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDeclaration> {
        self.declarations().find(|d| d.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names declared behind a false flag
    pub fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every reference points at an included declaration and
    /// that the dependency graph is acyclic
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for declaration in self.declarations() {
            for referenced in declaration.dependencies() {
                self.check_reference(declaration.name(), &referenced)?;
            }
        }
        self.plan().map(|_| ())
    }

    pub(crate) fn check_reference(
        &self,
        owner: &str,
        referenced: &str,
    ) -> Result<(), ConfigurationError> {
        if self.contains(referenced) {
            Ok(())
        } else if self.excluded.contains(referenced) {
            Err(ConfigurationError::ExcludedReference {
                resource: owner.to_string(),
                referenced: referenced.to_string(),
            })
        } else {
            Err(ConfigurationError::UnknownReference {
                resource: owner.to_string(),
                referenced: referenced.to_string(),
            })
        }
    }

    /// Topological evaluation order
    pub fn plan(&self) -> Result<Plan, ConfigurationError> {
        Plan::for_declarations(self.declarations())
    }
}
