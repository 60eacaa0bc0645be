//! Provisioning plan: dependency waves computed before anything runs

use crate::declaration::{ResourceDeclaration, ResourceKind};
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A declaration placed in the dependency order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedStep {
    /// Logical name
    pub name: String,

    /// Resource kind
    pub kind: ResourceKind,

    /// Logical names this step waits for
    pub dependencies: BTreeSet<String>,

    /// Zero based wave; every dependency sits in an earlier wave
    pub wave: usize,
}

/// Topological order of the active declarations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Steps ordered by wave, then by declaration order
    pub steps: Vec<PlannedStep>,
}

impl Plan {
    /// Order `declarations` into waves.
    ///
    /// Fails with [`ConfigurationError::Cycle`] naming the cycle members when
    /// no further declaration can be placed. Dependencies on names outside
    /// `declarations` are treated as already satisfied; reference checks
    /// happen in `Stack::validate`.
    pub fn for_declarations<'a>(
        declarations: impl IntoIterator<Item = &'a ResourceDeclaration>,
    ) -> Result<Self, ConfigurationError> {
        let mut remaining: Vec<(&ResourceDeclaration, BTreeSet<String>)> = declarations
            .into_iter()
            .map(|d| (d, d.dependencies()))
            .collect();
        let known: BTreeSet<String> = remaining.iter().map(|(d, _)| d.name().to_string()).collect();
        for (_, dependencies) in remaining.iter_mut() {
            dependencies.retain(|name| known.contains(name));
        }

        let mut placed: BTreeSet<String> = BTreeSet::new();
        let mut steps = Vec::with_capacity(remaining.len());
        let mut wave = 0;

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|(_, dependencies)| dependencies.is_subset(&placed));

            if ready.is_empty() {
                let graph = blocked
                    .iter()
                    .map(|(d, dependencies)| (d.name().to_string(), dependencies.clone()))
                    .collect();
                return Err(ConfigurationError::Cycle {
                    members: find_cycle(&graph),
                });
            }

            for (declaration, dependencies) in ready {
                placed.insert(declaration.name().to_string());
                steps.push(PlannedStep {
                    name: declaration.name().to_string(),
                    kind: declaration.kind(),
                    dependencies,
                    wave,
                });
            }
            remaining = blocked;
            wave += 1;
        }

        Ok(Self { steps })
    }

    /// Number of waves
    pub fn depth(&self) -> usize {
        self.steps.last().map_or(0, |step| step.wave + 1)
    }

    /// Steps in a given wave
    pub fn wave(&self, wave: usize) -> Vec<&PlannedStep> {
        self.steps.iter().filter(|s| s.wave == wave).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            resources: self.steps.len(),
            waves: self.depth(),
        }
    }
}

/// Follow blocked dependencies until a name repeats.
///
/// Every node in `graph` has at least one dependency that is also in `graph`,
/// otherwise it would have been placed, so the walk always closes a cycle.
fn find_cycle(graph: &BTreeMap<String, BTreeSet<String>>) -> Vec<String> {
    let Some(start) = graph.keys().next() else {
        return Vec::new();
    };

    let mut path: Vec<String> = Vec::new();
    let mut current = start.clone();
    loop {
        if let Some(index) = path.iter().position(|name| *name == current) {
            let mut cycle = path.split_off(index);
            cycle.push(current);
            return cycle;
        }
        path.push(current.clone());

        match graph
            .get(&current)
            .and_then(|deps| deps.iter().find(|dep| graph.contains_key(*dep)))
        {
            Some(next) => current = next.clone(),
            None => return path,
        }
    }
}

/// Summary of a plan
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub resources: usize,
    pub waves: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} resources to provision in {} waves",
            self.resources, self.waves
        )
    }
}
