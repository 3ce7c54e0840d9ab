use ahash::{AHashMap, AHashSet};

use super::Dependency;
use crate::runtime::jit::method::MethodId;

/// Reverse index from runtime assumptions to the compiled methods relying on them.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    dependents: AHashMap<Dependency, AHashSet<MethodId>>,
    recorded: AHashMap<MethodId, Vec<Dependency>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever `method` depended on before with `dependencies`.
    pub fn record(&mut self, method: MethodId, dependencies: Vec<Dependency>) {
        self.forget(method);
        if dependencies.is_empty() {
            return;
        }
        for dependency in &dependencies {
            self.dependents
                .entry(*dependency)
                .or_default()
                .insert(method);
        }
        self.recorded.insert(method, dependencies);
    }

    pub fn forget(&mut self, method: MethodId) {
        let Some(previous) = self.recorded.remove(&method) else {
            return;
        };
        for dependency in previous {
            if let Some(methods) = self.dependents.get_mut(&dependency) {
                methods.remove(&method);
                if methods.is_empty() {
                    self.dependents.remove(&dependency);
                }
            }
        }
    }

    pub fn dependents(&self, dependency: &Dependency) -> Vec<MethodId> {
        self.dependents
            .get(dependency)
            .map(|methods| methods.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn dependencies_of(&self, method: MethodId) -> &[Dependency] {
        self.recorded
            .get(&method)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn tracked_methods(&self) -> usize {
        self.recorded.len()
    }

    pub fn clear(&mut self) {
        self.dependents.clear();
        self.recorded.clear();
    }
}
