//! Simulated ambient bridge.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{Bridge, Namespace};
use parking_lot::RwLock;

use crate::namespace::SimNamespace;

/// A `Bridge` made of [`SimNamespace`]s.
#[derive(Default)]
pub struct SimBridge {
    namespaces: RwLock<HashMap<String, Arc<SimNamespace>>>,
}

impl SimBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(self, namespace: SimNamespace) -> Self {
        self.install(namespace);
        self
    }

    /// Adds or replaces a namespace and returns it.
    pub fn install(&self, namespace: SimNamespace) -> Arc<SimNamespace> {
        let namespace = Arc::new(namespace);
        self.namespaces
            .write()
            .insert(namespace.name().to_string(), Arc::clone(&namespace));
        namespace
    }

    /// Removes a namespace, simulating a host that lacks the capability.
    pub fn uninstall(&self, name: &str) -> Option<Arc<SimNamespace>> {
        self.namespaces
            .write()
            .remove(name)
    }

    /// The concrete namespace, for test-side inspection.
    pub fn sim_namespace(&self, name: &str) -> Option<Arc<SimNamespace>> {
        self.namespaces
            .read()
            .get(name)
            .cloned()
    }
}

impl Bridge for SimBridge {
    fn namespace(&self, name: &str) -> Option<Arc<dyn Namespace>> {
        self.sim_namespace(name)
            .map(|namespace| namespace as Arc<dyn Namespace>)
    }

    fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .namespaces
            .read()
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for SimBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimBridge")
            .field("namespaces", &self.namespaces())
            .finish()
    }
}
