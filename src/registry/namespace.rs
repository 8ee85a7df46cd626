use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::Registry;
use crate::Schema;

/// Independent registries of one simulated server, keyed by namespace.
///
/// Every namespace shares the same schema but no objects.
#[derive(Debug)]
pub struct Namespaces {
    schema: Arc<Schema>,
    registries: DashMap<String, Arc<Registry>>,
}

impl Namespaces {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            registries: DashMap::new(),
        }
    }

    pub fn get(
        &self,
        namespace: &str,
    ) -> Option<Arc<Registry>> {
        self.registries.get(namespace).map(|r| r.value().clone())
    }

    pub fn get_or_create(
        &self,
        namespace: &str,
    ) -> Arc<Registry> {
        self.registries
            .entry(namespace.to_string())
            .or_insert_with(|| {
                debug!(namespace, "namespace created");
                Arc::new(Registry::new(namespace, self.schema.clone()))
            })
            .value()
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.registries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}
