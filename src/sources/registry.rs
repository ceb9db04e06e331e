//! Registry of available catalogs.

use std::collections::HashMap;
use std::sync::Arc;

use super::{ArchiveSource, CatalogSource, GutenbergSource, SourceError};
use crate::config::CatalogsConfig;

/// Registry for all available catalogs
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    catalogs: HashMap<String, Arc<dyn CatalogSource>>,
}

impl CatalogRegistry {
    /// Create a registry with every built-in catalog
    pub fn new(config: &CatalogsConfig) -> Self {
        let mut registry = Self::default();

        registry.register(Arc::new(ArchiveSource::new(&config.archive_base_url)));
        registry.register(Arc::new(GutenbergSource::new(&config.gutenberg_base_url)));

        registry
    }

    /// Register a new catalog
    pub fn register(&mut self, catalog: Arc<dyn CatalogSource>) {
        self.catalogs.insert(catalog.id().to_string(), catalog);
    }

    /// Get a catalog by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn CatalogSource>> {
        self.catalogs.get(id)
    }

    /// Get a catalog by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<Arc<dyn CatalogSource>, SourceError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| SourceError::InvalidRequest(format!("Catalog '{}' not found", id)))
    }

    /// Get all catalog IDs, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.catalogs.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_basic() {
        let registry = CatalogRegistry::new(&CatalogsConfig::default());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec!["archive", "gutenberg"]);
        assert_eq!(registry.get("gutenberg").unwrap().name(), "Project Gutenberg");
    }

    #[test]
    fn test_registry_unknown_catalog() {
        let registry = CatalogRegistry::new(&CatalogsConfig::default());
        assert!(matches!(
            registry.get_required("openlibrary"),
            Err(SourceError::InvalidRequest(_))
        ));
    }
}
