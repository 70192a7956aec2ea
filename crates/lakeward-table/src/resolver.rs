//! Table resolution: the catalog collaborator boundary.
//!
//! The catalog/table-registry service owns table creation, property
//! storage, and listing. The maintenance layer only needs one capability
//! from it: resolve an identifier to a fresh [`TableHandle`]. Resolvers
//! must return a new handle per call so every cleaning cycle observes the
//! current property map and metadata pointers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use lakeward_core::error::{Error, Result};
use lakeward_core::storage::StorageBackend;

use crate::handle::{TableHandle, TableIdent, TableLayout};

/// Resolves table identifiers to handles.
#[async_trait]
pub trait TableResolver: Send + Sync + 'static {
    /// Resolves a table to a fresh handle with its current properties.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the table is unknown.
    async fn resolve(&self, ident: &TableIdent) -> Result<TableHandle>;
}

fn lock_poisoned() -> Error {
    Error::Internal {
        message: "resolver lock poisoned".into(),
    }
}

#[derive(Debug, Clone)]
struct RegisteredTable {
    location: String,
    layout: TableLayout,
    properties: HashMap<String, String>,
}

/// In-memory resolver for tests and embedded use.
///
/// All registered tables share one storage backend, mirroring a single
/// warehouse bucket/filesystem.
pub struct InMemoryResolver {
    io: Arc<dyn StorageBackend>,
    tables: RwLock<HashMap<TableIdent, RegisteredTable>>,
}

impl InMemoryResolver {
    /// Creates a resolver over the given backend.
    pub fn new(io: Arc<dyn StorageBackend>) -> Self {
        Self {
            io,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Registers (or replaces) a table.
    pub fn register(
        &self,
        ident: TableIdent,
        location: impl Into<String>,
        layout: TableLayout,
        properties: HashMap<String, String>,
    ) {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(
                ident,
                RegisteredTable {
                    location: location.into(),
                    layout,
                    properties,
                },
            );
        }
    }

    /// Updates one property on a registered table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the table is unknown.
    pub fn set_property(
        &self,
        ident: &TableIdent,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        let table = tables
            .get_mut(ident)
            .ok_or_else(|| Error::config(format!("unknown table: {ident}")))?;
        table.properties.insert(key.into(), value.into());
        Ok(())
    }
}

#[async_trait]
impl TableResolver for InMemoryResolver {
    async fn resolve(&self, ident: &TableIdent) -> Result<TableHandle> {
        let registered = {
            let tables = self.tables.read().map_err(|_| lock_poisoned())?;
            tables
                .get(ident)
                .cloned()
                .ok_or_else(|| Error::config(format!("unknown table: {ident}")))?
        };
        Ok(TableHandle::new(
            ident.clone(),
            registered.location,
            registered.layout,
            registered.properties,
            self.io.clone(),
        ))
    }
}
