//! Table and store handles.
//!
//! The keyed-vs-unkeyed distinction is modeled as a closed set of store
//! variants, not a type hierarchy: a table exposes an ordered list of one
//! or two stores and all cleaning logic iterates that list uniformly.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lakeward_core::paths;
use lakeward_core::storage::StorageBackend;

/// Name of the data subtree inside a store location.
pub const DATA_DIR: &str = "data";
/// Name of the metadata subtree inside a store location.
pub const METADATA_DIR: &str = "metadata";
/// Pointer file naming the current metadata version of a store.
pub const VERSION_HINT_FILE: &str = "version-hint.text";

/// Fully qualified table identifier: `catalog.database.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdent {
    /// Catalog name.
    pub catalog: String,
    /// Database name.
    pub database: String,
    /// Table name.
    pub table: String,
}

impl TableIdent {
    /// Creates a new table identifier.
    pub fn new(
        catalog: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.database, self.table)
    }
}

/// The role a store plays within its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// The table's main committed dataset.
    Base,
    /// Pending change-log records of a keyed table, reconciled with the
    /// base store at read time.
    Change,
}

impl StoreKind {
    /// Canonical lowercase name, used in paths and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Change => "change",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical store layout of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    /// One store at the table location.
    Unkeyed,
    /// Base store at `{location}/base`, change store at `{location}/change`.
    Keyed,
}

/// Handle to one store: a data + metadata subtree with its own snapshot
/// log.
#[derive(Clone)]
pub struct StoreHandle {
    kind: StoreKind,
    location: String,
    io: Arc<dyn StorageBackend>,
}

/// Strips any `scheme://authority` prefix and trailing slashes.
///
/// Handle locations are stored as plain paths so storage keys, listing
/// prefixes, and normalized metadata references all compare directly.
fn normalize_location(location: &str) -> String {
    paths::uri_path(location).trim_end_matches('/').to_string()
}

impl StoreHandle {
    /// Creates a store handle rooted at `location`.
    ///
    /// Scheme-qualified locations are stored scheme-stripped.
    pub fn new(kind: StoreKind, location: impl Into<String>, io: Arc<dyn StorageBackend>) -> Self {
        let location = location.into();
        Self {
            kind,
            location: normalize_location(&location),
            io,
        }
    }

    /// The store's role within its table.
    #[must_use]
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Root location of this store.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Storage-access capability for this store.
    #[must_use]
    pub fn io(&self) -> &Arc<dyn StorageBackend> {
        &self.io
    }

    /// Path of the data subtree root.
    #[must_use]
    pub fn data_dir(&self) -> String {
        paths::join(&self.location, DATA_DIR)
    }

    /// Path of the metadata subtree root.
    #[must_use]
    pub fn metadata_dir(&self) -> String {
        paths::join(&self.location, METADATA_DIR)
    }

    /// Path of the version-hint pointer file.
    #[must_use]
    pub fn version_hint_path(&self) -> String {
        paths::join(&self.metadata_dir(), VERSION_HINT_FILE)
    }

    /// Path of a metadata version file.
    #[must_use]
    pub fn metadata_file_path(&self, version: u64) -> String {
        paths::join(&self.metadata_dir(), &format!("v{version}.metadata.json"))
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("kind", &self.kind)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Handle to a table: identifier, location, property map, and its stores.
///
/// Resolved fresh per cleaning cycle; never cached across cycles.
#[derive(Clone)]
pub struct TableHandle {
    ident: TableIdent,
    location: String,
    layout: TableLayout,
    properties: HashMap<String, String>,
    io: Arc<dyn StorageBackend>,
}

impl TableHandle {
    /// Creates a table handle.
    pub fn new(
        ident: TableIdent,
        location: impl Into<String>,
        layout: TableLayout,
        properties: HashMap<String, String>,
        io: Arc<dyn StorageBackend>,
    ) -> Self {
        let location = location.into();
        Self {
            ident,
            location: normalize_location(&location),
            layout,
            properties,
            io,
        }
    }

    /// The table identifier.
    #[must_use]
    pub fn ident(&self) -> &TableIdent {
        &self.ident
    }

    /// Root location of the table.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The table's current property map, as recorded by the catalog.
    #[must_use]
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Storage-access capability shared by all of the table's stores.
    #[must_use]
    pub fn io(&self) -> &Arc<dyn StorageBackend> {
        &self.io
    }

    /// Returns true for keyed (base + change) tables.
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        self.layout == TableLayout::Keyed
    }

    /// The table's base store.
    #[must_use]
    pub fn base_store(&self) -> StoreHandle {
        match self.layout {
            TableLayout::Unkeyed => {
                StoreHandle::new(StoreKind::Base, self.location.clone(), self.io.clone())
            }
            TableLayout::Keyed => StoreHandle::new(
                StoreKind::Base,
                paths::join(&self.location, "base"),
                self.io.clone(),
            ),
        }
    }

    /// The table's change store, present only for keyed tables.
    #[must_use]
    pub fn change_store(&self) -> Option<StoreHandle> {
        match self.layout {
            TableLayout::Unkeyed => None,
            TableLayout::Keyed => Some(StoreHandle::new(
                StoreKind::Change,
                paths::join(&self.location, "change"),
                self.io.clone(),
            )),
        }
    }

    /// Ordered list of the table's stores: base first, then change.
    ///
    /// Every table has at least one store; exactly one base + change pair
    /// iff keyed.
    #[must_use]
    pub fn stores(&self) -> Vec<StoreHandle> {
        let mut stores = vec![self.base_store()];
        if let Some(change) = self.change_store() {
            stores.push(change);
        }
        stores
    }
}

impl fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableHandle")
            .field("ident", &self.ident)
            .field("location", &self.location)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
