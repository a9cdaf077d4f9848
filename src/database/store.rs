use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored document: a JSON object carrying its own `id` field
pub type Document = Map<String, Value>;

/// Top-level document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Profiles,
    Posts,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Users, Collection::Profiles, Collection::Posts];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Profiles => "profiles",
            Collection::Posts => "posts",
        }
    }

    /// Top-level fields whose values must be unique across the collection
    pub fn unique_keys(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["email"],
            Collection::Profiles => &["user_id"],
            Collection::Posts => &[],
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from any `DocumentStore` implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} document not found")]
    NotFound { collection: Collection },

    #[error("duplicate value for unique key '{key}' in {collection}")]
    Duplicate { collection: Collection, key: String },

    #[error("entry with matching '{key}' already present in '{field}'")]
    DuplicateEntry { field: String, key: String },

    #[error("no entry with matching '{key}' in '{field}'")]
    EntryNotFound { field: String, key: String },

    #[error("document is not a JSON object: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Equality filter on top-level document fields; all terms must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    terms: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::eq("id", Value::String(id.into()))
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push((field.into(), value.into()));
        self
    }

    pub fn terms(&self) -> &[(String, Value)] {
        &self.terms
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.terms
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }

    /// JSON object form, used for containment queries
    pub fn to_object(&self) -> Document {
        self.terms.iter().cloned().collect()
    }
}

/// Partial update: ordered `$set`-style assignments by dotted path, plus the
/// seed document used when an upsert inserts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    set: Vec<(String, Value)>,
    set_on_insert: Document,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(path, value);
        self
    }

    pub fn push(&mut self, path: impl Into<String>, value: impl Into<Value>) {
        self.set.push((path.into(), value.into()));
    }

    pub fn on_insert(mut self, seed: Document) -> Self {
        self.set_on_insert = seed;
        self
    }

    pub fn assignments(&self) -> &[(String, Value)] {
        &self.set
    }

    pub fn seed(&self) -> &Document {
        &self.set_on_insert
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert `filter + seed + patch` when nothing matches
    pub upsert: bool,
    /// Return the document after the update instead of before it
    pub return_updated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub document: Document,
    /// True when the upsert inserted a new document
    pub inserted: bool,
}

/// Atomic mutation of an embedded array field inside one document
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayOp {
    /// Prepend `entry`; when `unique_on` is set, reject if an existing entry
    /// has the same value for that key
    PushFront {
        field: String,
        entry: Value,
        unique_on: Option<String>,
    },
    /// Remove the entry whose `key` equals `value`
    Pull {
        field: String,
        key: String,
        value: Value,
    },
}

/// Abstract document persistence consumed by the services
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError>;

    async fn find_many(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    /// Insert a new document; unique keys of the collection are enforced
    async fn insert(&self, collection: Collection, doc: Document) -> Result<Document, StoreError>;

    /// Apply `patch` to the first document matching `filter`. Returns `None`
    /// when nothing matched and `upsert` is off. The existence check and the
    /// write are atomic with respect to other calls on the same store.
    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
        options: UpdateOptions,
    ) -> Result<Option<UpdateOutcome>, StoreError>;

    /// Apply one array operation to the document matching `filter` atomically
    /// and return the updated document
    async fn modify_array(
        &self,
        collection: Collection,
        filter: &Filter,
        op: &ArrayOp,
    ) -> Result<Document, StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend label for logs and the health endpoint
    fn backend(&self) -> &'static str;
}
