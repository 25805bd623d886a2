use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::api::query::QueryDefinition;
use crate::config::CiCredentials;
use crate::error::SugarResult;
use crate::model::{DocumentKey, Path};
use crate::value::{FieldMap, Value};

mod memory;

pub use memory::MemoryStore;

/// Options that configure `set` style writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// When `true`, the write merges into the existing document instead of
    /// replacing it.
    pub merge: bool,
}

impl SetOptions {
    pub fn merge_all() -> Self {
        Self { merge: true }
    }

    pub fn is_merge(&self) -> bool {
        self.merge
    }
}

/// A single buffered write, as carried by batches and transactions.
#[derive(Clone, Debug)]
pub enum WriteOperation {
    Set {
        key: DocumentKey,
        data: FieldMap,
        options: SetOptions,
    },
    Update {
        key: DocumentKey,
        data: FieldMap,
    },
    Delete {
        key: DocumentKey,
    },
}

impl WriteOperation {
    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOperation::Set { key, .. } => key,
            WriteOperation::Update { key, .. } => key,
            WriteOperation::Delete { key } => key,
        }
    }
}

/// The state of a document as read from the store.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    key: DocumentKey,
    data: Option<FieldMap>,
}

impl DocumentSnapshot {
    pub fn new(key: DocumentKey, data: Option<FieldMap>) -> Self {
        Self { key, data }
    }

    /// Whether the document exists in the store.
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn data(&self) -> Option<&FieldMap> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<FieldMap> {
        self.data
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|fields| fields.get(name))
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        self.key.path()
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }
}

/// A buffered read-modify-write unit handed to transaction callbacks.
///
/// Reads go straight to the store and are recorded; writes accumulate and are
/// applied atomically when the transaction commits. The store validates the
/// recorded reads at commit time and re-runs the callback when they went
/// stale, so callbacks must be safely re-executable.
pub struct Transaction {
    store: Arc<dyn DocumentStore>,
    reads: Vec<(DocumentKey, Option<FieldMap>)>,
    writes: Vec<WriteOperation>,
}

impl Transaction {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub async fn get(&mut self, key: &DocumentKey) -> SugarResult<DocumentSnapshot> {
        let snapshot = self.store.get_document(key).await?;
        self.reads.push((key.clone(), snapshot.data().cloned()));
        Ok(snapshot)
    }

    pub fn set(&mut self, key: DocumentKey, data: FieldMap, options: SetOptions) {
        self.writes.push(WriteOperation::Set { key, data, options });
    }

    pub fn update(&mut self, key: DocumentKey, data: FieldMap) {
        self.writes.push(WriteOperation::Update { key, data });
    }

    pub fn delete(&mut self, key: DocumentKey) {
        self.writes.push(WriteOperation::Delete { key });
    }

    pub fn into_parts(self) -> (Vec<(DocumentKey, Option<FieldMap>)>, Vec<WriteOperation>) {
        (self.reads, self.writes)
    }
}

/// The callback run inside a transaction. It may be invoked multiple times
/// when the store detects a conflict, so it must not have externally visible
/// side effects outside the transaction handle.
pub type TransactionFn =
    Arc<dyn for<'t> Fn(&'t mut Transaction) -> BoxFuture<'t, SugarResult<()>> + Send + Sync>;

/// Funnels a closure into the exact shape of [`TransactionFn`], guiding
/// closure signature inference.
pub fn transaction_fn<F>(func: F) -> TransactionFn
where
    F: for<'t> Fn(&'t mut Transaction) -> BoxFuture<'t, SugarResult<()>> + Send + Sync + 'static,
{
    Arc::new(func)
}

/// The document-store capability the convenience layer is built over.
///
/// Network concerns (retries, backoff, timeouts) belong to implementations,
/// not to this layer.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn get_document(&self, key: &DocumentKey) -> SugarResult<DocumentSnapshot>;

    async fn set_document(
        &self,
        key: &DocumentKey,
        data: FieldMap,
        options: SetOptions,
    ) -> SugarResult<()>;

    /// Applies a partial update. The document must exist; each top-level key
    /// in `data` replaces the corresponding field.
    async fn update_document(&self, key: &DocumentKey, data: FieldMap) -> SugarResult<()>;

    async fn delete_document(&self, key: &DocumentKey) -> SugarResult<()>;

    /// Creates a document with a store-generated id under `collection`.
    async fn add_document(&self, collection: &Path, data: FieldMap) -> SugarResult<DocumentKey>;

    async fn run_query(&self, query: &QueryDefinition) -> SugarResult<Vec<DocumentSnapshot>>;

    /// Commits a group of writes atomically.
    async fn commit(&self, writes: Vec<WriteOperation>) -> SugarResult<()>;

    /// Runs `func` inside a transaction, retrying on conflicts.
    async fn run_transaction(&self, func: TransactionFn) -> SugarResult<()>;

    /// Bulk-deletes a collection. Not atomic; partial failure is possible.
    async fn delete_collection(
        &self,
        path: &Path,
        recursive: bool,
        credentials: &CiCredentials,
    ) -> SugarResult<()>;
}
