use std::fmt::{Display, Formatter};
use std::sync::Arc;

use futures::future::BoxFuture;
use once_cell::sync::OnceCell;

use crate::api::batch::{Append, Batch};
use crate::api::collection::Collection;
use crate::api::entity::{Entity, EntityKind};
use crate::api::triggers::{HandlerSet, TriggerEvent, TriggerHandler, TriggerKind};
use crate::error::SugarResult;
use crate::model::{DocumentKey, Path, Reference};
use crate::store::{transaction_fn, DocumentSnapshot, DocumentStore, SetOptions, Transaction};
use crate::util::{compute_delta, DeltaOptions};
use crate::value::{FieldMap, Value};

/// How a write was carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The operation executed (or an auto-commit flushed it) against the
    /// store.
    Committed,
    /// The operation was recorded on a batch; `n` writes are pending there.
    /// This is not a completion guarantee.
    Queued(usize),
}

/// Options for a single document write.
#[derive(Clone, Copy, Default)]
pub struct WriteParams<'b> {
    pub set: SetOptions,
    /// When present, the operation is appended to this batch instead of
    /// executing immediately.
    pub batch: Option<&'b Batch>,
}

impl<'b> WriteParams<'b> {
    pub fn merge() -> Self {
        Self {
            set: SetOptions::merge_all(),
            ..Self::default()
        }
    }

    pub fn batched(batch: &'b Batch) -> Self {
        Self {
            batch: Some(batch),
            ..Self::default()
        }
    }
}

/// A document addressed by an even-depth path, possibly parameterized.
///
/// Carries the four ordered trigger-handler lists the external export step
/// reads, and every read/write convenience the layer offers.
///
/// ```
/// # use std::sync::Arc;
/// # use firesugar::{Document, Entity, MemoryStore};
/// # let store: Arc<dyn firesugar::DocumentStore> = Arc::new(MemoryStore::new());
/// let character = Document::new("users/{userId}/characters/{characterId}", store)?;
/// assert!(character.path().has_params());
/// # Ok::<(), firesugar::SugarError>(())
/// ```
#[derive(Clone)]
pub struct Document {
    path: Path,
    store: Arc<dyn DocumentStore>,
    reference: OnceCell<Reference>,
    handlers: HandlerSet,
}

impl Entity for Document {
    const KIND: EntityKind = EntityKind::Document;

    fn from_parts(path: Path, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            path,
            store,
            reference: OnceCell::new(),
            handlers: HandlerSet::default(),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    fn reference_cell(&self) -> &OnceCell<Reference> {
        &self.reference
    }
}

impl Document {
    pub fn new(path: &str, store: Arc<dyn DocumentStore>) -> SugarResult<Self> {
        <Self as Entity>::new(path, store)
    }

    pub fn from_path(path: Path, store: Arc<dyn DocumentStore>) -> SugarResult<Self> {
        <Self as Entity>::from_path(path, store)
    }

    /// Rebuilds a document from an already-resolved reference, caching it.
    /// Fails with `WrongReferenceKind` unless the handle is document-kind.
    pub fn from_reference(
        reference: &Reference,
        store: Arc<dyn DocumentStore>,
    ) -> SugarResult<Self> {
        let key = reference.document_key()?;
        let document = Document::from_parts(key.into_path(), store);
        let _ = document.reference.set(reference.clone());
        Ok(document)
    }

    /// Extends the path directly. Parity is not re-checked here; callers
    /// appending an odd number of segments get a document whose reference
    /// will not resolve.
    pub fn child(&self, relative: &str) -> Document {
        Document::from_parts(self.path.child(relative), Arc::clone(&self.store))
    }

    /// The collection containing this document.
    pub fn parent(&self) -> SugarResult<Collection> {
        Collection::from_path(self.path.parent(1), Arc::clone(&self.store))
    }

    /// A subcollection rooted at this document.
    pub fn collection(&self, relative: &str) -> SugarResult<Collection> {
        Collection::from_path(self.path.child(relative), Arc::clone(&self.store))
    }

    fn document_key(&self) -> SugarResult<DocumentKey> {
        self.reference()?.document_key()
    }

    pub fn on_create<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(TriggerEvent) -> BoxFuture<'static, SugarResult<()>> + Send + Sync + 'static,
    {
        self.handlers.push(TriggerKind::Create, Arc::new(handler));
        self
    }

    pub fn on_delete<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(TriggerEvent) -> BoxFuture<'static, SugarResult<()>> + Send + Sync + 'static,
    {
        self.handlers.push(TriggerKind::Delete, Arc::new(handler));
        self
    }

    pub fn on_update<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(TriggerEvent) -> BoxFuture<'static, SugarResult<()>> + Send + Sync + 'static,
    {
        self.handlers.push(TriggerKind::Update, Arc::new(handler));
        self
    }

    /// Registers a write handler. The handler is wrapped so the event context
    /// arrives annotated with the change classification (create, delete or
    /// update) before the handler runs.
    pub fn on_write<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(TriggerEvent) -> BoxFuture<'static, SugarResult<()>> + Send + Sync + 'static,
    {
        let inner: TriggerHandler = Arc::new(handler);
        let wrapped: TriggerHandler = Arc::new(move |event: TriggerEvent| {
            let change = event.payload.change_kind();
            let mut annotated = event;
            annotated.context.change = change;
            inner(annotated)
        });
        self.handlers.push(TriggerKind::Write, wrapped);
        self
    }

    /// The ordered handlers registered for `kind`, as read by the export
    /// step.
    pub fn handlers(&self, kind: TriggerKind) -> &[TriggerHandler] {
        self.handlers.handlers(kind)
    }

    pub fn handler_set(&self) -> &HandlerSet {
        &self.handlers
    }

    pub async fn get(&self) -> SugarResult<DocumentSnapshot> {
        self.store.get_document(&self.document_key()?).await
    }

    /// Writes `data` at this path, or appends the write to the batch named in
    /// `params`.
    pub async fn set(&self, data: FieldMap, params: WriteParams<'_>) -> SugarResult<WriteOutcome> {
        let key = self.document_key()?;
        match params.batch {
            Some(batch) => Ok(batch.set(&key, data, params.set).await?.into()),
            None => {
                self.store.set_document(&key, data, params.set).await?;
                Ok(WriteOutcome::Committed)
            }
        }
    }

    pub async fn update(
        &self,
        data: FieldMap,
        params: WriteParams<'_>,
    ) -> SugarResult<WriteOutcome> {
        let key = self.document_key()?;
        match params.batch {
            Some(batch) => Ok(batch.update(&key, data).await?.into()),
            None => {
                self.store.update_document(&key, data).await?;
                Ok(WriteOutcome::Committed)
            }
        }
    }

    pub async fn delete(&self, params: WriteParams<'_>) -> SugarResult<WriteOutcome> {
        let key = self.document_key()?;
        match params.batch {
            Some(batch) => Ok(batch.delete(&key).await?.into()),
            None => {
                self.store.delete_document(&key).await?;
                Ok(WriteOutcome::Committed)
            }
        }
    }

    /// Runs `func` inside a store transaction, handing it this document's
    /// current snapshot alongside the transaction handle and reference.
    ///
    /// The store may re-run `func` on write conflicts, so it must be safely
    /// re-executable and side-effect free outside the transaction handle.
    pub async fn transaction<F>(&self, func: F) -> SugarResult<()>
    where
        F: for<'t> Fn(
                &'t mut Transaction,
                DocumentSnapshot,
                Reference,
            ) -> BoxFuture<'t, SugarResult<()>>
            + Send
            + Sync
            + 'static,
    {
        let key = self.document_key()?;
        let reference = self.reference()?.clone();
        let func = Arc::new(func);
        self.store
            .run_transaction(transaction_fn(move |transaction| {
                let func = Arc::clone(&func);
                let key = key.clone();
                let reference = reference.clone();
                Box::pin(async move {
                    let snapshot = transaction.get(&key).await?;
                    func(transaction, snapshot, reference).await
                })
            }))
            .await
    }

    /// Adds `delta` to one field, creating the document when absent.
    pub async fn increment_field(
        &self,
        field: &str,
        delta: impl Into<Value>,
    ) -> SugarResult<()> {
        self.increment_fields(FieldMap::from([(field.to_string(), delta.into())]))
            .await
    }

    /// Adds every entry of `delta` to this document transactionally. An
    /// existing document gets an update merged via the additive-delta rules;
    /// a missing one is seeded with the raw delta through a merge set.
    pub async fn increment_fields(&self, delta: FieldMap) -> SugarResult<()> {
        self.transaction(move |transaction, snapshot, reference| {
            let delta = delta.clone();
            Box::pin(async move {
                let key = reference.document_key()?;
                match snapshot.data() {
                    Some(base) => {
                        let merged = compute_delta(&delta, base, DeltaOptions::default());
                        transaction.update(key, merged);
                    }
                    None => transaction.set(key, delta, SetOptions::merge_all()),
                }
                Ok(())
            })
        })
        .await
    }
}

impl From<Append> for WriteOutcome {
    fn from(append: Append) -> Self {
        match append {
            Append::Queued(pending) => WriteOutcome::Queued(pending),
            Append::Committed => WriteOutcome::Committed,
        }
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Document({})", self.path)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("path", &self.path)
            .field("handlers", &self.handlers)
            .finish()
    }
}
