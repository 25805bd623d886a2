use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::api::document::Document;
use crate::api::entity::{Entity, EntityKind};
use crate::api::query::{Query, QueryOptions, QuerySnapshot};
use crate::config::CiCredentials;
use crate::error::{delete_confirmation_required, SugarError, SugarResult};
use crate::model::{Path, Reference};
use crate::store::{DocumentSnapshot, DocumentStore};
use crate::util::yield_now;
use crate::value::FieldMap;

/// Default page size for [`Collection::iterate`].
pub const DEFAULT_ITERATE_LIMIT: usize = 20;

/// Options for the paginated traversal.
#[derive(Clone, Debug)]
pub struct IterateOptions {
    /// Page size; each query fetches at most this many documents.
    pub limit: usize,
    /// Order field. When set, page cursors use this field's value; otherwise
    /// documents walk in id order.
    pub order_by: Option<String>,
}

impl Default for IterateOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_ITERATE_LIMIT,
            order_by: None,
        }
    }
}

/// Why a traversal stopped early.
#[derive(Debug)]
pub enum IterateError {
    /// The task rejected; traversal stopped at `document` and no later task
    /// ran.
    Aborted {
        document: DocumentSnapshot,
        source: SugarError,
    },
    /// A page fetch or setup step failed.
    Store(SugarError),
}

impl Display for IterateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IterateError::Aborted { document, source } => {
                write!(f, "iteration aborted at `{}`: {source}", document.path())
            }
            IterateError::Store(source) => write!(f, "iteration failed: {source}"),
        }
    }
}

impl Error for IterateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            IterateError::Aborted { source, .. } => Some(source),
            IterateError::Store(source) => Some(source),
        }
    }
}

impl From<SugarError> for IterateError {
    fn from(source: SugarError) -> Self {
        IterateError::Store(source)
    }
}

/// Options for the bulk collection delete.
#[derive(Clone, Debug)]
pub struct DeleteOptions {
    /// Explicit confirmation; without it the delete fails fast.
    pub yes: bool,
    /// Delete subcollections too. Defaults to `true`.
    pub recursive: bool,
    /// CI credentials for the bulk-delete capability. Falls back to the
    /// environment when absent.
    pub credentials: Option<CiCredentials>,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            yes: false,
            recursive: true,
            credentials: None,
        }
    }
}

impl DeleteOptions {
    pub fn confirmed() -> Self {
        Self {
            yes: true,
            ..Self::default()
        }
    }
}

/// A collection addressed by an odd-depth path, possibly parameterized.
///
/// Stateless beyond its path and lazily resolved reference; every read is an
/// independent query.
#[derive(Clone)]
pub struct Collection {
    path: Path,
    store: Arc<dyn DocumentStore>,
    reference: OnceCell<Reference>,
}

impl Entity for Collection {
    const KIND: EntityKind = EntityKind::Collection;

    fn from_parts(path: Path, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            path,
            store,
            reference: OnceCell::new(),
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

impl Collection {
    pub fn new(path: &str, store: Arc<dyn DocumentStore>) -> SugarResult<Self> {
        <Self as Entity>::new(path, store)
    }

    pub fn from_path(path: Path, store: Arc<dyn DocumentStore>) -> SugarResult<Self> {
        <Self as Entity>::from_path(path, store)
    }

    /// The document that logically contains this collection.
    pub fn parent(&self) -> SugarResult<Document> {
        Document::from_path(self.path.parent(1), Arc::clone(&self.store))
    }

    /// Navigates to a document of this collection.
    pub fn doc(&self, id: &str) -> Document {
        Document::from_parts(self.path.child(id), Arc::clone(&self.store))
    }

    /// Builds a query over this collection from declarative options and
    /// executes it.
    pub async fn get(&self, options: &QueryOptions) -> SugarResult<QuerySnapshot> {
        self.query(options)?.get().await
    }

    /// Builds (but does not run) a query over this collection.
    pub fn query(&self, options: &QueryOptions) -> SugarResult<Query> {
        Query::new(Arc::clone(&self.store), self.reference()?, options)
    }

    /// Creates a document with a store-generated id, returning its reference.
    pub async fn add(&self, data: FieldMap) -> SugarResult<Reference> {
        let reference = self.reference()?;
        let key = self.store.add_document(reference.path(), data).await?;
        Ok(Reference::Document(key))
    }

    /// Walks every document of the collection in bounded pages, running
    /// `task(document, index)` strictly in order: the next task starts only
    /// after the previous one resolved. A rejecting task aborts the walk
    /// immediately — no further documents, no further pages — and surfaces
    /// the document it was processing. Control yields to the executor
    /// between pages.
    ///
    /// Resolves with the number of documents visited.
    pub async fn iterate<F, Fut>(
        &self,
        mut task: F,
        options: IterateOptions,
    ) -> Result<usize, IterateError>
    where
        F: FnMut(&DocumentSnapshot, usize) -> Fut,
        Fut: Future<Output = SugarResult<()>>,
    {
        let limit = options.limit.max(1);
        let mut cursor: Option<DocumentSnapshot> = None;
        let mut index = 0usize;
        loop {
            let mut query_options = QueryOptions::new().limit(limit as i64);
            if let Some(field) = &options.order_by {
                query_options = query_options.order_by(field);
            }
            let mut query = self.query(&query_options)?;
            if let Some(last) = &cursor {
                query.start_after(last);
            }

            let page = query.get().await?;
            if page.is_empty() {
                return Ok(index);
            }
            log::trace!(
                "iterating `{}`: page of {} starting at index {index}",
                self.path,
                page.len()
            );

            for document in page.documents() {
                if let Err(source) = task(document, index).await {
                    log::debug!(
                        "iteration of `{}` aborted at `{}`",
                        self.path,
                        document.path()
                    );
                    return Err(IterateError::Aborted {
                        document: document.clone(),
                        source,
                    });
                }
                index += 1;
            }

            if page.len() < limit {
                return Ok(index);
            }
            cursor = page.documents().last().cloned();
            yield_now().await;
        }
    }

    /// Bulk-deletes this collection through the store's delete capability,
    /// authorized by CI credentials from `options` or the environment.
    /// Requires `options.yes`; `recursive` defaults to `true`.
    ///
    /// The delete is not atomic — partial failure leaves a partially deleted
    /// collection behind.
    pub async fn delete(&self, options: DeleteOptions) -> SugarResult<()> {
        if !options.yes {
            return Err(delete_confirmation_required(format!(
                "refusing to bulk delete `{}` without the `yes` flag",
                self.path
            )));
        }
        let reference = self.reference()?;
        let credentials = options.credentials.unwrap_or_else(CiCredentials::from_env);
        log::warn!(
            "bulk deleting collection `{}` (recursive: {})",
            self.path,
            options.recursive
        );
        self.store
            .delete_collection(reference.path(), options.recursive, &credentials)
            .await
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Collection({})", self.path)
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::document::WriteParams;
    use crate::error::ErrorCode;
    use crate::store::MemoryStore;
    use crate::value::{field_map, Value};
    use std::sync::Mutex;

    fn store() -> Arc<dyn DocumentStore> {
        Arc::new(MemoryStore::new())
    }

    async fn seeded(count: usize) -> (Arc<dyn DocumentStore>, Collection) {
        let store = store();
        let collection = Collection::new("players", Arc::clone(&store)).unwrap();
        for index in 0..count {
            collection
                .doc(&format!("p{index:03}"))
                .set(
                    field_map([("rank", Value::from_integer(index as i64))]),
                    WriteParams::default(),
                )
                .await
                .unwrap();
        }
        (store, collection)
    }

    #[test]
    fn construction_validates_parity() {
        assert!(Collection::new("users", store()).is_ok());
        let err = Collection::new("users/kole", store()).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadPath);
    }

    #[tokio::test]
    async fn add_creates_a_document_with_generated_id() {
        let collection = Collection::new("users", store()).unwrap();
        let reference = collection
            .add(field_map([("n", Value::from_integer(1))]))
            .await
            .unwrap();
        assert!(reference.is_document());

        let document =
            Document::from_reference(&reference, Arc::clone(collection.store())).unwrap();
        assert!(document.get().await.unwrap().exists());
    }

    #[tokio::test]
    async fn get_runs_a_declarative_query() {
        let (_, collection) = seeded(3).await;
        let snapshot = collection
            .get(&QueryOptions::new().filter("rank", ">=", Value::from_integer(1)))
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn iterate_visits_every_document_in_order() {
        let (_, collection) = seeded(45).await;
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let visited = collection
            .iterate(
                move |document, index| {
                    let sink = Arc::clone(&sink);
                    let id = document.id().to_string();
                    async move {
                        sink.lock().unwrap().push((index, id));
                        yield_now().await;
                        Ok(())
                    }
                },
                IterateOptions {
                    limit: 10,
                    order_by: Some("rank".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(visited, 45);
        let seen = seen.lock().unwrap();
        for (position, (index, id)) in seen.iter().enumerate() {
            assert_eq!(*index, position);
            assert_eq!(id, &format!("p{position:03}"));
        }
    }

    #[tokio::test]
    async fn iterate_resolves_immediately_on_an_empty_collection() {
        let collection = Collection::new("empty", store()).unwrap();
        let visited = collection
            .iterate(
                |_document, _index| async { Ok(()) },
                IterateOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(visited, 0);
    }

    #[tokio::test]
    async fn iterate_page_boundary_uses_the_exact_limit() {
        // A collection whose size is an exact multiple of the page limit
        // needs one extra (empty) fetch to terminate.
        let (_, collection) = seeded(20).await;
        let visited = collection
            .iterate(
                |_document, _index| async { Ok(()) },
                IterateOptions {
                    limit: 10,
                    order_by: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(visited, 20);
    }

    #[tokio::test]
    async fn iterate_aborts_on_rejection_with_the_failing_document() {
        let (_, collection) = seeded(30).await;
        let calls = Arc::new(Mutex::new(0usize));

        let counter = Arc::clone(&calls);
        let err = collection
            .iterate(
                move |_document, index| {
                    let counter = Arc::clone(&counter);
                    async move {
                        *counter.lock().unwrap() += 1;
                        if index == 12 {
                            return Err(crate::error::internal("boom"));
                        }
                        Ok(())
                    }
                },
                IterateOptions {
                    limit: 10,
                    order_by: None,
                },
            )
            .await
            .unwrap_err();

        match err {
            IterateError::Aborted { document, .. } => assert_eq!(document.id(), "p012"),
            other => panic!("expected abort, got {other}"),
        }
        assert_eq!(*calls.lock().unwrap(), 13);
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let (_, collection) = seeded(2).await;
        let err = collection.delete(DeleteOptions::default()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DeleteConfirmationRequired);

        collection.delete(DeleteOptions::confirmed()).await.unwrap();
        let snapshot = collection.get(&QueryOptions::new()).await.unwrap();
        assert!(snapshot.is_empty());
    }
}
