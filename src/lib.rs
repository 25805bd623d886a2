//! A convenience layer over a Firestore-style document store.
//!
//! The crate wraps raw resource paths in typed [`Document`] and
//! [`Collection`] values, fills `{param}` path tokens from event data,
//! accumulates bounded write [`Batch`]es, walks collections page by page
//! with [`Collection::iterate`], and carries the trigger-handler lists an
//! external serverless export step binds.
//!
//! The store itself stays behind the [`DocumentStore`] trait; [`MemoryStore`]
//! is the bundled in-memory implementation for tests and local development.
//!
//! ```
//! use std::sync::Arc;
//!
//! use firesugar::{
//!     Document, DocumentStore, Entity, MemoryStore, NameMap, TriggerPayload, WriteParams,
//! };
//! use firesugar::value::{field_map, Value};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
//! let user = Document::new("users/{userId}", store)?;
//!
//! let payload = TriggerPayload::Fields(field_map([("userId", Value::from_string("kole"))]));
//! let kole = user.instance(&payload, &NameMap::new())?;
//! kole.set(field_map([("admin", Value::from_bool(true))]), WriteParams::default()).await?;
//! assert!(kole.get().await?.exists());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod util;
pub mod value;

pub use api::{
    Append, Batch, BatchOptions, ChangeKind, Collection, Cursor, DeleteOptions, Document,
    DocumentRegistry, Entity, EntityKind, ExtensionFn, ExtensionOutcome, ExtensionRegistry,
    FieldFilter, FilterOperator, HandlerSet, IterateError, IterateOptions, OrderBy,
    OrderDirection, Query, QueryDefinition, QueryOptions, QuerySnapshot, TriggerContext,
    TriggerEvent, TriggerExport, TriggerHandler, TriggerKind, TriggerPayload, WriteOutcome,
    WriteParams, DEFAULT_ITERATE_LIMIT, MAX_WRITES,
};
pub use config::{CiCredentials, StoreOptions};
pub use error::{ErrorCode, SugarError, SugarResult};
pub use model::{DocumentKey, NameMap, Path, Reference};
pub use store::{
    transaction_fn, DocumentSnapshot, DocumentStore, MemoryStore, SetOptions, Transaction,
    TransactionFn, WriteOperation,
};
pub use value::{FieldMap, Value, ValueKind};
