mod batch;
mod collection;
mod document;
mod entity;
mod extensions;
pub(crate) mod query;
mod registry;
mod triggers;

pub use batch::{Append, Batch, BatchOptions, MAX_WRITES};
pub use collection::{
    Collection, DeleteOptions, IterateError, IterateOptions, DEFAULT_ITERATE_LIMIT,
};
pub use document::{Document, WriteOutcome, WriteParams};
pub use entity::{Entity, EntityKind};
pub use extensions::{ExtensionFn, ExtensionOutcome, ExtensionRegistry};
pub use query::{
    Cursor, FieldFilter, FilterOperator, OrderBy, OrderDirection, Query, QueryDefinition,
    QueryOptions, QuerySnapshot,
};
pub use registry::{DocumentRegistry, TriggerExport};
pub use triggers::{
    ChangeKind, HandlerSet, TriggerContext, TriggerEvent, TriggerHandler, TriggerKind,
    TriggerPayload,
};
