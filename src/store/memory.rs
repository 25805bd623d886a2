use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::api::query::{Cursor, FieldFilter, FilterOperator, OrderBy, OrderDirection, QueryDefinition};
use crate::config::{CiCredentials, StoreOptions};
use crate::error::{not_found, transaction_conflict, SugarResult};
use crate::model::{DocumentKey, Path};
use crate::value::{FieldMap, Value, ValueKind};

use super::{DocumentSnapshot, DocumentStore, SetOptions, Transaction, TransactionFn, WriteOperation};

const AUTO_ID_LENGTH: usize = 20;
const MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// A complete in-memory [`DocumentStore`].
///
/// Backs tests and local development: documents live in a map keyed by
/// canonical path, queries are evaluated in place and transactions use
/// optimistic read-set validation with bounded retries.
#[derive(Clone, Default)]
pub struct MemoryStore {
    options: StoreOptions,
    documents: Arc<Mutex<BTreeMap<String, FieldMap>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            options,
            documents: Arc::default(),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Number of documents currently stored, across all collections.
    pub fn document_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    fn apply_locked(
        documents: &mut BTreeMap<String, FieldMap>,
        write: &WriteOperation,
    ) -> SugarResult<()> {
        match write {
            WriteOperation::Set { key, data, options } => {
                let canonical = key.path().canonical_string().to_string();
                if options.is_merge() {
                    let mut fields = documents.remove(&canonical).unwrap_or_default();
                    deep_merge(&mut fields, data);
                    documents.insert(canonical, fields);
                } else {
                    documents.insert(canonical, data.clone());
                }
            }
            WriteOperation::Update { key, data } => {
                let canonical = key.path().canonical_string();
                let fields = documents
                    .get_mut(canonical)
                    .ok_or_else(|| not_found(format!("document `{canonical}` does not exist")))?;
                for (field, value) in data {
                    fields.insert(field.clone(), value.clone());
                }
            }
            WriteOperation::Delete { key } => {
                documents.remove(key.path().canonical_string());
            }
        }
        Ok(())
    }

    fn generate_auto_id() -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .map(char::from)
            .take(AUTO_ID_LENGTH)
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, key: &DocumentKey) -> SugarResult<DocumentSnapshot> {
        let documents = self.documents.lock().unwrap();
        let data = documents.get(key.path().canonical_string()).cloned();
        Ok(DocumentSnapshot::new(key.clone(), data))
    }

    async fn set_document(
        &self,
        key: &DocumentKey,
        data: FieldMap,
        options: SetOptions,
    ) -> SugarResult<()> {
        let mut documents = self.documents.lock().unwrap();
        Self::apply_locked(
            &mut documents,
            &WriteOperation::Set {
                key: key.clone(),
                data,
                options,
            },
        )
    }

    async fn update_document(&self, key: &DocumentKey, data: FieldMap) -> SugarResult<()> {
        let mut documents = self.documents.lock().unwrap();
        Self::apply_locked(&mut documents, &WriteOperation::Update { key: key.clone(), data })
    }

    async fn delete_document(&self, key: &DocumentKey) -> SugarResult<()> {
        let mut documents = self.documents.lock().unwrap();
        Self::apply_locked(&mut documents, &WriteOperation::Delete { key: key.clone() })
    }

    async fn add_document(&self, collection: &Path, data: FieldMap) -> SugarResult<DocumentKey> {
        let mut documents = self.documents.lock().unwrap();
        loop {
            let key = DocumentKey::from_path(collection.child(&Self::generate_auto_id()))?;
            let canonical = key.path().canonical_string();
            if documents.contains_key(canonical) {
                continue;
            }
            documents.insert(canonical.to_string(), data);
            return Ok(key);
        }
    }

    async fn run_query(&self, query: &QueryDefinition) -> SugarResult<Vec<DocumentSnapshot>> {
        let documents = self.documents.lock().unwrap();
        let mut matches = Vec::new();
        for (canonical, data) in documents.iter() {
            let path = Path::parse(canonical.clone());
            if !is_direct_child(query.path(), &path) {
                continue;
            }
            let snapshot = DocumentSnapshot::new(DocumentKey::from_path(path)?, Some(data.clone()));
            if satisfies_filters(&snapshot, query.filters()) {
                matches.push(snapshot);
            }
        }

        if let Some(order) = query.order_by() {
            matches.sort_by(|left, right| compare_snapshots(left, right, order));
        }

        if let Some(cursor) = query.start_after() {
            matches.retain(|snapshot| is_after_cursor(snapshot, cursor, query.order_by()));
        }

        if let Some(limit) = query.limit() {
            matches.truncate(limit);
        }

        Ok(matches)
    }

    async fn commit(&self, writes: Vec<WriteOperation>) -> SugarResult<()> {
        let mut documents = self.documents.lock().unwrap();
        // All-or-nothing: validate against a scratch copy, swap on success.
        let mut staged = documents.clone();
        for write in &writes {
            Self::apply_locked(&mut staged, write)?;
        }
        *documents = staged;
        Ok(())
    }

    async fn run_transaction(&self, func: TransactionFn) -> SugarResult<()> {
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let mut transaction = Transaction::new(Arc::new(self.clone()));
            func(&mut transaction).await?;
            let (reads, writes) = transaction.into_parts();

            let mut documents = self.documents.lock().unwrap();
            let clean = reads.iter().all(|(key, seen)| {
                documents.get(key.path().canonical_string()) == seen.as_ref()
            });
            if clean {
                let mut staged = documents.clone();
                for write in &writes {
                    Self::apply_locked(&mut staged, write)?;
                }
                *documents = staged;
                return Ok(());
            }
            drop(documents);
            log::debug!("transaction read set went stale, retrying (attempt {attempt})");
        }
        Err(transaction_conflict(format!(
            "transaction aborted after {MAX_TRANSACTION_ATTEMPTS} attempts"
        )))
    }

    async fn delete_collection(
        &self,
        path: &Path,
        recursive: bool,
        credentials: &CiCredentials,
    ) -> SugarResult<()> {
        if !credentials.is_complete() {
            log::debug!("bulk delete of `{path}` proceeding without CI credentials (in-memory store)");
        }
        let mut documents = self.documents.lock().unwrap();
        let prefix = format!("{path}/");
        documents.retain(|canonical, _| {
            let Some(rest) = canonical.strip_prefix(&prefix) else {
                return true;
            };
            if recursive {
                false
            } else {
                rest.contains('/')
            }
        });
        Ok(())
    }
}

fn deep_merge(fields: &mut FieldMap, incoming: &FieldMap) {
    for (key, value) in incoming {
        match (fields.get_mut(key), value.kind()) {
            (Some(existing), ValueKind::Map(incoming_map)) => {
                if let ValueKind::Map(existing_map) = existing.kind() {
                    let mut merged = existing_map.clone();
                    deep_merge(&mut merged, incoming_map);
                    *existing = Value::from_map(merged);
                } else {
                    *existing = value.clone();
                }
            }
            _ => {
                fields.insert(key.clone(), value.clone());
            }
        }
    }
}

fn is_direct_child(collection: &Path, document: &Path) -> bool {
    document.len() == collection.len() + 1
        && document.segments()[..collection.len()] == *collection.segments()
}

fn satisfies_filters(snapshot: &DocumentSnapshot, filters: &[FieldFilter]) -> bool {
    filters.iter().all(|filter| {
        match snapshot.field(filter.field()) {
            Some(value) => evaluate_filter(filter, value),
            None => false,
        }
    })
}

fn evaluate_filter(filter: &FieldFilter, value: &Value) -> bool {
    match filter.operator() {
        FilterOperator::Equal => value == filter.value(),
        FilterOperator::NotEqual => value != filter.value(),
        FilterOperator::LessThan => compare_values(value, filter.value()) == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => matches!(
            compare_values(value, filter.value()),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        FilterOperator::GreaterThan => {
            compare_values(value, filter.value()) == Some(Ordering::Greater)
        }
        FilterOperator::GreaterThanOrEqual => matches!(
            compare_values(value, filter.value()),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        FilterOperator::ArrayContains => match value.kind() {
            ValueKind::Array(values) => values.contains(filter.value()),
            _ => false,
        },
        FilterOperator::ArrayContainsAny => match (value.kind(), filter.value().kind()) {
            (ValueKind::Array(values), ValueKind::Array(needles)) => {
                needles.iter().any(|needle| values.contains(needle))
            }
            _ => false,
        },
        FilterOperator::In => match filter.value().kind() {
            ValueKind::Array(values) => values.contains(value),
            _ => false,
        },
        FilterOperator::NotIn => match filter.value().kind() {
            ValueKind::Array(values) => !values.contains(value),
            _ => false,
        },
    }
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left.kind(), right.kind()) {
        (ValueKind::Null, ValueKind::Null) => Some(Ordering::Equal),
        (ValueKind::Boolean(a), ValueKind::Boolean(b)) => Some(a.cmp(b)),
        (ValueKind::String(a), ValueKind::String(b)) => Some(a.cmp(b)),
        _ => {
            let a = left.numeric()?;
            let b = right.numeric()?;
            a.partial_cmp(&b)
        }
    }
}

fn compare_snapshots(left: &DocumentSnapshot, right: &DocumentSnapshot, order: &OrderBy) -> Ordering {
    let left_value = left.field(&order.field).cloned().unwrap_or_else(Value::null);
    let right_value = right.field(&order.field).cloned().unwrap_or_else(Value::null);
    let mut ordering = compare_values(&left_value, &right_value).unwrap_or(Ordering::Equal);
    if order.direction == OrderDirection::Descending {
        ordering = ordering.reverse();
    }
    // Documents tie-break by id so pagination order stays total.
    ordering.then_with(|| left.id().cmp(right.id()))
}

fn is_after_cursor(snapshot: &DocumentSnapshot, cursor: &Cursor, order_by: Option<&OrderBy>) -> bool {
    match cursor {
        Cursor::DocumentId(id) => snapshot.id() > id.as_str(),
        Cursor::FieldValue(value) => {
            let Some(order) = order_by else {
                return true;
            };
            let field = snapshot.field(&order.field).cloned().unwrap_or_else(Value::null);
            let mut ordering = compare_values(&field, value).unwrap_or(Ordering::Equal);
            if order.direction == OrderDirection::Descending {
                ordering = ordering.reverse();
            }
            ordering == Ordering::Greater
        }
    }
}
