use std::fmt::Formatter;
use std::sync::Arc;

use crate::error::{unsupported_query_option, SugarResult};
use crate::model::{Path, Reference};
use crate::store::{DocumentSnapshot, DocumentStore};
use crate::value::{Value, ValueKind};

/// A filtered/ordered/limited read request over one collection.
///
/// Built from a collection [`Reference`] plus a declarative [`QueryOptions`]
/// map, and consumed by [`Query::get`] — a query is single-use.
pub struct Query {
    store: Arc<dyn DocumentStore>,
    path: Path,
    filters: Vec<FieldFilter>,
    order_by: Option<OrderBy>,
    limit: Option<usize>,
    start_after_value: Option<Value>,
    cursor: Option<Cursor>,
}

impl Query {
    /// Interprets `options` into chained builder calls against the base
    /// reference. Scalar values apply as single-argument calls; arrays whose
    /// length divides by three apply as repeated filter triples; any other
    /// array spreads into one multi-argument call.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        reference: &Reference,
        options: &QueryOptions,
    ) -> SugarResult<Self> {
        let path = reference.collection_path()?.clone();
        let mut query = Self {
            store,
            path,
            filters: Vec::new(),
            order_by: None,
            limit: None,
            start_after_value: None,
            cursor: None,
        };
        for (name, value) in options.entries() {
            match value.kind() {
                ValueKind::Array(values) => {
                    if !values.is_empty() && values.len() % 3 == 0 {
                        for triple in values.chunks(3) {
                            query.apply(name, triple)?;
                        }
                    } else {
                        query.apply(name, values)?;
                    }
                }
                _ => query.apply(name, std::slice::from_ref(value))?,
            }
        }
        Ok(query)
    }

    fn apply(&mut self, name: &str, args: &[Value]) -> SugarResult<()> {
        match name {
            "where" => {
                let (field, operator, value) = match args {
                    [field, operator, value] => (field, operator, value),
                    _ => {
                        return Err(unsupported_query_option(
                            "`where` expects field/operator/value triples",
                        ))
                    }
                };
                let field = field
                    .as_str()
                    .ok_or_else(|| unsupported_query_option("`where` field must be a string"))?;
                let operator = operator
                    .as_str()
                    .ok_or_else(|| unsupported_query_option("`where` operator must be a string"))?;
                self.filters.push(FieldFilter {
                    field: field.to_string(),
                    operator: FilterOperator::parse(operator)?,
                    value: value.clone(),
                });
            }
            "orderBy" => {
                let (field, direction) = match args {
                    [field] => (field, OrderDirection::Ascending),
                    [field, direction] => {
                        let direction = direction.as_str().ok_or_else(|| {
                            unsupported_query_option("`orderBy` direction must be a string")
                        })?;
                        (field, OrderDirection::parse(direction)?)
                    }
                    _ => {
                        return Err(unsupported_query_option(
                            "`orderBy` expects a field and an optional direction",
                        ))
                    }
                };
                let field = field
                    .as_str()
                    .ok_or_else(|| unsupported_query_option("`orderBy` field must be a string"))?;
                self.order_by = Some(OrderBy {
                    field: field.to_string(),
                    direction,
                });
            }
            "limit" => {
                let limit = match args {
                    [value] => value.numeric(),
                    _ => None,
                };
                let limit = limit.filter(|n| *n >= 0.0).ok_or_else(|| {
                    unsupported_query_option("`limit` expects a non-negative number")
                })?;
                self.limit = Some(limit as usize);
            }
            "startAfter" => {
                let value = match args {
                    [value] => value.clone(),
                    _ => {
                        return Err(unsupported_query_option(
                            "`startAfter` expects a single cursor value",
                        ))
                    }
                };
                self.start_after_value = Some(value);
            }
            other => {
                return Err(unsupported_query_option(format!(
                    "unsupported query option `{other}`"
                )))
            }
        }
        Ok(())
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn order_by(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    /// Sets the cursor to after `doc`. When an order field was set its value
    /// is extracted from the document; otherwise the document id is the
    /// cursor.
    pub fn start_after(&mut self, doc: &DocumentSnapshot) {
        self.cursor = Some(match &self.order_by {
            Some(order) => {
                Cursor::FieldValue(doc.field(&order.field).cloned().unwrap_or_else(Value::null))
            }
            None => Cursor::DocumentId(doc.id().to_string()),
        });
    }

    pub fn definition(&self) -> QueryDefinition {
        let start_after = self.cursor.clone().or_else(|| {
            self.start_after_value.as_ref().map(|value| {
                if self.order_by.is_some() {
                    Cursor::FieldValue(value.clone())
                } else {
                    Cursor::DocumentId(value.path_arg().unwrap_or_default())
                }
            })
        });
        QueryDefinition {
            path: self.path.clone(),
            filters: self.filters.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            start_after,
        }
    }

    /// Executes the query. Consumes it; a query is not reused after `get`.
    pub async fn get(self) -> SugarResult<QuerySnapshot> {
        let definition = self.definition();
        let documents = self.store.run_query(&definition).await?;
        Ok(QuerySnapshot::new(documents))
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("path", &self.path)
            .field("filters", &self.filters)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .finish()
    }
}

/// Declarative query options: an ordered map of builder-call names to values.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    entries: Vec<(String, Value)>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// Appends one `where` filter triple.
    pub fn filter(self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.push(
            "where",
            Value::from_array(vec![
                Value::from_string(field),
                Value::from_string(operator),
                value.into(),
            ]),
        )
    }

    pub fn order_by(self, field: &str) -> Self {
        self.push("orderBy", Value::from_string(field))
    }

    pub fn order_by_direction(self, field: &str, direction: &str) -> Self {
        self.push(
            "orderBy",
            Value::from_array(vec![Value::from_string(field), Value::from_string(direction)]),
        )
    }

    pub fn limit(self, limit: i64) -> Self {
        self.push("limit", Value::from_integer(limit))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    field: String,
    operator: FilterOperator,
    value: Value,
}

impl FieldFilter {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

impl FilterOperator {
    pub fn parse(text: &str) -> SugarResult<Self> {
        match text {
            "==" => Ok(FilterOperator::Equal),
            "!=" => Ok(FilterOperator::NotEqual),
            "<" => Ok(FilterOperator::LessThan),
            "<=" => Ok(FilterOperator::LessThanOrEqual),
            ">" => Ok(FilterOperator::GreaterThan),
            ">=" => Ok(FilterOperator::GreaterThanOrEqual),
            "array-contains" => Ok(FilterOperator::ArrayContains),
            "array-contains-any" => Ok(FilterOperator::ArrayContainsAny),
            "in" => Ok(FilterOperator::In),
            "not-in" => Ok(FilterOperator::NotIn),
            other => Err(unsupported_query_option(format!(
                "unsupported filter operator `{other}`"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

impl OrderDirection {
    pub fn parse(text: &str) -> SugarResult<Self> {
        match text {
            "asc" | "ascending" => Ok(OrderDirection::Ascending),
            "desc" | "descending" => Ok(OrderDirection::Descending),
            other => Err(unsupported_query_option(format!(
                "unsupported order direction `{other}`"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: OrderDirection,
}

/// Cursor for `startAfter`: the order-by field value when ordering was set,
/// otherwise the document id.
#[derive(Clone, Debug, PartialEq)]
pub enum Cursor {
    FieldValue(Value),
    DocumentId(String),
}

/// The store-facing description of a query.
#[derive(Clone, Debug)]
pub struct QueryDefinition {
    path: Path,
    filters: Vec<FieldFilter>,
    order_by: Option<OrderBy>,
    limit: Option<usize>,
    start_after: Option<Cursor>,
}

impl QueryDefinition {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn order_by(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn start_after(&self) -> Option<&Cursor> {
        self.start_after.as_ref()
    }
}

/// The ordered results of executing a query.
#[derive(Clone, Debug)]
pub struct QuerySnapshot {
    documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn new(documents: Vec<DocumentSnapshot>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<DocumentSnapshot> {
        self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::Path;
    use crate::store::MemoryStore;

    fn reference(path: &str) -> Reference {
        Reference::resolve(&Path::parse(path)).unwrap()
    }

    fn build(options: &QueryOptions) -> SugarResult<Query> {
        Query::new(Arc::new(MemoryStore::new()), &reference("users"), options)
    }

    #[test]
    fn scalar_options_apply_as_single_argument_calls() {
        let query = build(&QueryOptions::new().limit(5).order_by("score")).unwrap();
        assert_eq!(query.limit(), Some(5));
        assert_eq!(query.order_by().unwrap().field, "score");
        assert_eq!(query.order_by().unwrap().direction, OrderDirection::Ascending);
    }

    #[test]
    fn triple_arrays_expand_into_repeated_filters() {
        let options = QueryOptions::new().push(
            "where",
            Value::from_array(vec![
                Value::from_string("state"),
                Value::from_string("=="),
                Value::from_string("CA"),
                Value::from_string("population"),
                Value::from_string(">"),
                Value::from_integer(1000),
            ]),
        );
        let query = build(&options).unwrap();
        assert_eq!(query.definition().filters().len(), 2);
        assert_eq!(query.definition().filters()[1].operator(), FilterOperator::GreaterThan);
    }

    #[test]
    fn other_arrays_spread_into_one_call() {
        let options = QueryOptions::new().order_by_direction("score", "desc");
        let query = build(&options).unwrap();
        assert_eq!(query.order_by().unwrap().direction, OrderDirection::Descending);
    }

    #[test]
    fn unknown_options_are_rejected() {
        let err = build(&QueryOptions::new().push("explode", Value::from_integer(1))).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedQueryOption);
    }

    #[test]
    fn document_references_cannot_seed_a_query() {
        let err = Query::new(
            Arc::new(MemoryStore::new()),
            &reference("users/kole"),
            &QueryOptions::new(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::WrongReferenceKind);
    }

    #[test]
    fn cursor_uses_order_field_when_set() {
        use crate::model::DocumentKey;
        use crate::value::field_map;

        let snapshot = DocumentSnapshot::new(
            DocumentKey::from_string("users/kole").unwrap(),
            Some(field_map([("score", Value::from_integer(42))])),
        );

        let mut query = build(&QueryOptions::new().order_by("score")).unwrap();
        query.start_after(&snapshot);
        assert_eq!(
            query.definition().start_after(),
            Some(&Cursor::FieldValue(Value::from_integer(42)))
        );

        let mut query = build(&QueryOptions::new()).unwrap();
        query.start_after(&snapshot);
        assert_eq!(
            query.definition().start_after(),
            Some(&Cursor::DocumentId("kole".to_string()))
        );
    }
}
