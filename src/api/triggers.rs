use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::error::{bad_trigger_input, SugarError, SugarResult};
use crate::store::DocumentSnapshot;
use crate::value::FieldMap;

/// The trigger classes a document exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Create,
    Delete,
    Update,
    Write,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 4] = [
        TriggerKind::Write,
        TriggerKind::Create,
        TriggerKind::Delete,
        TriggerKind::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Create => "onCreate",
            TriggerKind::Delete => "onDelete",
            TriggerKind::Update => "onUpdate",
            TriggerKind::Write => "onWrite",
        }
    }

    /// The suffix used when deriving export names, e.g. `OnCreate`.
    pub fn export_suffix(&self) -> &'static str {
        match self {
            TriggerKind::Create => "OnCreate",
            TriggerKind::Delete => "OnDelete",
            TriggerKind::Update => "OnUpdate",
            TriggerKind::Write => "OnWrite",
        }
    }
}

impl FromStr for TriggerKind {
    type Err = SugarError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "onCreate" => Ok(TriggerKind::Create),
            "onDelete" => Ok(TriggerKind::Delete),
            "onUpdate" => Ok(TriggerKind::Update),
            "onWrite" => Ok(TriggerKind::Write),
            other => Err(bad_trigger_input(format!("unknown trigger kind `{other}`"))),
        }
    }
}

impl Display for TriggerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a write event changed the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Delete,
    Update,
}

/// The data shapes a trigger event can deliver.
///
/// Each shape has one extraction rule instead of runtime shape-sniffing: a
/// change prefers its `after` state and falls back to `before`; a snapshot
/// yields its data; a plain field map passes through.
#[derive(Clone, Debug)]
pub enum TriggerPayload {
    Snapshot(DocumentSnapshot),
    Change {
        before: Option<DocumentSnapshot>,
        after: Option<DocumentSnapshot>,
    },
    Fields(FieldMap),
}

impl TriggerPayload {
    pub fn extract_data(&self) -> Option<FieldMap> {
        match self {
            TriggerPayload::Change { after: Some(after), .. } if after.exists() => {
                after.data().cloned()
            }
            TriggerPayload::Change { before: Some(before), .. } => before.data().cloned(),
            TriggerPayload::Change { .. } => None,
            TriggerPayload::Snapshot(snapshot) => snapshot.data().cloned(),
            TriggerPayload::Fields(fields) => Some(fields.clone()),
        }
    }

    /// Classifies a change: prior state absent is a create, new state absent
    /// is a delete, both present an update. Non-change payloads have no
    /// classification.
    pub fn change_kind(&self) -> Option<ChangeKind> {
        match self {
            TriggerPayload::Change { before, after } => {
                let before_exists = before.as_ref().is_some_and(DocumentSnapshot::exists);
                let after_exists = after.as_ref().is_some_and(DocumentSnapshot::exists);
                match (before_exists, after_exists) {
                    (false, true) => Some(ChangeKind::Create),
                    (true, false) => Some(ChangeKind::Delete),
                    (true, true) => Some(ChangeKind::Update),
                    (false, false) => None,
                }
            }
            _ => None,
        }
    }
}

impl From<FieldMap> for TriggerPayload {
    fn from(fields: FieldMap) -> Self {
        TriggerPayload::Fields(fields)
    }
}

impl From<DocumentSnapshot> for TriggerPayload {
    fn from(snapshot: DocumentSnapshot) -> Self {
        TriggerPayload::Snapshot(snapshot)
    }
}

/// Event metadata handed to handlers alongside the payload.
#[derive(Clone, Debug)]
pub struct TriggerContext {
    pub timestamp: DateTime<Utc>,
    /// Wildcard parameter values supplied by the trigger runtime.
    pub params: FieldMap,
    /// Filled in by the `onWrite` wrapper so handlers can branch without
    /// re-deriving the classification.
    pub change: Option<ChangeKind>,
}

impl TriggerContext {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            params: FieldMap::new(),
            change: None,
        }
    }
}

impl Default for TriggerContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct TriggerEvent {
    pub payload: TriggerPayload,
    pub context: TriggerContext,
}

impl TriggerEvent {
    pub fn new(payload: impl Into<TriggerPayload>) -> Self {
        Self {
            payload: payload.into(),
            context: TriggerContext::new(),
        }
    }
}

/// A registered trigger handler. Handlers own their event; the dispatcher
/// clones it per handler in the list.
pub type TriggerHandler =
    Arc<dyn Fn(TriggerEvent) -> BoxFuture<'static, SugarResult<()>> + Send + Sync>;

/// The four ordered handler lists a document carries. Lists are append-only;
/// registration order is invocation order.
#[derive(Clone, Default)]
pub struct HandlerSet {
    create: Vec<TriggerHandler>,
    delete: Vec<TriggerHandler>,
    update: Vec<TriggerHandler>,
    write: Vec<TriggerHandler>,
}

impl HandlerSet {
    pub fn push(&mut self, kind: TriggerKind, handler: TriggerHandler) {
        self.list_mut(kind).push(handler);
    }

    pub fn handlers(&self, kind: TriggerKind) -> &[TriggerHandler] {
        match kind {
            TriggerKind::Create => &self.create,
            TriggerKind::Delete => &self.delete,
            TriggerKind::Update => &self.update,
            TriggerKind::Write => &self.write,
        }
    }

    pub fn is_empty(&self, kind: TriggerKind) -> bool {
        self.handlers(kind).is_empty()
    }

    fn list_mut(&mut self, kind: TriggerKind) -> &mut Vec<TriggerHandler> {
        match kind {
            TriggerKind::Create => &mut self.create,
            TriggerKind::Delete => &mut self.delete,
            TriggerKind::Update => &mut self.update,
            TriggerKind::Write => &mut self.write,
        }
    }
}

impl std::fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSet")
            .field("create", &self.create.len())
            .field("delete", &self.delete.len())
            .field("update", &self.update.len())
            .field("write", &self.write.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::DocumentKey;
    use crate::value::{field_map, Value};

    fn snapshot(path: &str, data: Option<FieldMap>) -> DocumentSnapshot {
        DocumentSnapshot::new(DocumentKey::from_string(path).unwrap(), data)
    }

    #[test]
    fn trigger_kind_parses_known_names() {
        assert_eq!("onCreate".parse::<TriggerKind>().unwrap(), TriggerKind::Create);
        let err = "onExplode".parse::<TriggerKind>().unwrap_err();
        assert_eq!(err.code, ErrorCode::BadTriggerInput);
    }

    #[test]
    fn extraction_prefers_after_then_before() {
        let before = snapshot("users/kole", Some(field_map([("v", Value::from_integer(1))])));
        let after = snapshot("users/kole", Some(field_map([("v", Value::from_integer(2))])));

        let payload = TriggerPayload::Change {
            before: Some(before.clone()),
            after: Some(after),
        };
        assert_eq!(
            payload.extract_data().unwrap().get("v"),
            Some(&Value::from_integer(2))
        );

        let payload = TriggerPayload::Change {
            before: Some(before),
            after: Some(snapshot("users/kole", None)),
        };
        assert_eq!(
            payload.extract_data().unwrap().get("v"),
            Some(&Value::from_integer(1))
        );
    }

    #[test]
    fn classification_follows_state_presence() {
        let existing = snapshot("users/kole", Some(FieldMap::new()));
        let missing = snapshot("users/kole", None);

        let created = TriggerPayload::Change {
            before: None,
            after: Some(existing.clone()),
        };
        assert_eq!(created.change_kind(), Some(ChangeKind::Create));

        let deleted = TriggerPayload::Change {
            before: Some(existing.clone()),
            after: Some(missing),
        };
        assert_eq!(deleted.change_kind(), Some(ChangeKind::Delete));

        let updated = TriggerPayload::Change {
            before: Some(existing.clone()),
            after: Some(existing.clone()),
        };
        assert_eq!(updated.change_kind(), Some(ChangeKind::Update));

        assert_eq!(TriggerPayload::Snapshot(existing).change_kind(), None);
    }
}
