use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::document::Document;
use crate::api::entity::Entity;
use crate::api::triggers::{TriggerEvent, TriggerHandler, TriggerKind};
use crate::error::SugarResult;
use crate::model::Path;
use crate::store::DocumentStore;

/// A caller-owned registry of named documents.
///
/// The lifecycle is explicit: build the registry, register documents and
/// their handlers, then hand [`DocumentRegistry::exports`] to the trigger
/// glue. No module-level state is involved.
#[derive(Default)]
pub struct DocumentRegistry {
    documents: BTreeMap<String, Document>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates one document per `(name, path)` pair.
    pub fn create_documents<'a, I>(
        &mut self,
        paths: I,
        store: &Arc<dyn DocumentStore>,
    ) -> SugarResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, path) in paths {
            let document = Document::new(path, Arc::clone(store))?;
            self.documents.insert(name.to_string(), document);
        }
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, document: Document) {
        self.documents.insert(name.into(), document);
    }

    pub fn get(&self, name: &str) -> Option<&Document> {
        self.documents.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Document> {
        self.documents.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Document)> {
        self.documents
            .iter()
            .map(|(name, document)| (name.as_str(), document))
    }

    /// Produces one export per non-empty handler list per document, named
    /// `{key}{Trigger}` (e.g. `userOnCreate`), for the external trigger
    /// registration step to bind.
    pub fn exports(&self) -> Vec<TriggerExport> {
        let mut exports = Vec::new();
        for (key, document) in &self.documents {
            for kind in TriggerKind::ALL {
                let handlers = document.handlers(kind);
                if handlers.is_empty() {
                    continue;
                }
                exports.push(TriggerExport {
                    name: format!("{key}{}", kind.export_suffix()),
                    path: document.path().clone(),
                    kind,
                    handlers: handlers.to_vec(),
                });
            }
        }
        log::debug!("exporting {} trigger bindings", exports.len());
        exports
    }
}

/// One path-scoped trigger binding: the derived export name plus the ordered
/// handlers to run when the trigger fires.
pub struct TriggerExport {
    pub name: String,
    pub path: Path,
    pub kind: TriggerKind,
    handlers: Vec<TriggerHandler>,
}

impl TriggerExport {
    pub fn handlers(&self) -> &[TriggerHandler] {
        &self.handlers
    }

    /// Runs every handler in registration order, stopping at the first
    /// failure.
    pub async fn dispatch(&self, event: &TriggerEvent) -> SugarResult<()> {
        for handler in &self.handlers {
            handler(event.clone()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::triggers::TriggerPayload;
    use crate::store::MemoryStore;
    use crate::value::{field_map, FieldMap, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn store() -> Arc<dyn DocumentStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn create_documents_builds_the_registry() {
        let store = store();
        let mut registry = DocumentRegistry::new();
        registry
            .create_documents(
                [
                    ("user", "users/{userId}"),
                    ("achievement", "users/{userId}/achievements/{achievementId}"),
                ],
                &store,
            )
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(*registry.get("user").unwrap().path(), "users/{userId}");
    }

    #[test]
    fn exports_cover_only_non_empty_handler_lists() {
        let store = store();
        let mut registry = DocumentRegistry::new();
        registry
            .create_documents([("user", "users/{userId}")], &store)
            .unwrap();

        registry.get_mut("user").unwrap().on_create(|_event| {
            Box::pin(async { Ok(()) })
        });

        let exports = registry.exports();
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].name, "userOnCreate");
        assert_eq!(exports[0].kind, TriggerKind::Create);
        assert_eq!(exports[0].path, "users/{userId}");
        assert_eq!(exports[0].handlers().len(), 1);
    }

    #[tokio::test]
    async fn dispatch_runs_handlers_in_registration_order() {
        let store = store();
        let mut registry = DocumentRegistry::new();
        registry
            .create_documents([("user", "users/{userId}")], &store)
            .unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&order);
        let second = Arc::clone(&order);
        registry
            .get_mut("user")
            .unwrap()
            .on_delete(move |_event| {
                let order = Arc::clone(&first);
                Box::pin(async move {
                    order.lock().unwrap().push(1);
                    Ok(())
                })
            })
            .on_delete(move |_event| {
                let order = Arc::clone(&second);
                Box::pin(async move {
                    order.lock().unwrap().push(2);
                    Ok(())
                })
            });

        let exports = registry.exports();
        let event = TriggerEvent::new(TriggerPayload::Fields(field_map([(
            "userId",
            Value::from_string("kole"),
        )])));
        exports[0].dispatch(&event).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn counts_subdocuments_through_registered_handlers() {
        // The couple/count sugar itself is out of scope; this exercises the
        // raw wiring it would be built on.
        let store = store();
        let counted = Arc::new(AtomicUsize::new(0));

        let mut registry = DocumentRegistry::new();
        registry
            .create_documents([("groupUser", "groups/{groupId}/users/{userId}")], &store)
            .unwrap();

        let counter = Arc::clone(&counted);
        registry.get_mut("groupUser").unwrap().on_create(move |_event| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        let exports = registry.exports();
        assert_eq!(exports[0].name, "groupUserOnCreate");
        for _ in 0..3 {
            exports[0]
                .dispatch(&TriggerEvent::new(TriggerPayload::Fields(FieldMap::new())))
                .await
                .unwrap();
        }
        assert_eq!(counted.load(Ordering::SeqCst), 3);
    }
}
