use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::api::triggers::TriggerPayload;
use crate::error::{bad_path, SugarResult};
use crate::model::{NameMap, Path, Reference};
use crate::store::DocumentStore;

/// Which path parity an entity type requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Document,
    Collection,
}

impl EntityKind {
    fn accepts(&self, path: &Path) -> bool {
        match self {
            EntityKind::Document => path.is_even(),
            EntityKind::Collection => !path.is_even(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            EntityKind::Document => "document paths must have even depth",
            EntityKind::Collection => "collection paths must have odd depth",
        }
    }
}

/// Shared lifecycle of path-addressed entities (documents and collections):
/// construction with parity validation, parameter substitution via
/// [`Entity::instance`], and lazy reference resolution.
pub trait Entity: Sized {
    const KIND: EntityKind;

    /// Builds the entity without validation. Reserved for internal
    /// navigation paths that intentionally skip re-checking.
    fn from_parts(path: Path, store: Arc<dyn DocumentStore>) -> Self;

    fn path(&self) -> &Path;

    fn store(&self) -> &Arc<dyn DocumentStore>;

    fn reference_cell(&self) -> &OnceCell<Reference>;

    /// Parses a raw path string and validates it for this entity type.
    fn new(path: &str, store: Arc<dyn DocumentStore>) -> SugarResult<Self> {
        Self::from_path(Path::parse(path), store)
    }

    /// Validates an existing path for this entity type. Fails with `BadPath`
    /// when the parity does not match or a segment is empty.
    fn from_path(path: Path, store: Arc<dyn DocumentStore>) -> SugarResult<Self> {
        if path.is_empty() || path.segments().iter().any(|segment| segment.is_empty()) {
            return Err(bad_path(format!(
                "`{path}` is not a well-formed resource path"
            )));
        }
        if !Self::KIND.accepts(&path) {
            return Err(bad_path(format!("`{path}`: {}", Self::KIND.describe())));
        }
        Ok(Self::from_parts(path, store))
    }

    /// The last path segment.
    fn id(&self) -> &str {
        self.path().last_segment().unwrap_or_default()
    }

    /// The resolved store reference, memoized on first access. Re-raises
    /// `ParameterInPath` while the path still carries parameters.
    fn reference(&self) -> SugarResult<&Reference> {
        self.reference_cell()
            .get_or_try_init(|| Reference::resolve(self.path()))
    }

    /// Copies this entity with path parameters fulfilled from the payload's
    /// data. A payload that carries no field data yields an unchanged copy.
    fn instance(&self, payload: &TriggerPayload, name_map: &NameMap) -> SugarResult<Self> {
        match payload.extract_data() {
            Some(data) => {
                let path = self.path().insert_args(&data, name_map)?;
                Ok(Self::from_parts(path, Arc::clone(self.store())))
            }
            None => Ok(Self::from_parts(
                self.path().clone(),
                Arc::clone(self.store()),
            )),
        }
    }
}
