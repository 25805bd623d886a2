use std::fmt::{Display, Formatter};

use crate::error::{bad_path, parameter_in_path, wrong_reference_kind, SugarResult};
use crate::model::Path;

/// A resolved, parameter-free handle to a document in the backing store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    path: Path,
}

impl DocumentKey {
    pub fn from_path(path: Path) -> SugarResult<Self> {
        if path.has_params() {
            return Err(parameter_in_path(format!(
                "document key `{path}` still contains a path parameter"
            )));
        }
        if path.is_empty() || !path.is_even() {
            return Err(bad_path(
                "document keys must have an even number of segments",
            ));
        }
        Ok(Self { path })
    }

    pub fn from_string(path: &str) -> SugarResult<Self> {
        Self::from_path(Path::parse(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> Path {
        self.path
    }

    /// The collection that contains this document.
    pub fn collection_path(&self) -> Path {
        self.path.parent(1)
    }

    pub fn id(&self) -> &str {
        self.path
            .last_segment()
            .expect("document key path always has an id")
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// A resolved store handle: either a document or a collection, bound 1:1 to a
/// concrete (parameter-free) path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reference {
    Document(DocumentKey),
    Collection(Path),
}

impl Reference {
    /// Interprets a path into a store handle. An even segment count names a
    /// document (final segment is the id under the preceding collection); an
    /// odd count names a collection. The root resolves as a collection-like
    /// handle. Fails with `ParameterInPath` while `{param}` tokens remain.
    pub fn resolve(path: &Path) -> SugarResult<Reference> {
        if path.has_params() {
            return Err(parameter_in_path(format!(
                "a reference cannot contain a path parameter: `{path}`"
            )));
        }
        if path.is_empty() || !path.is_even() {
            return Ok(Reference::Collection(path.clone()));
        }
        Ok(Reference::Document(DocumentKey::from_path(path.clone())?))
    }

    /// Inverse of [`Reference::resolve`]: the concrete path of this handle.
    pub fn path(&self) -> &Path {
        match self {
            Reference::Document(key) => key.path(),
            Reference::Collection(path) => path,
        }
    }

    pub fn into_path(self) -> Path {
        match self {
            Reference::Document(key) => key.into_path(),
            Reference::Collection(path) => path,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Reference::Document(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Reference::Collection(_))
    }

    /// The id of the referenced resource (its last path segment).
    pub fn id(&self) -> Option<&str> {
        self.path().last_segment()
    }

    /// Unwraps a document-kind handle, failing with `WrongReferenceKind`
    /// for anything else.
    pub fn document_key(&self) -> SugarResult<DocumentKey> {
        match self {
            Reference::Document(key) => Ok(key.clone()),
            Reference::Collection(path) => Err(wrong_reference_kind(format!(
                "`{path}` is a collection reference, not a document reference"
            ))),
        }
    }

    /// Unwraps a collection-kind handle, failing with `WrongReferenceKind`
    /// for anything else.
    pub fn collection_path(&self) -> SugarResult<&Path> {
        match self {
            Reference::Collection(path) => Ok(path),
            Reference::Document(key) => Err(wrong_reference_kind(format!(
                "`{}` is a document reference, not a collection reference",
                key.path()
            ))),
        }
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::Document(key) => write!(f, "Document({key})"),
            Reference::Collection(path) => write!(f, "Collection({path})"),
        }
    }
}
