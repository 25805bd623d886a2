use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::error::{missing_argument, SugarResult};
use crate::value::{FieldMap, Value};

/// Opening delimiter of a path parameter token.
pub const PARAM_OPEN: char = '{';
/// Closing delimiter of a path parameter token.
pub const PARAM_CLOSE: char = '}';

/// Translates parameter names to the data keys that should fill them, for the
/// cases where a path's wildcard name differs from the field name in the data.
pub type NameMap = BTreeMap<String, String>;

/// A slash-delimited resource path, possibly containing `{param}` tokens.
///
/// Paths are immutable values; every derivation (`child`, `parent`,
/// `insert_args`) returns a new `Path`. Segment-count parity decides what the
/// path names: an even number of segments addresses a document, an odd number
/// a collection. The root is implicitly collection-like.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    raw: String,
    segments: Vec<String>,
}

impl Path {
    /// Splits `raw` on `/`. Parsing itself is lenient; structural validation
    /// (empty segments, parity) happens where a Document or Collection is
    /// constructed.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = if raw.is_empty() {
            Vec::new()
        } else {
            raw.split('/').map(str::to_string).collect()
        };
        Self { raw, segments }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let raw = segments.join("/");
        Self { raw, segments }
    }

    pub fn root() -> Self {
        Self {
            raw: String::new(),
            segments: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether the path has an even number of segments (a document path).
    pub fn is_even(&self) -> bool {
        self.segments.len() % 2 == 0
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Owned copy of the segments; mutating it never affects the path.
    pub fn to_segments(&self) -> Vec<String> {
        self.segments.clone()
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Appends a relative path, returning the extended path.
    pub fn child(&self, relative: &str) -> Path {
        if self.raw.is_empty() {
            return Path::parse(relative);
        }
        Path::parse(format!("{}/{}", self.raw, relative))
    }

    /// Drops the last `steps` segments.
    pub fn parent(&self, steps: usize) -> Path {
        let keep = self.segments.len().saturating_sub(steps);
        Path::from_segments(self.segments[..keep].iter().cloned())
    }

    /// Whether any `{param}` token remains in the path.
    pub fn has_params(&self) -> bool {
        self.raw.contains(PARAM_OPEN)
    }

    /// The parameter names appearing in the path, in order.
    pub fn params(&self) -> Vec<String> {
        let mut params = Vec::new();
        let mut current = String::new();
        let mut reading = false;
        for c in self.raw.chars() {
            if c == PARAM_OPEN {
                current.clear();
                reading = true;
            } else if c == PARAM_CLOSE {
                params.push(current.clone());
                reading = false;
            } else if reading {
                current.push(c);
            }
        }
        params
    }

    /// Replaces every `{param}` token with a value looked up in `args`,
    /// falling back to `args[name_map[param]]` when the direct key is absent,
    /// null, NaN or not a scalar. Fails with `MissingArgument` when neither
    /// key yields a usable value.
    pub fn insert_args(&self, args: &FieldMap, name_map: &NameMap) -> SugarResult<Path> {
        let mut out = String::with_capacity(self.raw.len());
        let mut param = String::new();
        let mut reading = false;
        for c in self.raw.chars() {
            if c == PARAM_OPEN {
                param.clear();
                reading = true;
            } else if c == PARAM_CLOSE {
                let arg = lookup_arg(args, &param).or_else(|| {
                    name_map
                        .get(&param)
                        .and_then(|alias| lookup_arg(args, alias))
                });
                match arg {
                    Some(text) => out.push_str(&text),
                    None => {
                        return Err(missing_argument(format!(
                            "no argument available for path parameter `{param}` in `{}`",
                            self.raw
                        )))
                    }
                }
                reading = false;
            } else if reading {
                param.push(c);
            } else {
                out.push(c);
            }
        }
        Ok(Path::parse(out))
    }

    /// String-identity comparison of the canonical path form.
    pub fn equal_to(&self, other: &Path) -> bool {
        self.raw == other.raw
    }

    pub fn canonical_string(&self) -> &str {
        &self.raw
    }
}

fn lookup_arg(args: &FieldMap, key: &str) -> Option<String> {
    args.get(key).and_then(Value::path_arg)
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq<str> for Path {
    fn eq(&self, other: &str) -> bool {
        self.raw == other
    }
}

impl PartialEq<&str> for Path {
    fn eq(&self, other: &&str) -> bool {
        self.raw == *other
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Path::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::value::field_map;

    #[test]
    fn parity_follows_segment_count() {
        assert!(Path::parse("a/b").is_even());
        assert!(!Path::parse("a/b/c").is_even());
        assert!(!Path::parse("users").is_even());
    }

    #[test]
    fn child_and_parent_derive_new_paths() {
        let path = Path::parse("users/{userId}/characters/{characterId}");
        assert_eq!(path.child("traits"), "users/{userId}/characters/{characterId}/traits");
        assert_eq!(path.parent(1), "users/{userId}/characters");
        assert_eq!(path.parent(3), "users");
    }

    #[test]
    fn segments_copy_is_defensive() {
        let path = Path::parse("a/b/c");
        let mut copy = path.to_segments();
        copy.pop();
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn insert_args_with_name_map_round_trip() {
        let path = Path::parse("col/{docId}/list/{itemId}");
        let args = field_map([
            ("userId", Value::from_string("z")),
            ("achievementId", Value::from_string("h")),
        ]);
        let name_map = NameMap::from([
            ("docId".to_string(), "userId".to_string()),
            ("itemId".to_string(), "achievementId".to_string()),
        ]);
        let resolved = path.insert_args(&args, &name_map).unwrap();
        assert_eq!(resolved, "col/z/list/h");
        assert!(!resolved.has_params());
    }

    #[test]
    fn insert_args_fails_on_missing_argument() {
        let err = Path::parse("a/{x}")
            .insert_args(&FieldMap::new(), &NameMap::new())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingArgument);
    }

    #[test]
    fn insert_args_treats_null_and_nan_as_missing() {
        let path = Path::parse("users/{userId}");
        let args = field_map([
            ("userId", Value::null()),
            ("uid", Value::from_string("kole")),
        ]);
        let name_map = NameMap::from([("userId".to_string(), "uid".to_string())]);
        assert_eq!(path.insert_args(&args, &name_map).unwrap(), "users/kole");

        let args = field_map([("userId", Value::from_double(f64::NAN))]);
        let err = path.insert_args(&args, &NameMap::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingArgument);
    }

    #[test]
    fn equal_to_is_string_identity() {
        let path = Path::parse("users/kole");
        assert!(path.equal_to(&Path::parse("users/kole")));
        assert!(!path.equal_to(&Path::parse("users/zach")));
        assert!(path == "users/kole");
        assert!(path != "users");
    }

    #[test]
    fn params_lists_tokens_in_order() {
        let path = Path::parse("users/{userId}/characters/{characterId}");
        assert_eq!(path.params(), vec!["userId", "characterId"]);
    }
}
