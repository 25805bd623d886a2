mod path;
mod reference;

pub use path::{NameMap, Path, PARAM_CLOSE, PARAM_OPEN};
pub use reference::{DocumentKey, Reference};
