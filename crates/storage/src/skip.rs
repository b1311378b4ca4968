//! Composable skip predicates for the walker.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Decides whether a filesystem entry is excluded from a run.
///
/// A `Skip` is the boolean OR of any number of predicates: an entry is skipped
/// as soon as one of them matches. The [`Default`] skips hidden entries.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use hoard_storage::Skip;
///
/// let skip = Skip::hidden().or(Skip::names(["Thumbs.db"]));
/// assert!(skip.matches(Path::new("/photos/.cache")));
/// assert!(skip.matches(Path::new("/photos/thumbs.db")));
/// assert!(!skip.matches(Path::new("/photos/cat.jpg")));
/// ```
#[derive(Clone)]
pub struct Skip {
    predicates: Vec<Predicate>,
}

impl Skip {
    /// Never skips anything.
    pub fn none() -> Self {
        Self { predicates: Vec::new() }
    }

    /// Skips entries whose base name starts with `.` (and entries without a
    /// usable base name).
    pub fn hidden() -> Self {
        Self::from_fn(is_hidden)
    }

    /// Skips entries whose base name equals one of `names`, ignoring ASCII case.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(|n| n.into().to_ascii_lowercase()).collect();
        Self::from_fn(move |path| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_ascii_lowercase())
                .is_some_and(|name| names.contains(&name))
        })
    }

    pub fn from_fn(predicate: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        Self { predicates: vec![Arc::new(predicate)] }
    }

    /// Combine two predicates: skip if either matches.
    #[must_use]
    pub fn or(mut self, other: Skip) -> Self {
        self.predicates.extend(other.predicates);
        self
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.predicates.iter().any(|predicate| predicate(path))
    }
}

impl Default for Skip {
    fn default() -> Self {
        Self::hidden()
    }
}

impl Debug for Skip {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Skip").field("predicates", &self.predicates.len()).finish()
    }
}

/// `true` for dot-files and dot-directories.
pub fn is_hidden(path: &Path) -> bool {
    match path.file_name() {
        Some(name) => name.as_encoded_bytes().first().is_none_or(|b| *b == b'.'),
        None => true,
    }
}
