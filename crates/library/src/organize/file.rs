use crate::organize::error::{ErrorKind, Result};
use exn::ResultExt;
use hoard_index::Entry;
use std::io;
use std::path::{Path, PathBuf};

/// Where and how much to link.
#[derive(Clone, Debug)]
pub struct Context {
    /// Root of the symlink farm.
    pub target: PathBuf,
    /// A run stops after the first link that takes the linked total past this.
    pub size_limit: u64,
}

impl Context {
    pub fn new(target: impl Into<PathBuf>, size_limit: u64) -> Self {
        Self { target: target.into(), size_limit }
    }
}

/// Top-level directory of the farm, chosen from the MIME type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Pictures,
    Videos,
    Documents,
}

impl Category {
    pub fn of(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            Self::Pictures
        } else if mime_type.starts_with("video/") {
            Self::Videos
        } else {
            Self::Documents
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Pictures => "Pictures",
            Self::Videos => "Videos",
            Self::Documents => "Documents",
        }
    }
}

/// The outcome of (successfully) organizing a single index row.
///
/// Every variant counts as linked in the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// A new symlink was created.
    Linked { link: PathBuf, size: u64 },
    /// The symlink already existed and pointed at this row's path.
    AlreadyLinked(PathBuf),
    /// The symlink already existed for the same content at another path.
    Duplicate { link: PathBuf, existing: PathBuf },
}

impl Action {
    pub fn link(&self) -> &Path {
        match self {
            Self::Linked { link, .. } | Self::AlreadyLinked(link) | Self::Duplicate { link, .. } => link,
        }
    }
}

/// Lower-cased extension of `path` with its dot, or one derived from the
/// MIME type when the path has none.
pub fn extension(path: &Path, mime_type: &str) -> String {
    match path.extension().and_then(|ext| ext.to_str()).filter(|ext| !ext.is_empty()) {
        Some(ext) => format!(".{}", ext.to_lowercase()),
        None => match mime_type {
            "image/jpeg" => ".jpg",
            "image/png" => ".png",
            "video/mpeg" => ".mpg",
            "video/mp4" => ".mp4",
            _ => ".dat",
        }
        .to_string(),
    }
}

/// Where the symlink for `entry` lives under `target`.
pub fn link_path(target: &Path, entry: &Entry) -> Result<PathBuf> {
    let hash = entry.content_hash.as_str();
    let (Some(first), Some(second)) = (hash.get(0..2), hash.get(2..4)) else {
        exn::bail!(ErrorKind::Hash(hash.to_string()));
    };
    Ok(target
        .join(Category::of(&entry.mime_type).dir_name())
        .join(first)
        .join(second)
        .join(format!("{hash}{}", extension(&entry.path, &entry.mime_type))))
}

/// Creates the symlink for one index row.
pub async fn link_entry(ctx: &Context, entry: &Entry) -> Result<Action> {
    let link = link_path(&ctx.target, entry)?;
    match tokio::fs::symlink_metadata(&link).await {
        Ok(meta) if meta.is_symlink() => {
            let existing = tokio::fs::read_link(&link).await.or_raise(|| ErrorKind::Link(link.clone()))?;
            if existing == entry.path {
                return Ok(Action::AlreadyLinked(link));
            }
            tracing::debug!(link = %link.display(), path = %entry.path.display(), existing = %existing.display(), "Content already linked from another path");
            return Ok(Action::Duplicate { link, existing });
        },
        Ok(_) => exn::bail!(ErrorKind::Occupied(link)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {},
        Err(err) => return Err(err).or_raise(|| ErrorKind::Link(link)),
    }
    if let Some(parent) = link.parent() {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Link(link.clone()))?;
    }
    symlink(&entry.path, &link).await.or_raise(|| ErrorKind::Link(link.clone()))?;
    tracing::debug!(link = %link.display(), path = %entry.path.display(), size = entry.size, "Linked");
    Ok(Action::Linked { link, size: entry.size })
}

#[cfg(unix)]
async fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::symlink(original, link).await
}

#[cfg(windows)]
async fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::symlink_file(original, link).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(hash: &str, path: &str, mime_type: &str) -> Entry {
        Entry {
            id: 1,
            content_hash: hash.to_string(),
            path: PathBuf::from(path),
            size: 10,
            mime_type: mime_type.to_string(),
            mod_time: None,
            linked: false,
        }
    }

    #[rstest]
    #[case("/a/IMG_0001.JPG", "image/jpeg", ".jpg")]
    #[case("/a/clip", "video/mp4", ".mp4")]
    #[case("/a/clip", "video/mpeg", ".mpg")]
    #[case("/a/shot", "image/png", ".png")]
    #[case("/a/shot", "image/jpeg", ".jpg")]
    #[case("/a/notes", "text/plain", ".dat")]
    #[case("/a/notes.", "text/plain", ".dat")]
    #[case("/a/archive.tar.GZ", "application/gzip", ".gz")]
    fn test_extension(#[case] path: &str, #[case] mime: &str, #[case] expected: &str) {
        assert_eq!(extension(Path::new(path), mime), expected);
    }

    #[rstest]
    #[case("image/jpeg", Category::Pictures)]
    #[case("video/quicktime", Category::Videos)]
    #[case("text/plain", Category::Documents)]
    #[case("imagefoo/x", Category::Documents)]
    fn test_category(#[case] mime: &str, #[case] expected: Category) {
        assert_eq!(Category::of(mime), expected);
    }

    #[test]
    fn test_link_path() {
        let entry = entry("abcdef0123", "/photos/Cat.JPEG", "image/jpeg");
        let link = link_path(Path::new("/farm"), &entry).unwrap();
        assert_eq!(link, Path::new("/farm/Pictures/ab/cd/abcdef0123.jpeg"));
    }

    #[test]
    fn test_short_hash_is_rejected() {
        let err = link_path(Path::new("/farm"), &entry("abc", "/x", "text/plain")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Hash(h) if h == "abc"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_link_entry_outcomes() {
        let farm = tempfile::tempdir().unwrap();
        let ctx = Context::new(farm.path(), u64::MAX);
        let first = entry("0123456789", "/data/one.txt", "text/plain");

        let action = link_entry(&ctx, &first).await.unwrap();
        let link = farm.path().join("Documents/01/23/0123456789.txt");
        assert_eq!(action, Action::Linked { link: link.clone(), size: 10 });
        assert_eq!(std::fs::read_link(&link).unwrap(), Path::new("/data/one.txt"));

        assert_eq!(link_entry(&ctx, &first).await.unwrap(), Action::AlreadyLinked(link.clone()));

        let copy = entry("0123456789", "/data/copy.txt", "text/plain");
        assert_eq!(
            link_entry(&ctx, &copy).await.unwrap(),
            Action::Duplicate { link, existing: PathBuf::from("/data/one.txt") }
        );
    }

    #[tokio::test]
    async fn test_regular_file_occupies_link() {
        let farm = tempfile::tempdir().unwrap();
        let ctx = Context::new(farm.path(), u64::MAX);
        let entry = entry("0123456789", "/data/one.txt", "text/plain");
        let link = farm.path().join("Documents/01/23/0123456789.txt");
        std::fs::create_dir_all(link.parent().unwrap()).unwrap();
        std::fs::write(&link, b"not a link").unwrap();

        let err = link_entry(&ctx, &entry).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Occupied(p) if *p == link));
    }
}
