//! Sharded content-address layout.
//!
//! A blob with hex digest `h` lives in
//! `<root>/<algorithm>/h[0:2]/h[2:4]/h[4:6]/h[6:8]/h/`. The four levels of
//! two-character fan-out keep directory sizes bounded. This layout is
//! persisted state: existing stores depend on it byte for byte.

use hoard_blob::Fingerprint;
use std::path::{Path, PathBuf};

/// Number of two-character fan-out levels below the algorithm directory.
pub const SHARD_LEVELS: usize = 4;

/// Directory holding the `meta` and `blob` files for `fingerprint`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use hoard_blob::Fingerprint;
/// use hoard_storage::shard_path;
///
/// let fp = Fingerprint::compute(b"hello");
/// assert_eq!(
///     shard_path(Path::new("/store"), &fp),
///     Path::new("/store/sha1/aa/f4/c6/1d/aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"),
/// );
/// ```
pub fn shard(root: &Path, fingerprint: &Fingerprint) -> PathBuf {
    let hex = fingerprint.hex();
    let mut path = root.join(fingerprint.algorithm());
    for level in 0..SHARD_LEVELS {
        // Digests are always far longer than the fan-out prefix.
        if let Some(part) = hex.get(level * 2..level * 2 + 2) {
            path.push(part);
        }
    }
    path.push(hex);
    path
}
