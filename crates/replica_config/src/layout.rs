//! Local store layout.
//!
//! Each replica lives under a storage root:
//!
//! ```text
//! <root>/
//! └─ <host>[_<port>]/
//!    └─ <identity>/
//!       ├─ <path...>.realm             # Store data
//!       ├─ <path...>.realm.lock        # Lock file
//!       └─ <path...>.realm.management/ # Engine control files
//! ```
//!
//! The identity directory is always present, including for locators
//! without a wildcard, so two authorities opening the same shared path
//! never share a local file. With a wildcard the identity therefore shows
//! up twice: once as the directory and once inside the resolved path.
//!
//! Path segments are percent-decoded and then re-escaped with a narrower
//! file-name-safe set.
//!
//! The three suffixes belong to the storage engine. A locator may not end
//! with any of them.

use crate::configuration::SyncConfiguration;
use crate::locator::decode;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix of the store data file.
pub const STORE_SUFFIX: &str = ".realm";

/// Suffix of the store lock file.
pub const LOCK_SUFFIX: &str = ".realm.lock";

/// Suffix of the store management directory.
pub const MANAGEMENT_SUFFIX: &str = ".realm.management";

/// Suffixes a locator must not end with, longest first.
pub const RESERVED_SUFFIXES: [&str; 3] = [MANAGEMENT_SUFFIX, LOCK_SUFFIX, STORE_SUFFIX];

/// Store name used when the locator has an empty path.
const DEFAULT_STORE_NAME: &str = "default";

/// Returns the reserved suffix `path` ends with, if any.
///
/// A single trailing `/` is ignored.
pub fn reserved_suffix(path: &str) -> Option<&'static str> {
    let path = path.strip_suffix('/').unwrap_or(path);
    RESERVED_SUFFIXES
        .iter()
        .copied()
        .find(|suffix| path.ends_with(suffix))
}

/// Paths of the files backing one local replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    store_file: PathBuf,
    lock_file: PathBuf,
    management_dir: PathBuf,
}

impl StoreLayout {
    /// Creates a layout from a base path without suffix.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into().into_os_string();
        Self {
            store_file: with_suffix(&base, STORE_SUFFIX),
            lock_file: with_suffix(&base, LOCK_SUFFIX),
            management_dir: with_suffix(&base, MANAGEMENT_SUFFIX),
        }
    }

    /// Derives the layout of the replica described by `config` under `root`.
    pub fn for_configuration(root: &Path, config: &SyncConfiguration) -> Self {
        let locator = config.locator();

        let mut base = root.to_path_buf();
        let host = match locator.port() {
            Some(port) => format!("{}_{port}", locator.host()),
            None => locator.host().to_string(),
        };
        base.push(sanitize(&host));
        base.push(sanitize(config.authority().identity()));

        let mut segments = locator.segments().peekable();
        if segments.peek().is_none() {
            base.push(DEFAULT_STORE_NAME);
        }
        for segment in segments {
            base.push(sanitize(&decode(segment)));
        }

        Self::new(base)
    }

    /// Path of the store data file.
    pub fn store_file(&self) -> &Path {
        &self.store_file
    }

    /// Path of the lock file.
    pub fn lock_file(&self) -> &Path {
        &self.lock_file
    }

    /// Path of the management directory.
    pub fn management_dir(&self) -> &Path {
        &self.management_dir
    }

    /// Directory holding all three entries.
    pub fn directory(&self) -> &Path {
        self.store_file.parent().unwrap_or_else(|| Path::new(""))
    }
}

fn with_suffix(base: &OsString, suffix: &str) -> PathBuf {
    let mut path = base.clone();
    path.push(suffix);
    PathBuf::from(path)
}

/// Escapes a name so it is a single, non-traversing path component.
fn sanitize(name: &str) -> String {
    if name.is_empty() {
        return "%".to_string();
    }

    let dots_only = name.bytes().all(|b| b == b'.');
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(byte, b'_' | b'-')
            || (byte == b'.' && !dots_only);
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::SessionAuthority;
    use std::sync::Arc;

    fn config(identity: &str, locator: &str) -> SyncConfiguration {
        SyncConfiguration::new(Arc::new(SessionAuthority::new(identity)), locator).unwrap()
    }

    #[test]
    fn reserved_suffix_detection() {
        assert_eq!(reserved_suffix("/a/b.realm"), Some(STORE_SUFFIX));
        assert_eq!(reserved_suffix("/a/b.realm.lock"), Some(LOCK_SUFFIX));
        assert_eq!(reserved_suffix("/a/b.realm.management"), Some(MANAGEMENT_SUFFIX));
        assert_eq!(reserved_suffix("/a/b.realm.management/"), Some(MANAGEMENT_SUFFIX));
        assert_eq!(reserved_suffix("/a/b.realms"), None);
        assert_eq!(reserved_suffix("/a/realm"), None);
    }

    #[test]
    fn layout_siblings_share_a_base() {
        let layout = StoreLayout::new("/data/notes");
        assert_eq!(layout.store_file(), Path::new("/data/notes.realm"));
        assert_eq!(layout.lock_file(), Path::new("/data/notes.realm.lock"));
        assert_eq!(layout.management_dir(), Path::new("/data/notes.realm.management"));
        assert_eq!(layout.directory(), Path::new("/data"));
    }

    #[test]
    fn layout_for_configuration() {
        let config = config("alice", "realms://example.org:9443/~/team/notes");
        let layout = StoreLayout::for_configuration(Path::new("/root"), &config);
        assert_eq!(
            layout.store_file(),
            Path::new("/root/example.org_9443/alice/alice/team/notes.realm")
        );
    }

    #[test]
    fn layout_for_empty_path() {
        let config = config("bob", "realm://example.org");
        let layout = StoreLayout::for_configuration(Path::new("/root"), &config);
        assert_eq!(
            layout.store_file(),
            Path::new("/root/example.org/bob/default.realm")
        );
    }

    #[test]
    fn shared_locator_is_split_per_identity() {
        let root = Path::new("/root");
        let alice = StoreLayout::for_configuration(root, &config("alice", "realm://example.org/shared/notes"));
        let bob = StoreLayout::for_configuration(root, &config("bob", "realm://example.org/shared/notes"));

        assert_eq!(alice.store_file(), Path::new("/root/example.org/alice/shared/notes.realm"));
        assert_eq!(bob.store_file(), Path::new("/root/example.org/bob/shared/notes.realm"));
    }

    #[test]
    fn escaped_segments_are_decoded_once() {
        let config = config("alice smith", "realm://example.org/~/my%20notes");
        let layout = StoreLayout::for_configuration(Path::new("/root"), &config);
        assert_eq!(
            layout.store_file(),
            Path::new("/root/example.org/alice%20smith/alice%20smith/my%20notes.realm")
        );
    }

    #[test]
    fn sanitize_blocks_traversal() {
        assert_eq!(sanitize(".."), "%2E%2E");
        assert_eq!(sanitize(""), "%");
        assert_eq!(sanitize("a b"), "a%20b");
        assert_eq!(sanitize("a%2Fb"), "a%252Fb");
        assert_eq!(sanitize("v1.2_x-y"), "v1.2_x-y");
    }
}
