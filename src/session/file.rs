//! Directory-sharded file session store.
//!
//! Records live at `<root>/<id[0]>/<id[1]>/sess_<id>`. Sharding on the first
//! two identifier characters keeps per-directory entry counts bounded without
//! any index: the path is always recomputable from the identifier alone.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use uuid::Uuid;
use walkdir::WalkDir;

use super::handler::SessionHandler;
use super::id::{is_valid_id, SessionId};
use crate::error::ShardSessionError;
use crate::Result;

/// File name prefix of every session record.
pub const FILE_PREFIX: &str = "sess_";

/// Permission bits for newly created shard directories.
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

/// Permission bits for session records: owner only.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// File-backed session store sharded by identifier prefix.
///
/// Holds no per-request state, so one instance can be shared by every
/// request worker. No locks are taken: concurrent writers to the same
/// identifier race and the last rename wins in full.
#[derive(Debug, Clone)]
pub struct ShardedFileSessionStore {
    root: PathBuf,
}

impl ShardedFileSessionStore {
    /// Create a store rooted at `root`.
    ///
    /// Redundant and trailing separators are dropped, so `/tmp/sessions` and
    /// `/tmp/sessions/` address the same files.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = normalize_root(root.as_ref());
        tracing::debug!(root = %root.display(), "session store created");
        Self { root }
    }

    /// The normalized storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check whether `id` may be used as a session identifier.
    pub fn validate(id: &str) -> bool {
        is_valid_id(id)
    }

    /// Shard directory for `id`: `<root>/<id[0]>/<id[1]>`.
    pub fn shard_dir(&self, id: &str) -> Result<PathBuf> {
        let id = SessionId::parse(id)?;
        Ok(self.shard_dir_of(&id))
    }

    /// Record path for `id`: `<root>/<id[0]>/<id[1]>/sess_<id>`.
    ///
    /// Pure path arithmetic; the filesystem is not consulted.
    pub fn file_path(&self, id: &str) -> Result<PathBuf> {
        let id = SessionId::parse(id)?;
        Ok(self.file_path_of(&id))
    }

    fn shard_dir_of(&self, id: &SessionId) -> PathBuf {
        let (first, second) = id.shard_prefix();
        self.root.join(first).join(second)
    }

    fn file_path_of(&self, id: &SessionId) -> PathBuf {
        self.shard_dir_of(id)
            .join(format!("{FILE_PREFIX}{}", id.as_str()))
    }

    fn ensure_shard_dir(&self, dir: &Path) -> Result<()> {
        if dir.is_dir() {
            return Ok(());
        }

        // Recursive creation treats an already existing directory as success,
        // which covers a concurrent writer creating it after the check above.
        create_dir_all(dir).map_err(|source| ShardSessionError::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        })?;

        tracing::trace!(dir = %dir.display(), "created shard directory");
        Ok(())
    }
}

impl SessionHandler for ShardedFileSessionStore {
    fn read(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.file_path(id)?;

        match fs::read(&path) {
            Ok(payload) => {
                tracing::trace!(session_id = id, bytes = payload.len(), "session read");
                Ok(payload)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(ShardSessionError::Read { path, source }),
        }
    }

    fn write(&self, id: &str, payload: &[u8]) -> Result<()> {
        let id = SessionId::parse(id)?;
        let dir = self.shard_dir_of(&id);
        self.ensure_shard_dir(&dir)?;

        let path = self.file_path_of(&id);
        let tmp = dir.join(format!(
            ".{FILE_PREFIX}{}.{}.tmp",
            id.as_str(),
            Uuid::new_v4().simple()
        ));

        if let Err(source) = write_new_file(&tmp, payload) {
            let _ = fs::remove_file(&tmp);
            return Err(ShardSessionError::Write { path, source });
        }

        if let Err(source) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(ShardSessionError::Write { path, source });
        }

        tracing::trace!(session_id = %id, bytes = payload.len(), "session written");
        Ok(())
    }

    fn destroy(&self, id: &str) -> Result<()> {
        let path = self.file_path(id)?;

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(session_id = id, "session destroyed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ShardSessionError::Remove { path, source }),
        }
    }

    fn gc(&self, max_lifetime: Duration) -> Result<usize> {
        if !self.root.is_dir() {
            return Ok(0);
        }

        let now = SystemTime::now();
        let mut removed = 0;

        // Only <root>/<c>/<c>/<file> is ours; anything else is left alone.
        for entry in WalkDir::new(&self.root)
            .min_depth(3)
            .max_depth(3)
            .follow_links(false)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable session directory entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_record_name(&entry.file_name().to_string_lossy())
            {
                continue;
            }

            let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                Some(modified) => modified,
                None => continue,
            };

            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= max_lifetime {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "failed to remove stale session");
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, root = %self.root.display(), "expired sessions collected");
        }
        Ok(removed)
    }
}

/// Session records and temp files left behind by interrupted writes.
fn is_record_name(name: &str) -> bool {
    name.starts_with(FILE_PREFIX)
        || (name.starts_with('.') && name[1..].starts_with(FILE_PREFIX) && name.ends_with(".tmp"))
}

/// Create `path` exclusively and fill it with `payload`.
fn write_new_file(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    let mut file = options.open(path)?;
    file.write_all(payload)?;
    file.sync_all()
}

fn normalize_root(root: &Path) -> PathBuf {
    let normalized: PathBuf = root.components().collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

fn create_dir_all(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(dir)
}

/// Create the storage root itself, with the same permissions as shard
/// directories.
pub(crate) fn create_root(dir: &Path) -> Result<()> {
    create_dir_all(dir).map_err(|source| ShardSessionError::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn store() -> (TempDir, ShardedFileSessionStore) {
        let dir = TempDir::new().unwrap();
        let store = ShardedFileSessionStore::new(dir.path());
        (dir, store)
    }

    fn age_file(path: &Path, by: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (_dir, store) = store();
        let payload = b"user|i:42;cart|a:0:{}\x00\xff";

        store.write("ab12-xy", payload).unwrap();
        assert_eq!(store.read("ab12-xy").unwrap(), payload.to_vec());
    }

    #[test]
    fn test_layout_on_disk() {
        let (dir, store) = store();
        store.write("ab12-xy", b"data").unwrap();

        let expected = dir.path().join("a").join("b").join("sess_ab12-xy");
        assert!(expected.is_file());
        assert_eq!(store.file_path("ab12-xy").unwrap(), expected);
    }

    #[test]
    fn test_missing_session_reads_empty() {
        let (_dir, store) = store();
        assert!(store.read("neverwritten").unwrap().is_empty());
    }

    #[test]
    fn test_path_determinism() {
        let (_dir, store) = store();
        let before = store.file_path("zz-top").unwrap();
        assert_eq!(before, store.file_path("zz-top").unwrap());

        store.write("zz-top", b"x").unwrap();
        assert_eq!(before, store.file_path("zz-top").unwrap());
    }

    #[test]
    fn test_shared_shard_directory() {
        let (dir, store) = store();
        store.write("ab111", b"one").unwrap();
        store.write("ab222", b"two").unwrap();

        let shard = dir.path().join("a").join("b");
        let mut names: Vec<String> = fs::read_dir(&shard)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["sess_ab111", "sess_ab222"]);
        assert_eq!(store.read("ab111").unwrap(), b"one");
        assert_eq!(store.read("ab222").unwrap(), b"two");
    }

    #[test]
    fn test_overwrite_with_shorter_payload() {
        let (_dir, store) = store();
        store.write("ow-1", b"a much longer first payload").unwrap();
        store.write("ow-1", b"short").unwrap();

        let on_disk = fs::read(store.file_path("ow-1").unwrap()).unwrap();
        assert_eq!(on_disk, b"short");
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let (_dir, store) = store();
        store.write("tmp1", b"one").unwrap();
        store.write("tmp1", b"two").unwrap();

        let shard = store.shard_dir("tmp1").unwrap();
        let count = fs::read_dir(&shard).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let (_dir, store) = store();
        store.write("empty", b"").unwrap();
        assert!(store.file_path("empty").unwrap().is_file());
        assert!(store.read("empty").unwrap().is_empty());
    }

    #[test]
    fn test_root_normalization() {
        let a = ShardedFileSessionStore::new("/tmp/sessions");
        let b = ShardedFileSessionStore::new("/tmp/sessions/");
        let c = ShardedFileSessionStore::new("/tmp//sessions///");

        let expected = PathBuf::from("/tmp/sessions/q/w/sess_qwerty");
        assert_eq!(a.file_path("qwerty").unwrap(), expected);
        assert_eq!(b.file_path("qwerty").unwrap(), expected);
        assert_eq!(c.file_path("qwerty").unwrap(), expected);
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_traversal_rejected_before_io() {
        let (dir, store) = store();
        let err = store.write("../../etc/passwd", b"pwned").unwrap_err();
        assert!(matches!(err, ShardSessionError::InvalidIdentifier(_)));

        // Nothing was created under the root.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_short_identifiers_rejected() {
        let (_dir, store) = store();
        assert!(store.write("", b"x").unwrap_err().is_invalid_identifier());
        assert!(store.write("a", b"x").unwrap_err().is_invalid_identifier());
        assert!(store.read("a").unwrap_err().is_invalid_identifier());
        assert!(store.destroy("").unwrap_err().is_invalid_identifier());
        assert!(store.file_path("a").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(ShardedFileSessionStore::validate("ab12-xy"));
        assert!(ShardedFileSessionStore::validate("a,b"));
        assert!(!ShardedFileSessionStore::validate("a"));
        assert!(!ShardedFileSessionStore::validate("ab cd"));
    }

    #[test]
    fn test_destroy() {
        let (_dir, store) = store();
        store.write("gone", b"bye").unwrap();
        store.destroy("gone").unwrap();

        assert!(!store.file_path("gone").unwrap().exists());
        assert!(store.read("gone").unwrap().is_empty());
        // Destroying again is fine.
        store.destroy("gone").unwrap();
        // Shard directory survives.
        assert!(store.shard_dir("gone").unwrap().is_dir());
    }

    #[test]
    fn test_gc_removes_only_stale_records() {
        let (dir, store) = store();
        store.write("old1", b"stale").unwrap();
        store.write("new1", b"fresh").unwrap();
        age_file(&store.file_path("old1").unwrap(), Duration::from_secs(7200));

        // Foreign file at the right depth is not touched.
        let foreign = dir.path().join("o").join("l").join("README");
        fs::write(&foreign, b"keep").unwrap();
        age_file(&foreign, Duration::from_secs(7200));

        let removed = store.gc(Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 1);
        assert!(store.read("old1").unwrap().is_empty());
        assert_eq!(store.read("new1").unwrap(), b"fresh");
        assert!(foreign.exists());
    }

    #[test]
    fn test_gc_missing_root() {
        let store = ShardedFileSessionStore::new("/nonexistent/shard-session-gc-root");
        assert_eq!(store.gc(Duration::from_secs(1)).unwrap(), 0);
    }

    #[test]
    fn test_is_record_name() {
        assert!(is_record_name("sess_abc"));
        assert!(is_record_name(".sess_abc.0123.tmp"));
        assert!(!is_record_name(".sess_abc"));
        assert!(!is_record_name("README"));
        assert!(!is_record_name(".tmp"));
    }

    #[test]
    fn test_directory_create_failure() {
        let (dir, store) = store();
        // A regular file where the first shard directory should be.
        fs::write(dir.path().join("x"), b"not a directory").unwrap();

        let err = store.write("xy-1", b"data").unwrap_err();
        assert!(matches!(err, ShardSessionError::DirectoryCreate { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_read_failure_is_not_empty_session() {
        let (_dir, store) = store();
        // A directory in place of the record makes the read fail for a
        // reason other than absence.
        fs::create_dir_all(store.file_path("rf-1").unwrap()).unwrap();

        let err = store.read("rf-1").unwrap_err();
        assert!(matches!(err, ShardSessionError::Read { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_failure_propagates() {
        let (_dir, store) = store();
        fs::create_dir_all(store.file_path("wf-1").unwrap()).unwrap();

        let err = store.write("wf-1", b"lost").unwrap_err();
        assert!(matches!(err, ShardSessionError::Write { .. }));

        let shard = store.shard_dir("wf-1").unwrap();
        assert_eq!(fs::read_dir(&shard).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_shard_directory_mode() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.write("md-1", b"x").unwrap();

        let mode = fs::metadata(store.shard_dir("md-1").unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        // umask may only clear bits.
        assert_eq!(mode & !DIR_MODE, 0);
        assert_eq!(mode & 0o700, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn test_record_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.write("ab12-xy", b"secret").unwrap();
        // Overwrites keep the restricted mode too.
        store.write("ab12-xy", b"secret2").unwrap();

        let mode = fs::metadata(store.file_path("ab12-xy").unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o077, 0);
        assert_eq!(mode & 0o600, 0o600);
    }

    #[test]
    fn test_concurrent_writers_same_shard() {
        let (_dir, store) = store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let id = format!("cc-{i}");
                    store.write(&id, id.as_bytes()).unwrap();
                    id
                })
            })
            .collect();

        for handle in handles {
            let id = handle.join().unwrap();
            assert_eq!(store.read(&id).unwrap(), id.as_bytes());
        }
    }

    #[test]
    fn test_concurrent_writers_same_id() {
        let (_dir, store) = store();
        let store = Arc::new(store);
        let payloads: Vec<Vec<u8>> = (0..16u8).map(|i| vec![i; 4096]).collect();

        let handles: Vec<_> = payloads
            .iter()
            .cloned()
            .map(|payload| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.write("same-id", &payload).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // One writer wins in full; no interleaving.
        let stored = store.read("same-id").unwrap();
        assert!(payloads.contains(&stored));
    }
}
