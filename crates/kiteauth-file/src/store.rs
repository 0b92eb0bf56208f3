//! Filesystem storage for persisted sessions.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use kiteauth_core::traits::SessionStore;
use kiteauth_core::{Error, Result, Session, StorageError};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Record format version written to disk.
const RECORD_VERSION: u32 = 1;

fn map_io(path: &Path, err: std::io::Error) -> Error {
    Error::Storage(StorageError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

fn map_json(err: serde_json::Error) -> Error {
    Error::Storage(StorageError::Corrupt {
        message: err.to_string(),
    })
}

/// On-disk envelope around a session.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    version: u32,
    session: Session,
}

/// A [`SessionStore`] writing one JSON file per user id.
///
/// Layout: `<root>/<user_id>.json`, guarded by `<root>/<user_id>.lock`.
/// Writes go to a temporary file that is renamed into place, so readers
/// never observe a partial record. On Unix the file is created with mode
/// `0600`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a new file store at the given root directory.
    ///
    /// The directory is created lazily on first save.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a user id into a filesystem-safe file stem.
    fn file_stem(user_id: &str) -> String {
        user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Get the record path for a user.
    pub fn session_path(&self, user_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::file_stem(user_id)))
    }

    fn lock_path(&self, user_id: &str) -> PathBuf {
        self.root.join(format!("{}.lock", Self::file_stem(user_id)))
    }

    /// Run `f` while holding an exclusive lock for `user_id`.
    fn with_lock<T>(&self, user_id: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        fs::create_dir_all(&self.root).map_err(|e| map_io(&self.root, e))?;

        let lock_path = self.lock_path(user_id);
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| map_io(&lock_path, e))?;

        lock_file
            .lock_exclusive()
            .map_err(|e| map_io(&lock_path, e))?;

        let result = f();

        if let Err(e) = lock_file.unlock() {
            warn!(path = %lock_path.display(), error = %e, "Failed to release session lock");
        }

        result
    }

    fn read_blocking(&self, user_id: &str) -> Result<Option<Session>> {
        let path = self.session_path(user_id);
        if !path.exists() {
            return Ok(None);
        }

        self.with_lock(user_id, || {
            let contents = match fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(map_io(&path, e)),
            };

            let stored: StoredSession = serde_json::from_str(&contents).map_err(map_json)?;
            if stored.version != RECORD_VERSION {
                return Err(Error::Storage(StorageError::Corrupt {
                    message: format!("unsupported record version {}", stored.version),
                }));
            }
            Ok(Some(stored.session))
        })
    }

    fn write_blocking(&self, session: &Session) -> Result<()> {
        let user_id = session.user_id();
        let path = self.session_path(user_id);

        let stored = StoredSession {
            version: RECORD_VERSION,
            session: session.clone(),
        };
        let json = serde_json::to_string_pretty(&stored).map_err(map_json)?;

        self.with_lock(user_id, || {
            let tmp_path = self
                .root
                .join(format!(".{}.{}.tmp", Self::file_stem(user_id), Uuid::new_v4()));

            let mut options = OpenOptions::new();
            options.create_new(true).write(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }

            let mut file = options.open(&tmp_path).map_err(|e| map_io(&tmp_path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| map_io(&tmp_path, e))?;
            file.sync_data().map_err(|e| map_io(&tmp_path, e))?;
            drop(file);

            if let Err(e) = fs::rename(&tmp_path, &path) {
                let _ = fs::remove_file(&tmp_path);
                return Err(map_io(&path, e));
            }

            // Set restrictive permissions (Unix only)
            #[cfg(unix)]
            {
                let mut perms = fs::metadata(&path).map_err(|e| map_io(&path, e))?.permissions();
                perms.set_mode(0o600);
                fs::set_permissions(&path, perms).map_err(|e| map_io(&path, e))?;
            }

            Ok(())
        })
    }

    fn remove_blocking(&self, user_id: &str) -> Result<()> {
        let path = self.session_path(user_id);
        if !path.exists() {
            return Ok(());
        }

        self.with_lock(user_id, || match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(&path, e)),
        })
    }
}

#[async_trait]
impl SessionStore for FileStore {
    #[instrument(skip(self))]
    async fn load(&self, user_id: &str) -> Result<Option<Session>> {
        let store = self.clone();
        let user_id = user_id.to_string();
        let session = run_blocking(move || store.read_blocking(&user_id)).await?;
        debug!(found = session.is_some(), "Loaded persisted session");
        Ok(session)
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id()))]
    async fn save(&self, session: &Session) -> Result<()> {
        let store = self.clone();
        let session = session.clone();
        run_blocking(move || store.write_blocking(&session)).await?;
        debug!("Persisted session");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear(&self, user_id: &str) -> Result<()> {
        let store = self.clone();
        let user_id = user_id.to_string();
        run_blocking(move || store.remove_blocking(&user_id)).await?;
        debug!("Cleared persisted session");
        Ok(())
    }
}

/// File locking blocks, so keep it off the async worker threads.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        Error::Storage(StorageError::Io {
            path: String::new(),
            message: format!("storage task failed: {}", e),
        })
    })?
}
