//! The one active send session: what is being shared and under which policy.
//!
//! All mutation goes through [`SessionState`], whose critical sections are
//! short and never span an `.await`.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::send::archive::{self, SkippedInput, TempArchive};

/// Identifies one started session so timers and teardown cannot touch a
/// session started later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Access rules applied to a share.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Maximum downloads (0 = unlimited)
    pub limit: u32,
    pub password: Option<String>,
    /// Lifetime from start. `None` or zero means no expiry.
    pub ttl: Option<Duration>,
}

impl SessionPolicy {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no files or folders given to share")]
    NoInput,
    #[error("cannot read {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to build archive: {0:#}")]
    Archive(anyhow::Error),
}

/// Why the download gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateDenied {
    #[error("this share has expired")]
    Expired,
    #[error("download limit reached")]
    LimitExceeded,
    #[error("no active share")]
    Inactive,
}

/// Permission for exactly one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrant {
    pub session: SessionId,
    /// 1-based position of this download
    pub sequence: u32,
    pub limit: u32,
}

impl SlotGrant {
    /// Whether this grant used up the last allowed download.
    pub fn is_final(&self) -> bool {
        self.limit > 0 && self.sequence == self.limit
    }
}

/// Read-only view of the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub filename: String,
    pub size: u64,
    pub limit: u32,
    pub current: u32,
    pub has_password: bool,
    pub expiry: Option<SystemTime>,
}

impl SessionInfo {
    pub fn expiry_unix_secs(&self) -> u64 {
        self.expiry
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs())
    }
}

/// Everything the download handler needs to open and describe the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub path: PathBuf,
    pub display_name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Rejected,
    /// The share has no password
    NotRequired,
    /// Password matched; the token unlocks `/download` for this session
    Granted(String),
}

/// What a download request presented to prove it knows the password.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadCredentials {
    pub code: Option<String>,
    pub access_token: Option<String>,
}

struct Session {
    id: SessionId,
    target: PathBuf,
    display_name: String,
    size: u64,
    limit: u32,
    password: Option<String>,
    expiry: Option<SystemTime>,
    downloads: u32,
    archive: Option<TempArchive>,
    access_token: Option<String>,
}

impl Session {
    fn password_matches(&self, code: &str) -> bool {
        self.password.as_deref().map_or(true, |password| password == code)
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            filename: self.display_name.clone(),
            size: self.size,
            limit: self.limit,
            current: self.downloads,
            has_password: self.password.is_some(),
            expiry: self.expiry,
        }
    }

    /// Release owned resources. Runs outside the state lock.
    fn teardown(mut self) {
        if let Some(archive) = self.archive.take() {
            let path = archive.path().to_path_buf();
            match archive.remove() {
                Ok(()) => tracing::debug!(path = %path.display(), "removed temp archive"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to remove temp archive")
                }
            }
        }
        tracing::info!(session = %self.id, downloads = self.downloads, "session stopped");
    }
}

/// Shared handle to the current send session, if any.
#[derive(Clone, Default)]
pub struct SessionState {
    inner: Arc<Mutex<Option<Session>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Session lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Start sharing `paths`, replacing any active session.
    ///
    /// Several paths or a single directory are zipped first on the blocking
    /// pool. A single file is served in place.
    pub async fn start(
        &self,
        paths: Vec<PathBuf>,
        policy: SessionPolicy,
    ) -> Result<SessionInfo, SessionError> {
        if paths.is_empty() {
            return Err(SessionError::NoInput);
        }
        self.stop();

        // A failed lookup falls through to the single-file stat below
        let needs_archive = paths.len() > 1
            || tokio::fs::metadata(&paths[0])
                .await
                .is_ok_and(|metadata| metadata.is_dir());
        let (target, display_name, temp) = if needs_archive {
            let output = tokio::task::spawn_blocking(move || archive::build_archive(&paths))
                .await
                .map_err(|err| SessionError::Archive(anyhow::Error::new(err)))?
                .map_err(SessionError::Archive)?;
            log_skipped(&output.skipped);
            tracing::info!(
                entries = output.entries,
                name = %output.display_name,
                "archive ready"
            );
            (
                output.archive.path().to_path_buf(),
                output.display_name,
                Some(output.archive),
            )
        } else {
            let path = paths[0].clone();
            let name = file_display_name(&path);
            (path, name, None)
        };

        // On error `temp` is dropped here and removes the archive
        let size = tokio::fs::metadata(&target)
            .await
            .map_err(|source| SessionError::Stat {
                path: target.clone(),
                source,
            })?
            .len();

        let password = policy.password.filter(|p| !p.is_empty());
        let expiry = policy
            .ttl
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| SystemTime::now() + ttl);

        let session = Session {
            id: SessionId::new(),
            target,
            display_name,
            size,
            limit: policy.limit,
            password,
            expiry,
            downloads: 0,
            archive: temp,
            access_token: None,
        };
        let info = session.info();

        let replaced = self.lock().replace(session);
        if let Some(replaced) = replaced {
            // Lost a race with a concurrent start
            replaced.teardown();
        }

        tracing::info!(
            session = %info.id,
            file = %info.filename,
            size = info.size,
            limit = info.limit,
            "session started"
        );
        Ok(info)
    }

    /// True when the share has no password or `code` equals it exactly.
    pub fn authorize(&self, code: &str) -> bool {
        self.lock()
            .as_ref()
            .map_or(false, |session| session.password_matches(code))
    }

    /// Check `code` and hand out the session's access token on success.
    pub fn verify(&self, code: &str) -> Verification {
        let mut guard = self.lock();
        let Some(session) = guard.as_mut() else {
            return Verification::Rejected;
        };
        if session.password.is_none() {
            return Verification::NotRequired;
        }
        if !session.password_matches(code) {
            return Verification::Rejected;
        }
        let token = session
            .access_token
            .get_or_insert_with(|| Uuid::new_v4().simple().to_string())
            .clone();
        Verification::Granted(token)
    }

    /// Whether a download request may proceed to the gate. Without a session
    /// the gate itself rejects, so this returns true.
    pub fn is_authorized(&self, credentials: &DownloadCredentials) -> bool {
        let guard = self.lock();
        let Some(session) = guard.as_ref() else {
            return true;
        };
        if session.password.is_none() {
            return true;
        }
        if let Some(code) = credentials.code.as_deref() {
            if session.password_matches(code) {
                return true;
            }
        }
        match (&session.access_token, &credentials.access_token) {
            (Some(issued), Some(presented)) => issued == presented,
            _ => false,
        }
    }

    pub fn try_consume_slot(&self) -> Result<SlotGrant, GateDenied> {
        self.try_consume_slot_at(SystemTime::now())
    }

    /// Check expiry and limit and take a download slot in one step.
    pub fn try_consume_slot_at(&self, now: SystemTime) -> Result<SlotGrant, GateDenied> {
        let mut guard = self.lock();
        let session = guard.as_mut().ok_or(GateDenied::Inactive)?;

        if session.expiry.is_some_and(|expiry| now >= expiry) {
            return Err(GateDenied::Expired);
        }
        if session.limit > 0 && session.downloads >= session.limit {
            return Err(GateDenied::LimitExceeded);
        }

        session.downloads += 1;
        Ok(SlotGrant {
            session: session.id,
            sequence: session.downloads,
            limit: session.limit,
        })
    }

    pub fn target(&self) -> Option<DeliveryTarget> {
        self.lock().as_ref().map(|session| DeliveryTarget {
            path: session.target.clone(),
            display_name: session.display_name.clone(),
            size: session.size,
        })
    }

    pub fn info(&self) -> Option<SessionInfo> {
        self.lock().as_ref().map(Session::info)
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.lock().as_ref().map(|session| session.id)
    }

    /// Stop whatever session is active. Returns whether one was running.
    pub fn stop(&self) -> bool {
        let taken = self.lock().take();
        match taken {
            Some(session) => {
                session.teardown();
                true
            }
            None => false,
        }
    }

    /// Stop the session only if `id` is still the active one.
    pub fn stop_session(&self, id: SessionId) -> bool {
        let taken = {
            let mut guard = self.lock();
            if guard.as_ref().is_some_and(|session| session.id == id) {
                guard.take()
            } else {
                None
            }
        };
        match taken {
            Some(session) => {
                session.teardown();
                true
            }
            None => false,
        }
    }
}

fn file_display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string())
}

fn log_skipped(skipped: &[SkippedInput]) {
    if skipped.is_empty() {
        return;
    }
    tracing::warn!("{} input(s) left out of the archive", skipped.len());
    for item in skipped {
        tracing::debug!(path = %item.path.display(), reason = %item.reason, "skipped");
    }
}
