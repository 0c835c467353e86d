//! Session context: who is logged in, persisted between invocations.
//!
//! The session is an explicit value passed to every handler. It is loaded
//! once per command, saved by `login`, and cleared by `logout`. A loaded
//! session only counts once `resume` has matched its token against the
//! users table; the stored user row, not the file, decides the role.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::access::Permissions;
use super::error::{Result, TrackerError};
use super::repo::UserRepo;
use super::types::{Role, User};

/// The logged-in user as stored in the session file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub sap: i64,
    pub name: String,
    pub username: String,
    pub role: Role,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            sap: user.sap,
            name: user.name.clone(),
            username: user.username.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub issued_at: String,
}

impl Session {
    /// Starts a session for a verified user.
    ///
    /// The token binds the SAP number and issue time to the stored password
    /// digest, so a password change ends every open session.
    #[must_use]
    pub fn start(user: &User, password_hash: &str) -> Self {
        let issued_at = Utc::now().to_rfc3339();
        Self {
            token: session_token(user.sap, &issued_at, password_hash),
            user: SessionUser::from(user),
            issued_at,
        }
    }

    /// Checks a loaded session against the database.
    ///
    /// The user is reloaded by SAP and replaces whatever the file says.
    ///
    /// # Errors
    /// Returns `NotLoggedIn` if the user is gone or the token does not match.
    pub fn resume(self, conn: &Connection) -> Result<Self> {
        let users = UserRepo::new(conn);
        let Some(user) = users.find_by_sap(self.user.sap)? else {
            warn!(sap = self.user.sap, "session user no longer exists");
            return Err(TrackerError::NotLoggedIn);
        };
        let Some(hash) = users.password_hash(user.sap)? else {
            return Err(TrackerError::NotLoggedIn);
        };
        if session_token(user.sap, &self.issued_at, &hash) != self.token {
            warn!(sap = user.sap, "session token rejected");
            return Err(TrackerError::NotLoggedIn);
        }
        Ok(Self {
            user: SessionUser::from(&user),
            ..self
        })
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.user.role
    }

    /// Capability table for this session's role.
    #[must_use]
    pub fn permissions(&self) -> Permissions {
        Permissions::for_role(self.user.role)
    }
}

/// Load/save/clear of the session file.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current session, if any.
    ///
    /// A corrupt file is treated as logged out.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    /// Reads the session or fails with `NotLoggedIn`.
    ///
    /// # Errors
    /// Returns `NotLoggedIn` when no session is stored.
    pub fn require(&self) -> Result<Session> {
        self.load()?.ok_or(TrackerError::NotLoggedIn)
    }

    /// Writes the session using temp file + rename.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(serde_json::to_string_pretty(session)?.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &self.path)?;
        debug!(user = %session.user.username, "session saved");
        Ok(())
    }

    /// Removes the session. Returns whether one existed.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }
}

/// Password digest stored in the users table, salted with the SAP number.
#[must_use]
pub fn hash_password(sap: i64, password: &str) -> String {
    hex_digest(&[
        b"worktrack:".as_slice(),
        sap.to_string().as_bytes(),
        b":".as_slice(),
        password.as_bytes(),
    ])
}

#[must_use]
pub fn verify_password(sap: i64, password: &str, stored_hash: &str) -> bool {
    hash_password(sap, password) == stored_hash
}

fn session_token(sap: i64, issued_at: &str, password_hash: &str) -> String {
    hex_digest(&[
        b"session:".as_slice(),
        sap.to_string().as_bytes(),
        b":".as_slice(),
        issued_at.as_bytes(),
        b":".as_slice(),
        password_hash.as_bytes(),
    ])
}

fn hex_digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
