//! Session state shared with the HTTP transport.
//!
//! The session holds the bearer token attached to every API request. It is
//! passed explicitly to [`ApiClient`](crate::api::ApiClient) rather than read
//! from a global, so the transport and the form controllers can be tested in
//! isolation. A session can optionally be backed by a token file, which plays
//! the role a browser's local storage plays for a web panel.

use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Receives the "send the user to the login page" signal.
///
/// Called by the transport after a 401 response has cleared the session.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, login_url: &str);
}

/// Bearer-token session with optional file persistence.
///
/// Debug output never includes the token.
pub struct SessionContext {
    token: RwLock<Option<SecretString>>,
    store: Option<PathBuf>,
}

impl SessionContext {
    /// In-memory session, optionally seeded with a token.
    pub fn new(token: Option<SecretString>) -> Self {
        Self {
            token: RwLock::new(token),
            store: None,
        }
    }

    /// Session backed by a token file.
    ///
    /// A missing or blank file yields an unauthenticated session. Read errors
    /// other than "not found" are propagated.
    pub fn with_store(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let token = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(SecretString::from(trimmed.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };
        tracing::debug!(
            path = %path.display(),
            authenticated = token.is_some(),
            "Loaded session store"
        );
        Ok(Self {
            token: RwLock::new(token),
            store: Some(path),
        })
    }

    /// Current bearer token, if any.
    pub fn token(&self) -> Option<SecretString> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Replace the token in memory and, when file-backed, on disk.
    pub fn set_token(&self, token: SecretString) -> std::io::Result<()> {
        if let Some(path) = &self.store {
            write_token_file(path, token.expose_secret())?;
        }
        match self.token.write() {
            Ok(mut guard) => *guard = Some(token),
            Err(poisoned) => *poisoned.into_inner() = Some(token),
        }
        Ok(())
    }

    /// Forget the token. The token file is removed if present.
    ///
    /// Removal failures are logged; the in-memory token is cleared regardless.
    pub fn clear(&self) {
        match self.token.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        if let Some(path) = &self.store {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed session token file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove session token file")
                }
            }
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("token", &self.token().map(|_| "[REDACTED]"))
            .field("store", &self.store)
            .finish()
    }
}

fn write_token_file(path: &Path, token: &str) -> std::io::Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    // Token file is user-only on Unix from the moment it exists
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;

    // `mode` only applies on creation; tighten a file left by an older run
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        if perms.mode() & 0o777 != 0o600 {
            perms.set_mode(0o600);
            file.set_permissions(perms)?;
        }
    }

    file.write_all(token.as_bytes())?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("formdesk_session_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("token")
    }

    #[test]
    fn test_new_without_token_is_anonymous() {
        let session = SessionContext::new(None);
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
    }

    #[test]
    fn test_clear_forgets_token() {
        let session = SessionContext::new(Some(SecretString::from("abc".to_string())));
        assert!(session.is_authenticated());
        session.clear();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_store_round_trip_and_clear_removes_file() {
        let path = temp_path("round_trip");
        let _ = std::fs::remove_file(&path);

        let session = SessionContext::with_store(&path).unwrap();
        assert!(!session.is_authenticated());

        session
            .set_token(SecretString::from("tok-123".to_string()))
            .unwrap();
        assert!(path.exists());

        let reloaded = SessionContext::with_store(&path).unwrap();
        assert_eq!(
            reloaded.token().map(|t| t.expose_secret().to_string()),
            Some("tok-123".to_string())
        );

        reloaded.clear();
        assert!(!path.exists());
        assert!(!reloaded.is_authenticated());
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_user_only() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path("permissions");
        let _ = std::fs::remove_file(&path);
        let session = SessionContext::with_store(&path).unwrap();
        session
            .set_token(SecretString::from("tok-1".to_string()))
            .unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // A pre-existing world-readable file is tightened before the write
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        session
            .set_token(SecretString::from("tok-2".to_string()))
            .unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "tok-2");

        session.clear();
    }

    #[test]
    fn test_blank_store_file_is_anonymous() {
        let path = temp_path("blank");
        std::fs::write(&path, "  \n").unwrap();
        let session = SessionContext::with_store(&path).unwrap();
        assert!(!session.is_authenticated());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_debug_masks_token() {
        let session = SessionContext::new(Some(SecretString::from("super-secret".to_string())));
        let debug_output = format!("{:?}", session);
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
