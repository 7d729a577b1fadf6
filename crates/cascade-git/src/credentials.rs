//! Remote credentials passed to libgit2 whenever origin is contacted.

use git2::{Cred, RemoteCallbacks};
use secrecy::{ExposeSecret, SecretString};

/// Username/app-password pair used for HTTPS basic auth against the remote.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    /// Stored as `SecretString` for automatic zeroization on drop.
    password: SecretString,
}

impl Credentials {
    /// Create a new credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Build remote callbacks that answer every credential request with
    /// this pair. Local-path remotes never invoke the callback.
    #[must_use]
    pub fn callbacks(&self) -> RemoteCallbacks<'static> {
        let username = self.username.clone();
        let password = self.password.clone();

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, _username_from_url, _allowed| {
            Cred::userpass_plaintext(&username, password.expose_secret())
        });
        callbacks
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}
