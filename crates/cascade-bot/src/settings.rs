//! Process configuration, read from flags or the environment.

use std::path::PathBuf;

use clap::Parser;
use secrecy::SecretString;

/// Webhook-driven cascade merge bot for Bitbucket Cloud.
#[derive(Clone, Parser)]
#[command(name = "cascaded", version, about)]
pub struct Settings {
    /// Port the webhook listener binds to.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Shared secret checked against the X-Webhook-Token header.
    /// Unset or empty disables the check.
    #[arg(long, env = "TOKEN")]
    pub token: Option<String>,

    /// Bitbucket username the bot acts as.
    #[arg(long, env = "BITBUCKET_USERNAME")]
    pub username: String,

    /// App password for the Bitbucket user.
    /// Stored as `SecretString` for automatic zeroization on drop.
    #[arg(long, env = "BITBUCKET_PASSWORD", hide_env_values = true)]
    pub password: SecretString,

    /// Directory holding one working copy per repository UUID.
    /// Defaults to `cascade-bot` under the system temp directory.
    #[arg(long, env = "SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Capacity of the inbound event queue; events beyond it are
    /// answered with 429 and dropped.
    #[arg(long, default_value_t = 100)]
    pub queue_capacity: usize,
}

impl Settings {
    /// The webhook token, with the empty string treated as unset.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|token| !token.is_empty())
    }

    /// Where per-repository working copies live.
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("cascade-bot"))
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("port", &self.port)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("scratch_dir", &self.scratch_dir)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Settings {
        let mut full = vec!["cascaded", "--username", "bot", "--password", "secret"];
        full.extend_from_slice(args);
        Settings::try_parse_from(full).unwrap()
    }

    #[test]
    fn defaults() {
        let settings = parse(&[]);

        assert_eq!(settings.port, 5000);
        assert_eq!(settings.queue_capacity, 100);
        assert_eq!(settings.token(), None);
        assert!(settings.scratch_dir().ends_with("cascade-bot"));
    }

    #[test]
    fn empty_token_disables_the_check() {
        let settings = parse(&["--token", ""]);
        assert_eq!(settings.token(), None);
    }

    #[test]
    fn explicit_values_win() {
        let settings = parse(&["--port", "8080", "--token", "hunter2", "--queue-capacity", "5"]);

        assert_eq!(settings.port, 8080);
        assert_eq!(settings.token(), Some("hunter2"));
        assert_eq!(settings.queue_capacity, 5);
    }

    #[test]
    fn credentials_are_required() {
        let result = Settings::try_parse_from(["cascaded"]);
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let settings = parse(&["--token", "hunter2"]);
        let output = format!("{settings:?}");

        assert!(output.contains("bot"));
        assert!(output.contains("[redacted]"));
        assert!(!output.contains("secret"));
        assert!(!output.contains("hunter2"));
    }
}
