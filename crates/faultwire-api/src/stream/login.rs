// ── Login prompt detection ──
//
// Some alarm servers challenge for credentials with plain-text prompts
// before any block is sent. This sub-state machine is fed every raw chunk
// independently of the framing extractor.

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

pub const LINE_TERMINATOR: &str = "\r\n";

/// Progress through the plain-text login exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginState {
    #[default]
    None,
    AwaitingPassword,
    Authenticated,
}

/// Tracks the login exchange for one connection.
#[derive(Debug)]
pub struct LoginTracker {
    username: Option<String>,
    password: Option<SecretString>,
    state: LoginState,
}

impl LoginTracker {
    pub fn new(username: Option<String>, password: Option<SecretString>) -> Self {
        Self {
            username,
            password,
            state: LoginState::None,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    /// Forget any progress, e.g. after the socket drops.
    pub fn reset(&mut self) {
        self.state = LoginState::None;
    }

    /// Scan a raw chunk for prompts and return the bytes to send back.
    ///
    /// Returns an empty vector when nothing needs to be written.
    pub fn observe(&mut self, chunk: &[u8]) -> Vec<u8> {
        if self.state == LoginState::Authenticated {
            return Vec::new();
        }

        let text = String::from_utf8_lossy(chunk).to_ascii_lowercase();
        let mut reply = Vec::new();

        if self.state == LoginState::None && (text.contains("username") || text.contains("login")) {
            match self.username.as_deref() {
                Some(user) if !user.is_empty() => {
                    debug!("username prompt detected, sending username");
                    reply.extend_from_slice(user.as_bytes());
                    reply.extend_from_slice(LINE_TERMINATOR.as_bytes());
                    self.state = LoginState::AwaitingPassword;
                }
                _ => warn!("stream asked for a username but none is configured"),
            }
        }

        if text.contains("password") {
            match self.password.as_ref() {
                Some(password) => {
                    debug!("password prompt detected, sending password");
                    reply.extend_from_slice(password.expose_secret().as_bytes());
                    reply.extend_from_slice(LINE_TERMINATOR.as_bytes());
                    self.state = LoginState::Authenticated;
                    info!("stream login completed");
                }
                None => warn!("stream asked for a password but none is configured"),
            }
        }

        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> LoginTracker {
        LoginTracker::new(Some("nbi".into()), Some(SecretString::from("s3cret".to_string())))
    }

    #[test]
    fn username_then_password() {
        let mut login = tracker();
        assert_eq!(login.observe(b"Welcome\r\nUsername: "), b"nbi\r\n".to_vec());
        assert_eq!(login.state(), LoginState::AwaitingPassword);

        assert_eq!(login.observe(b"PASSWORD:"), b"s3cret\r\n".to_vec());
        assert_eq!(login.state(), LoginState::Authenticated);
    }

    #[test]
    fn login_cue_is_case_insensitive() {
        let mut login = tracker();
        assert_eq!(login.observe(b"LOGIN:"), b"nbi\r\n".to_vec());
    }

    #[test]
    fn prompts_after_authentication_are_ignored() {
        let mut login = tracker();
        login.observe(b"username:");
        login.observe(b"password:");
        assert!(login.observe(b"Last login: yesterday. Password expires soon").is_empty());
    }

    #[test]
    fn username_prompt_is_not_answered_twice() {
        let mut login = tracker();
        login.observe(b"username:");
        assert!(login.observe(b"username:").is_empty());
        assert_eq!(login.state(), LoginState::AwaitingPassword);
    }

    #[test]
    fn both_prompts_in_one_chunk() {
        let mut login = tracker();
        assert_eq!(login.observe(b"Username:\r\nPassword:"), b"nbi\r\ns3cret\r\n".to_vec());
        assert_eq!(login.state(), LoginState::Authenticated);
    }

    #[test]
    fn missing_credentials_are_not_fatal() {
        let mut login = LoginTracker::new(None, None);
        assert!(login.observe(b"Username:").is_empty());
        assert_eq!(login.state(), LoginState::None);
        assert!(login.observe(b"Password:").is_empty());
        assert_eq!(login.state(), LoginState::None);
    }

    #[test]
    fn reset_returns_to_none() {
        let mut login = tracker();
        login.observe(b"username:");
        login.reset();
        assert_eq!(login.state(), LoginState::None);
    }
}
