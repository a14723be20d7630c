//! Seam to the external auth service. Only token lookup is consumed here;
//! login, registration and verification live with the auth collaborator.

/// Supplies the bearer token attached to agent requests.
pub trait TokenProvider: Send + Sync {
    /// Current access token, if the user is signed in.
    fn get_token(&self) -> Option<String>;
}

/// Fixed token, for service accounts and tests.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn get_token(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.clone())
        }
    }
}
