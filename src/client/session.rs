use super::ClientError;

/// Authentication context passed to every client call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    tenant_id: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_in(token: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.login(token, tenant_id);
        session
    }

    pub fn login(&mut self, token: impl Into<String>, tenant_id: impl Into<String>) {
        self.token = Some(token.into());
        self.tenant_id = Some(tenant_id.into());
    }

    pub fn logout(&mut self) {
        self.token = None;
        self.tenant_id = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.tenant_id.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Token and tenant, or `NotLoggedIn`.
    pub(crate) fn credentials(&self) -> Result<(&str, &str), ClientError> {
        match (self.token(), self.tenant_id()) {
            (Some(token), Some(tenant)) => Ok((token, tenant)),
            _ => Err(ClientError::NotLoggedIn),
        }
    }
}
