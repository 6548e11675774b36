use serde::{Deserialize, Serialize};

/// Caller identity verified by the external identity provider.
///
/// Castellan never checks credentials; it trusts the subject handed over by
/// the provider and resolves it to an admin record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    subject: String,
    email: Option<String>,
}

impl VerifiedIdentity {
    /// Creates an identity from provider data.
    #[must_use]
    pub fn new(subject: impl Into<String>, email: Option<String>) -> Self {
        Self {
            subject: subject.into(),
            email,
        }
    }

    /// Returns the stable subject, which is the admin identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the email, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}
