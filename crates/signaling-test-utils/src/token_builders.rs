//! Builder patterns for test bearer tokens.
//!
//! Provides a fluent API for minting HS256 client tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for creating test client tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("doc-1")
///     .with_role("doctor")
///     .with_name("Dr. Who")
///     .expires_in(3600)
///     .sign(TEST_JWT_SECRET);
/// ```
pub struct TestTokenBuilder {
    user_id: String,
    role: String,
    name: Option<String>,
    email: Option<String>,
    exp: i64,
    iat: Option<i64>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults (patient, valid for one hour).
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            user_id: "test-user".to_string(),
            role: "patient".to_string(),
            name: Some("Test User".to_string()),
            email: None,
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: Some(now.timestamp()),
        }
    }

    /// A doctor token.
    pub fn doctor(user_id: &str, name: &str) -> Self {
        Self::new()
            .for_user(user_id)
            .with_role("doctor")
            .with_name(name)
    }

    /// A patient token.
    pub fn patient(user_id: &str, name: &str) -> Self {
        Self::new()
            .for_user(user_id)
            .with_role("patient")
            .with_name(name)
    }

    /// An admin token.
    pub fn admin(user_id: &str) -> Self {
        Self::new()
            .for_user(user_id)
            .with_role("admin")
            .with_name("Admin")
    }

    /// Set the user id
    pub fn for_user(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }

    /// Set the role claim
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    /// Set the display name claim
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Drop the display name claim
    pub fn without_name(mut self) -> Self {
        self.name = None;
        self
    }

    /// Set the email claim
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = Some(timestamp);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut user = Map::new();
        user.insert("id".to_string(), json!(self.user_id));
        user.insert("role".to_string(), json!(self.role));
        if let Some(name) = self.name {
            user.insert("name".to_string(), json!(name));
        }
        if let Some(email) = self.email {
            user.insert("email".to_string(), json!(email));
        }

        let mut claims = json!({
            "user": user,
            "exp": self.exp,
        });
        if let Some(iat) = self.iat {
            claims["iat"] = json!(iat);
        }
        claims
    }

    /// Build and sign the claims with HS256.
    pub fn sign(self, secret: &str) -> String {
        sign_claims(&self.build(), secret)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sign arbitrary claims with HS256.
pub fn sign_claims(claims: &Value, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HS256 signing should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_valid_claims() {
        let claims = TestTokenBuilder::doctor("doc-1", "Dr. Who").build();

        assert_eq!(claims["user"]["id"], "doc-1");
        assert_eq!(claims["user"]["role"], "doctor");
        assert_eq!(claims["user"]["name"], "Dr. Who");
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
        assert!(claims["iat"].is_i64());
    }

    #[test]
    fn test_builder_optional_claims() {
        let claims = TestTokenBuilder::new()
            .without_name()
            .with_email("p@example.com")
            .build();

        assert!(claims["user"].get("name").is_none());
        assert_eq!(claims["user"]["email"], "p@example.com");
    }

    #[test]
    fn test_sign_produces_three_part_token() {
        let token = TestTokenBuilder::default().sign("secret");
        assert_eq!(token.split('.').count(), 3);
    }
}
