use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::auth::Credentials;
use crate::clock::{deadline_after, Clock};
use crate::{KodoConfig, KodoError, KodoResult};

/// Slack added to the planned size when limiting upload size
pub const SIZE_SLACK: u64 = 1000;

/// Constraints an upload token grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutPolicy {
    /// Target object name, if the token is bound to one
    pub key: Option<String>,

    pub bucket: String,

    /// Absolute expiry as unix seconds
    pub deadline: i64,

    /// Largest accepted upload in bytes
    pub fsize_limit: Option<u64>,

    /// Allowed content types, e.g. `image/*`
    pub mime_limit: Option<String>,

    /// Reject uploads that would overwrite an existing key
    pub insert_only: bool,

    /// Let the store sniff the content type
    pub detect_mime: bool,
}

/// Wire layout of the policy. Field order is fixed, so the encoding is canonical.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyDocument<'a> {
    scope: String,
    deadline: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    insert_only: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fsize_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_limit: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detect_mime: Option<u8>,
}

impl PutPolicy {
    /// Policy for `bucket`, optionally bound to `key`
    pub fn new<B: Into<String>>(bucket: B, key: Option<String>, deadline: i64) -> Self {
        Self {
            key,
            bucket: bucket.into(),
            deadline,
            fsize_limit: None,
            mime_limit: None,
            insert_only: false,
            detect_mime: false,
        }
    }

    /// `bucket` or `bucket:key`
    pub fn scope(&self) -> String {
        match &self.key {
            Some(key) => format!("{}:{}", self.bucket, key),
            None => self.bucket.clone(),
        }
    }

    /// Limit the upload to `planned_size` plus slack
    pub fn with_planned_size(mut self, planned_size: u64) -> Self {
        self.fsize_limit = Some(planned_size.saturating_add(SIZE_SLACK));
        self
    }

    pub fn with_mime_limit<S: Into<String>>(mut self, mime_limit: S) -> Self {
        self.mime_limit = Some(mime_limit.into());
        self
    }

    pub fn insert_only(mut self) -> Self {
        self.insert_only = true;
        self
    }

    pub fn detect_mime(mut self) -> Self {
        self.detect_mime = true;
        self
    }

    /// Reject policies that are already expired or too small to hold anything
    pub fn validate(&self, now: i64) -> KodoResult<()> {
        if self.deadline <= now {
            return Err(KodoError::signing(format!(
                "policy deadline {} is not after {}",
                self.deadline, now
            )));
        }
        if let Some(limit) = self.fsize_limit {
            if limit < SIZE_SLACK {
                return Err(KodoError::signing(format!(
                    "fsize limit {} is below the {} byte slack",
                    limit, SIZE_SLACK
                )));
            }
        }
        Ok(())
    }

    /// Canonical JSON encoding that gets signed
    pub fn to_json(&self) -> KodoResult<String> {
        let document = PolicyDocument {
            scope: self.scope(),
            deadline: self.deadline,
            insert_only: self.insert_only.then_some(1),
            fsize_limit: self.fsize_limit,
            mime_limit: self.mime_limit.as_deref(),
            detect_mime: self.detect_mime.then_some(1),
        };
        Ok(serde_json::to_string(&document)?)
    }

    /// Sign the policy into an upload token
    pub fn to_token(&self, credentials: &Credentials) -> KodoResult<UploadToken> {
        let json = self.to_json()?;
        Ok(UploadToken(credentials.sign_with_data(json.as_bytes())?))
    }
}

/// Signed upload token derived from a [`PutPolicy`]
#[derive(Debug, PartialEq, Eq)]
pub struct UploadToken(String);

impl UploadToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// `Authorization` header value for upload host requests
    pub fn authorization(&self) -> String {
        format!("UpToken {}", self.0)
    }
}

impl std::fmt::Display for UploadToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues upload tokens for the configured bucket.
///
/// Tokens are insert-only with MIME detection on and no content-type
/// restriction. Issuing never touches the network.
#[derive(Clone)]
pub struct PutPolicyIssuer {
    config: Arc<KodoConfig>,
    clock: Arc<dyn Clock>,
}

impl PutPolicyIssuer {
    pub fn new(config: Arc<KodoConfig>, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Default policy for `key` expiring `expires_in` from now
    pub fn policy(&self, key: &str, expires_in: Duration) -> KodoResult<PutPolicy> {
        let deadline = deadline_after(self.clock.as_ref(), expires_in)?;
        Ok(PutPolicy::new(&self.config.bucket, Some(key.to_string()), deadline)
            .insert_only()
            .detect_mime())
    }

    /// Token for `key` with no size limit
    pub fn issue(&self, key: &str, expires_in: Duration) -> KodoResult<UploadToken> {
        let policy = self.policy(key, expires_in)?;
        self.sign(&policy)
    }

    /// Token for `key` limited to `planned_size` plus slack
    pub fn issue_for_size(&self, key: &str, expires_in: Duration, planned_size: u64) -> KodoResult<UploadToken> {
        let policy = self.policy(key, expires_in)?.with_planned_size(planned_size);
        self.sign(&policy)
    }

    /// Validate and sign an arbitrary policy
    pub fn sign(&self, policy: &PutPolicy) -> KodoResult<UploadToken> {
        let credentials = Credentials::new(&self.config.access_key, &self.config.secret_key)?;
        policy.validate(self.clock.unix_now())?;
        policy.to_token(&credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::urlsafe_base64;
    use crate::clock::FixedClock;

    fn issuer(secret: &str) -> PutPolicyIssuer {
        let config = KodoConfig::new("photos", "cdn.example.com").with_credentials("ak", secret);
        PutPolicyIssuer::new(Arc::new(config), Arc::new(FixedClock::at_unix(1_700_000_000)))
    }

    #[test]
    fn test_policy_defaults() {
        let policy = issuer("sk").policy("a/b.png", Duration::from_secs(600)).unwrap();
        assert_eq!(policy.scope(), "photos:a/b.png");
        assert_eq!(policy.deadline, 1_700_000_600);
        assert!(policy.insert_only);
        assert!(policy.detect_mime);
        assert_eq!(policy.mime_limit, None);
        assert_eq!(policy.fsize_limit, None);
    }

    #[test]
    fn test_canonical_json() {
        let policy = issuer("sk")
            .policy("k", Duration::from_secs(10))
            .unwrap()
            .with_planned_size(24);
        assert_eq!(
            policy.to_json().unwrap(),
            r#"{"scope":"photos:k","deadline":1700000010,"insertOnly":1,"fsizeLimit":1024,"detectMime":1}"#
        );
    }

    #[test]
    fn test_token_is_deterministic() {
        let a = issuer("sk").issue("k", Duration::from_secs(60)).unwrap();
        let b = issuer("sk").issue("k", Duration::from_secs(60)).unwrap();
        assert_eq!(a, b);

        let c = issuer("other").issue("k", Duration::from_secs(60)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_token_embeds_encoded_policy() {
        let issuer = issuer("sk");
        let policy = issuer.policy("k", Duration::from_secs(60)).unwrap();
        let token = issuer.sign(&policy).unwrap();
        let encoded = token.as_str().rsplit(':').next().unwrap();
        assert_eq!(encoded, urlsafe_base64(policy.to_json().unwrap()));
        assert!(token.authorization().starts_with("UpToken ak:"));
    }

    #[test]
    fn test_missing_secret_fails() {
        let err = issuer("").issue("k", Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, KodoError::Signing { .. }));
    }

    #[test]
    fn test_deadline_must_be_in_future() {
        let err = issuer("sk").issue("k", Duration::ZERO).unwrap_err();
        assert!(matches!(err, KodoError::Signing { .. }));
    }

    #[test]
    fn test_size_limit_includes_slack() {
        let policy = PutPolicy::new("b", None, 10).with_planned_size(0);
        assert_eq!(policy.fsize_limit, Some(SIZE_SLACK));
        assert!(policy.validate(0).is_ok());

        let mut tiny = policy.clone();
        tiny.fsize_limit = Some(10);
        assert!(tiny.validate(0).is_err());
    }
}
