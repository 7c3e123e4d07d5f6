//! HMAC-SHA1 request signing.
//!
//! Every credential the store accepts is derived from the same primitive:
//!
//! ```text
//! Sign(data) = AccessKey + ":" + UrlSafeBase64(HMAC-SHA1(SecretKey, data))
//! ```
//!
//! Upload tokens sign the encoded put policy, management requests sign the
//! request path and body, and private download URLs sign the URL itself.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::{KodoError, KodoResult};

type HmacSha1 = Hmac<Sha1>;

/// URL-safe base64 as used by the store for tokens and encoded entries
pub fn urlsafe_base64<T: AsRef<[u8]>>(data: T) -> String {
    URL_SAFE.encode(data)
}

/// Encode `bucket:key` for management paths
pub fn encoded_entry(bucket: &str, key: &str) -> String {
    urlsafe_base64(format!("{}:{}", bucket, key))
}

/// Access/secret key pair
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Build credentials, rejecting empty keys
    pub fn new<A: Into<String>, S: Into<String>>(access_key: A, secret_key: S) -> KodoResult<Self> {
        let access_key = access_key.into();
        let secret_key = secret_key.into();

        if access_key.is_empty() {
            return Err(KodoError::signing("access key is missing"));
        }
        if secret_key.is_empty() {
            return Err(KodoError::signing("secret key is missing"));
        }

        Ok(Self {
            access_key,
            secret_key,
        })
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// `AccessKey:Signature` over raw data
    pub fn sign(&self, data: &[u8]) -> KodoResult<String> {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| KodoError::signing(e.to_string()))?;
        mac.update(data);
        let digest = mac.finalize().into_bytes();
        Ok(format!("{}:{}", self.access_key, urlsafe_base64(digest)))
    }

    /// `AccessKey:Signature:EncodedData`, the upload token layout
    pub fn sign_with_data(&self, data: &[u8]) -> KodoResult<String> {
        let encoded = urlsafe_base64(data);
        let signed = self.sign(encoded.as_bytes())?;
        Ok(format!("{}:{}", signed, encoded))
    }

    /// `Authorization` header value for management requests (rs/rsf hosts).
    ///
    /// The signed string is the path with its query, a newline, and the form
    /// body when there is one.
    pub fn management_token(&self, path_and_query: &str, body: Option<&[u8]>) -> KodoResult<String> {
        let mut data = Vec::with_capacity(path_and_query.len() + 1);
        data.extend_from_slice(path_and_query.as_bytes());
        data.push(b'\n');
        if let Some(body) = body {
            data.extend_from_slice(body);
        }
        Ok(format!("QBox {}", self.sign(&data)?))
    }

    /// Append `e=<deadline>` and `token=<signature>` to a download URL
    pub fn authorize_download_url(&self, url: &str, deadline: i64) -> KodoResult<String> {
        let separator = if url.contains('?') { '&' } else { '?' };
        let url = format!("{}{}e={}", url, separator, deadline);
        let token = self.sign(url.as_bytes())?;
        Ok(format!("{}&token={}", url, token))
    }
}
