//! Download URL composition.
//!
//! The query part is chosen in this order:
//!
//! 1. a `fop` directive, used verbatim and never combined with anything else
//! 2. `attname=<filename or key>` for attachments
//! 3. `response-content-disposition=inline`, plus `response-content-type`
//!    when an override is given, for inline responses
//!
//! Public buckets get `protocol://domain/key?query`. Private buckets get the
//! same URL with an expiry and an HMAC token appended.

use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::auth::Credentials;
use crate::clock::{deadline_after, Clock};
use crate::{Disposition, DownloadOptions, KodoConfig, KodoResult};

/// Everything except unreserved characters is escaped, including `/`
const COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a single path segment or query value
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT_ENCODE_SET).to_string()
}

/// Encode each `/`-separated segment of `key`, keeping the separators
pub fn encode_key(key: &str) -> String {
    key.split('/').map(encode_component).collect::<Vec<_>>().join("/")
}

/// Query payload for `options`, if any
pub fn compose_query(key: &str, options: &DownloadOptions) -> Option<String> {
    if let Some(fop) = options.fop.as_deref().filter(|fop| !fop.is_empty()) {
        return Some(fop.to_string());
    }

    match options.disposition {
        Some(Disposition::Attachment) => {
            let filename = options
                .filename
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or(key);
            Some(format!("attname={}", encode_component(filename)))
        }
        Some(Disposition::Inline) => {
            let mut params = vec!["response-content-disposition=inline".to_string()];
            if let Some(content_type) = options.content_type.as_deref().filter(|ct| !ct.is_empty()) {
                params.push(format!("response-content-type={}", encode_component(content_type)));
            }
            Some(params.join("&"))
        }
        None => None,
    }
}

/// Builds read URLs for the configured bucket
#[derive(Clone)]
pub struct UrlSigner {
    config: Arc<KodoConfig>,
    clock: Arc<dyn Clock>,
}

impl UrlSigner {
    pub fn new(config: Arc<KodoConfig>, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Build a read URL for `key`.
    ///
    /// Private buckets need a secret key; without one this fails before any
    /// network access.
    pub fn build_url(&self, key: &str, options: &DownloadOptions) -> KodoResult<String> {
        let query = compose_query(key, options);
        let base = format!(
            "{}://{}/{}",
            self.config.protocol,
            self.config.domain,
            encode_key(key)
        );
        let url = match query {
            Some(query) => format!("{}?{}", base, query),
            None => base,
        };

        if self.config.public {
            return Ok(url);
        }

        let credentials = Credentials::new(&self.config.access_key, &self.config.secret_key)?;
        let expires_in = options.expires_in.unwrap_or(self.config.url_expires_in);
        let deadline = deadline_after(self.clock.as_ref(), expires_in)?;
        credentials.authorize_download_url(&url, deadline)
    }
}
