use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::store::UrlFetcher;
use crate::url::UrlSigner;
use crate::{DownloadOptions, KodoError, KodoResult};

/// Image details reported by the store, e.g. `width`, `height`, `format`
pub type ImageMetadata = BTreeMap<String, serde_json::Value>;

/// Store-side directive that returns image details as JSON
pub const IMAGE_INFO_FOP: &str = "imageInfo";

/// Best-effort image metadata lookup through the `imageInfo` directive.
///
/// Any failure yields an empty map.
#[derive(Clone)]
pub struct ImageInfoProbe {
    signer: UrlSigner,
    fetcher: Arc<dyn UrlFetcher>,
}

impl ImageInfoProbe {
    pub fn new(signer: UrlSigner, fetcher: Arc<dyn UrlFetcher>) -> Self {
        Self { signer, fetcher }
    }

    /// Only image content types are worth probing
    pub fn accepts(content_type: Option<&str>) -> bool {
        content_type.is_some_and(|ct| ct.starts_with("image/"))
    }

    pub async fn metadata(&self, key: &str) -> ImageMetadata {
        match self.lookup(key).await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("imageInfo lookup for {} failed: {}", key, e);
                ImageMetadata::new()
            }
        }
    }

    async fn lookup(&self, key: &str) -> KodoResult<ImageMetadata> {
        let url = self
            .signer
            .build_url(key, &DownloadOptions::new().with_fop(IMAGE_INFO_FOP))?;

        match self.fetcher.get_json(&url, key).await? {
            serde_json::Value::Object(fields) => Ok(fields.into_iter().collect()),
            other => Err(KodoError::invalid(format!("unexpected imageInfo response: {}", other))),
        }
    }
}
