use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tracing::{info, instrument};

use crate::analyzer::{ImageInfoProbe, ImageMetadata};
use crate::chunks;
use crate::clock::{Clock, SystemClock};
use crate::kodo_store::KodoHttpStore;
use crate::policy::PutPolicyIssuer;
use crate::store::{ListItem, ObjectStore, UrlFetcher};
use crate::upload::ChunkedUploader;
use crate::url::UrlSigner;
use crate::{
    ByteRange, ByteStream, DirectUploadDescriptor, DownloadOptions, KodoConfig, KodoError, KodoResult,
    ObjectMetadata,
};

/// Page size used when walking a prefix listing
pub const LIST_PAGE_LIMIT: usize = 1000;

/// The main storage adapter - this is what services embed.
///
/// Owns the configuration and hands out uploads, read URLs, downloads,
/// listings, and deletions for one bucket. Each call keeps its own state, so
/// one adapter can serve concurrent calls.
#[derive(Clone)]
pub struct KodoAdapter {
    config: Arc<KodoConfig>,
    store: Arc<dyn ObjectStore>,
    fetcher: Arc<dyn UrlFetcher>,
    issuer: PutPolicyIssuer,
    uploader: ChunkedUploader,
    signer: UrlSigner,
}

impl KodoAdapter {
    /// Create an adapter that talks to the provider over HTTP
    pub fn new(config: KodoConfig) -> KodoResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let http = Arc::new(KodoHttpStore::new(config.clone())?);
        Ok(Self::assemble(config, http.clone(), http, Arc::new(SystemClock)))
    }

    /// Create an adapter from `KODO_*` environment variables
    pub fn from_env() -> KodoResult<Self> {
        Self::new(KodoConfig::from_env()?)
    }

    /// Create with custom store and fetcher implementations
    pub fn with_store(
        config: KodoConfig,
        store: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn UrlFetcher>,
    ) -> KodoResult<Self> {
        config.validate()?;
        Ok(Self::assemble(Arc::new(config), store, fetcher, Arc::new(SystemClock)))
    }

    /// Replace the clock used for token deadlines and URL expiry
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self::assemble(self.config, self.store, self.fetcher, clock)
    }

    fn assemble(
        config: Arc<KodoConfig>,
        store: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn UrlFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = PutPolicyIssuer::new(config.clone(), clock.clone());
        let uploader = ChunkedUploader::new(store.clone(), issuer.clone(), &config);
        let signer = UrlSigner::new(config.clone(), clock);

        Self {
            config,
            store,
            fetcher,
            issuer,
            uploader,
            signer,
        }
    }

    /// Upload a stream of unknown length in blocks and finalize it under `key`
    pub async fn upload(
        &self,
        key: &str,
        source: ByteStream,
        content_type: Option<&str>,
    ) -> KodoResult<ObjectMetadata> {
        self.uploader.upload(key, source, content_type, None).await
    }

    /// Upload in-memory data. The token only accepts its length plus slack.
    pub async fn upload_bytes<B: Into<Bytes>>(
        &self,
        key: &str,
        data: B,
        content_type: Option<&str>,
    ) -> KodoResult<ObjectMetadata> {
        let data = data.into();
        let planned_size = data.len() as u64;
        self.uploader
            .upload(key, chunks::bytes_source(data), content_type, Some(planned_size))
            .await
    }

    /// Upload a local file. The token only accepts its size plus slack.
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        key: &str,
        path: P,
        content_type: Option<&str>,
    ) -> KodoResult<ObjectMetadata> {
        let planned_size = tokio::fs::metadata(path.as_ref()).await?.len();
        let source = chunks::file_source(path, self.config.upload_rules.block_size).await?;
        self.uploader
            .upload(key, source, content_type, Some(planned_size))
            .await
    }

    /// Form data for a browser uploading straight to the store.
    ///
    /// The token only accepts `content_length` bytes plus slack, never
    /// overwrites, and lets the store detect the content type.
    #[instrument(skip(self))]
    pub fn direct_upload(
        &self,
        key: &str,
        expires_in: Duration,
        content_length: u64,
    ) -> KodoResult<DirectUploadDescriptor> {
        let token = self.issuer.issue_for_size(key, expires_in, content_length)?;
        Ok(DirectUploadDescriptor::new(
            &self.config.up_host,
            key,
            token.into_string(),
        ))
    }

    /// Read URL for `key`
    #[instrument(skip(self))]
    pub fn url(&self, key: &str, options: &DownloadOptions) -> KodoResult<String> {
        self.signer.build_url(key, options)
    }

    fn attachment_url(&self, key: &str) -> KodoResult<String> {
        self.url(key, &DownloadOptions::attachment())
    }

    /// Stream an object in chunks of the configured download size
    #[instrument(skip(self))]
    pub async fn download_stream(&self, key: &str) -> KodoResult<ByteStream> {
        let url = self.attachment_url(key)?;
        let body = self.fetcher.get_stream(&url, key).await?;
        Ok(chunks::fixed_size(body, self.config.download_chunk_size))
    }

    /// Read a whole object into memory
    #[instrument(skip(self))]
    pub async fn download(&self, key: &str) -> KodoResult<Bytes> {
        let url = self.attachment_url(key)?;
        let mut body = self.fetcher.get_stream(&url, key).await?;

        let mut data = Vec::new();
        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(data))
    }

    /// Read part of an object. Accepts `start..end`, `start..=end`, or a [`ByteRange`].
    #[instrument(skip(self, range))]
    pub async fn download_range<R>(&self, key: &str, range: R) -> KodoResult<Bytes>
    where
        R: TryInto<ByteRange>,
        KodoError: From<<R as TryInto<ByteRange>>::Error>,
    {
        let range: ByteRange = range.try_into()?;
        let url = self.attachment_url(key)?;
        self.fetcher.get_range(&url, key, range).await
    }

    /// Every object whose key starts with `prefix`.
    ///
    /// Fails if the store hands back the marker it was given, since the
    /// listing would never advance.
    #[instrument(skip(self))]
    pub async fn list_prefix(&self, prefix: &str) -> KodoResult<Vec<ListItem>> {
        let mut items = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self.store.list(prefix, marker.as_deref(), LIST_PAGE_LIMIT).await?;
            let next = page.next_marker().map(str::to_string);
            if next.is_some() && next == marker {
                return Err(KodoError::invalid(format!(
                    "listing {} did not advance past marker {}",
                    prefix,
                    next.unwrap_or_default()
                )));
            }
            items.extend(page.items);
            marker = next;
            if marker.is_none() {
                break;
            }
        }

        Ok(items)
    }

    /// True when any object key starts with `key`.
    ///
    /// This is a prefix match: `exists("foo")` is true if only `foobar` is stored.
    #[instrument(skip(self), fields(exist = tracing::field::Empty))]
    pub async fn exists(&self, key: &str) -> KodoResult<bool> {
        let page = self.store.list(key, None, 1).await?;
        let answer = !page.items.is_empty();
        tracing::Span::current().record("exist", answer);
        Ok(answer)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> KodoResult<()> {
        self.store.delete(key).await?;
        info!("Deleted {}", key);
        Ok(())
    }

    /// Delete every object under `prefix`, one at a time.
    ///
    /// Stops at the first failure; objects deleted before it stay deleted.
    #[instrument(skip(self))]
    pub async fn delete_prefixed(&self, prefix: &str) -> KodoResult<()> {
        let items = self.list_prefix(prefix).await?;
        for item in &items {
            self.store.delete(&item.key).await?;
        }
        info!("Deleted {} objects under {}", items.len(), prefix);
        Ok(())
    }

    /// Have the store pull `source_url` into `key`
    #[instrument(skip(self))]
    pub async fn fetch(&self, source_url: &str, key: &str) -> KodoResult<()> {
        self.store.fetch(source_url, key).await
    }

    #[instrument(skip(self))]
    pub async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        target_bucket: &str,
        target_key: &str,
    ) -> KodoResult<()> {
        self.store
            .copy(source_bucket, source_key, target_bucket, target_key)
            .await
    }

    /// Image details for `key`, empty if the lookup fails
    pub async fn image_metadata(&self, key: &str) -> ImageMetadata {
        ImageInfoProbe::new(self.signer.clone(), self.fetcher.clone())
            .metadata(key)
            .await
    }

    /// Get configuration
    pub fn config(&self) -> &KodoConfig {
        &self.config
    }
}
