use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RANGE};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;

use crate::auth::{encoded_entry, urlsafe_base64, Credentials};
use crate::store::{BlockAck, FinalizeRequest, ListPage, ObjectStore, UrlFetcher};
use crate::url::encode_component;
use crate::{ByteRange, ByteStream, KodoConfig, KodoError, KodoResult, ObjectMetadata, UploadToken};

/// Error body the provider sends with non-2xx answers
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn mkfile_url(host: &str, request: &FinalizeRequest) -> String {
    let mut url = format!(
        "{}/mkfile/{}/key/{}",
        host,
        request.file_size,
        urlsafe_base64(&request.key)
    );
    if let Some(content_type) = request.content_type.as_deref().filter(|ct| !ct.is_empty()) {
        url.push_str("/mimeType/");
        url.push_str(&urlsafe_base64(content_type));
    }
    url
}

fn list_path(bucket: &str, prefix: &str, marker: Option<&str>, limit: usize) -> String {
    let mut path = format!(
        "/list?bucket={}&prefix={}&limit={}",
        encode_component(bucket),
        encode_component(prefix),
        limit
    );
    if let Some(marker) = marker.filter(|m| !m.is_empty()) {
        path.push_str("&marker=");
        path.push_str(&encode_component(marker));
    }
    path
}

/// HTTP implementation of [`ObjectStore`] and [`UrlFetcher`] against the
/// provider's upload, management, listing, and fetch hosts
#[derive(Clone)]
pub struct KodoHttpStore {
    client: Client,
    config: Arc<KodoConfig>,
}

impl KodoHttpStore {
    pub fn new(config: Arc<KodoConfig>) -> KodoResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| KodoError::invalid(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Build a store from `KODO_*` environment variables
    pub fn from_env() -> KodoResult<Self> {
        Self::new(Arc::new(KodoConfig::from_env()?))
    }

    fn credentials(&self) -> KodoResult<Credentials> {
        Credentials::new(&self.config.access_key, &self.config.secret_key)
    }

    fn upload_host<'a>(&'a self, host: Option<&'a str>) -> &'a str {
        host.unwrap_or(&self.config.up_host).trim_end_matches('/')
    }

    /// Send a request and turn non-success statuses into errors.
    ///
    /// Request URLs can carry signatures, so they are kept out of errors and logs.
    async fn send(&self, operation: &'static str, key: &str, request: RequestBuilder) -> KodoResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| KodoError::transport(operation, e.without_url()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        debug!("{} for {} failed with {}: {}", operation, key, status, message);
        Err(KodoError::from_status(status.as_u16(), key, message))
    }

    /// Signed POST to a management host; `path` may carry a query string
    async fn manage(&self, operation: &'static str, key: &str, host: &str, path: &str) -> KodoResult<Response> {
        let token = self.credentials()?.management_token(path, None)?;
        let request = self
            .client
            .post(format!("{}{}", host.trim_end_matches('/'), path))
            .header(AUTHORIZATION, token)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(operation, key, request).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(operation: &'static str, response: Response) -> KodoResult<T> {
        let body = response
            .bytes()
            .await
            .map_err(|e| KodoError::transport(operation, e.without_url()))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ObjectStore for KodoHttpStore {
    async fn make_block(&self, data: Bytes, token: &UploadToken, host: Option<&str>) -> KodoResult<BlockAck> {
        let url = format!("{}/mkblk/{}", self.upload_host(host), data.len());
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, token.authorization())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data);

        let response = self.send("mkblk", "", request).await?;
        Self::read_json("mkblk", response).await
    }

    async fn make_file(&self, request: FinalizeRequest) -> KodoResult<ObjectMetadata> {
        let url = mkfile_url(self.upload_host(request.host.as_deref()), &request);
        let http_request = self
            .client
            .post(url)
            .header(AUTHORIZATION, request.token.authorization())
            .header(CONTENT_TYPE, "text/plain")
            .body(request.contexts.join(","));

        let response = self.send("mkfile", &request.key, http_request).await?;
        Self::read_json("mkfile", response).await
    }

    async fn delete(&self, key: &str) -> KodoResult<()> {
        let path = format!("/delete/{}", encoded_entry(&self.config.bucket, key));
        self.manage("delete", key, &self.config.rs_host, &path).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str, marker: Option<&str>, limit: usize) -> KodoResult<ListPage> {
        let path = list_path(&self.config.bucket, prefix, marker, limit);
        let response = self.manage("list", prefix, &self.config.rsf_host, &path).await?;
        Self::read_json("list", response).await
    }

    async fn fetch(&self, source_url: &str, key: &str) -> KodoResult<()> {
        let path = format!(
            "/fetch/{}/to/{}",
            urlsafe_base64(source_url),
            encoded_entry(&self.config.bucket, key)
        );
        self.manage("fetch", key, &self.config.io_host, &path).await?;
        Ok(())
    }

    async fn copy(&self, source_bucket: &str, source_key: &str, target_bucket: &str, target_key: &str)
        -> KodoResult<()> {
        let path = format!(
            "/copy/{}/{}",
            encoded_entry(source_bucket, source_key),
            encoded_entry(target_bucket, target_key)
        );
        self.manage("copy", source_key, &self.config.rs_host, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl UrlFetcher for KodoHttpStore {
    async fn get_stream(&self, url: &str, key: &str) -> KodoResult<ByteStream> {
        let response = self.send("download", key, self.client.get(url)).await?;
        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.without_url()))
        });
        Ok(Box::pin(stream))
    }

    async fn get_range(&self, url: &str, key: &str, range: ByteRange) -> KodoResult<Bytes> {
        let request = self.client.get(url).header(RANGE, range.header_value());
        let response = self.send("download_chunk", key, request).await?;
        response
            .bytes()
            .await
            .map_err(|e| KodoError::transport("download_chunk", e.without_url()))
    }

    async fn get_json(&self, url: &str, key: &str) -> KodoResult<serde_json::Value> {
        let response = self.send("get_json", key, self.client.get(url)).await?;
        Self::read_json("get_json", response).await
    }
}
