use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ByteRange, ByteStream, KodoResult, ObjectMetadata, UploadToken};

/// Remote operations of the object store.
///
/// Implementations talk to the provider; the uploader and adapter only
/// sequence these calls.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write one block.
    ///
    /// `host` is `None` for the first block of an upload and the host pinned
    /// by that block for every later one.
    async fn make_block(&self, data: Bytes, token: &UploadToken, host: Option<&str>) -> KodoResult<BlockAck>;

    /// Assemble previously written blocks, in the given order, into one object
    async fn make_file(&self, request: FinalizeRequest) -> KodoResult<ObjectMetadata>;

    /// Delete a single object
    async fn delete(&self, key: &str) -> KodoResult<()>;

    /// One page of objects whose keys start with `prefix`
    async fn list(&self, prefix: &str, marker: Option<&str>, limit: usize) -> KodoResult<ListPage>;

    /// Have the store pull `source_url` into `key`
    async fn fetch(&self, source_url: &str, key: &str) -> KodoResult<()>;

    /// Server-side copy between buckets
    async fn copy(&self, source_bucket: &str, source_key: &str, target_bucket: &str, target_key: &str)
        -> KodoResult<()>;
}

/// Plain HTTP reads of resolved download URLs.
///
/// `url` may carry a signature, so errors and logs name the object by `key`
/// and never by the URL.
#[async_trait]
pub trait UrlFetcher: Send + Sync {
    /// Stream the whole response body
    async fn get_stream(&self, url: &str, key: &str) -> KodoResult<ByteStream>;

    /// Read a single range with a `Range` header
    async fn get_range(&self, url: &str, key: &str, range: ByteRange) -> KodoResult<Bytes>;

    /// Read a JSON response body
    async fn get_json(&self, url: &str, key: &str) -> KodoResult<serde_json::Value>;
}

/// Store acknowledgement of one written block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAck {
    /// Opaque context needed at finalize
    pub ctx: String,

    /// Node that accepted the block
    pub host: String,

    #[serde(default)]
    pub checksum: Option<String>,

    #[serde(default)]
    pub crc32: Option<u32>,

    #[serde(default)]
    pub offset: Option<u64>,
}

impl BlockAck {
    pub fn new<C: Into<String>, H: Into<String>>(ctx: C, host: H) -> Self {
        Self {
            ctx: ctx.into(),
            host: host.into(),
            checksum: None,
            crc32: None,
            offset: None,
        }
    }
}

/// Everything the finalize call needs
#[derive(Debug)]
pub struct FinalizeRequest {
    pub token: UploadToken,
    pub key: String,
    pub file_size: u64,
    pub content_type: Option<String>,

    /// Block contexts in original block order
    pub contexts: Vec<String>,

    /// Host pinned by the first block, if any block was written
    pub host: Option<String>,
}

/// One page of a prefix listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub items: Vec<ListItem>,

    /// Continuation marker; `None` or empty on the last page
    #[serde(default)]
    pub marker: Option<String>,
}

impl ListPage {
    pub fn next_marker(&self) -> Option<&str> {
        self.marker.as_deref().filter(|m| !m.is_empty())
    }
}

/// Listed object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub key: String,

    #[serde(default)]
    pub hash: Option<String>,

    #[serde(default)]
    pub fsize: Option<u64>,

    #[serde(default)]
    pub mime_type: Option<String>,

    /// Upload time in 100ns units
    #[serde(default)]
    pub put_time: Option<i64>,
}

impl ListItem {
    pub fn new<K: Into<String>>(key: K) -> Self {
        Self {
            key: key.into(),
            hash: None,
            fsize: None,
            mime_type: None,
            put_time: None,
        }
    }
}
