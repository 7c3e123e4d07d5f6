#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use dog_kodo::{
    BlockAck, ByteRange, ByteStream, FinalizeRequest, FixedClock, KodoAdapter, KodoConfig, KodoError, KodoResult,
    ListItem, ListPage, ObjectMetadata, ObjectStore, UploadRules, UploadToken, UrlFetcher,
};

pub const NOW: i64 = 1_700_000_000;
pub const FIRST_HOST: &str = "http://up-z0.example.com";

/// One recorded block write attempt
#[derive(Debug, Clone)]
pub struct BlockCall {
    pub data: Bytes,
    pub token: String,
    pub host: Option<String>,
}

/// One recorded finalize call
#[derive(Debug, Clone)]
pub struct FinalizeCall {
    pub key: String,
    pub file_size: u64,
    pub content_type: Option<String>,
    pub contexts: Vec<String>,
    pub host: Option<String>,
}

/// How block writes should fail
#[derive(Debug, Clone, Default)]
pub struct BlockFailures {
    /// Number of attempts that fail before writes start succeeding
    pub transient: u32,
    /// Every attempt on this block index (0-based) fails
    pub permanent_at: Option<usize>,
}

/// In-memory object store that records every call
#[derive(Default)]
pub struct RecordingStore {
    pub block_calls: Mutex<Vec<BlockCall>>,
    pub acknowledged: Mutex<Vec<String>>,
    pub finalize_calls: Mutex<Vec<FinalizeCall>>,
    pub keys: Mutex<BTreeSet<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub list_calls: Mutex<Vec<(String, Option<String>, usize)>>,
    pub fetched: Mutex<Vec<(String, String)>>,
    pub copied: Mutex<Vec<(String, String, String, String)>>,
    pub block_failures: Mutex<BlockFailures>,
    pub finalize_error: Mutex<Option<KodoError>>,
    pub fail_delete_of: Mutex<Option<String>>,
    /// Every list call answers with no items and this marker
    pub stuck_marker: Mutex<Option<String>>,

    /// Body served for every GET
    pub content: Mutex<Bytes>,
    /// GETs answer as if the object were gone
    pub objects_missing: Mutex<bool>,
    pub fetched_keys: Mutex<Vec<String>>,
    pub json: Mutex<Option<serde_json::Value>>,
    pub fetched_urls: Mutex<Vec<String>>,
    pub ranges: Mutex<Vec<ByteRange>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_keys<I: IntoIterator<Item = &'static str>>(keys: I) -> Arc<Self> {
        let store = Self::default();
        store.keys.lock().unwrap().extend(keys.into_iter().map(str::to_string));
        Arc::new(store)
    }

    pub fn fail_blocks(&self, failures: BlockFailures) {
        *self.block_failures.lock().unwrap() = failures;
    }

    pub fn block_calls(&self) -> Vec<BlockCall> {
        self.block_calls.lock().unwrap().clone()
    }

    pub fn finalize_calls(&self) -> Vec<FinalizeCall> {
        self.finalize_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn make_block(&self, data: Bytes, token: &UploadToken, host: Option<&str>) -> KodoResult<BlockAck> {
        let attempt = {
            let mut calls = self.block_calls.lock().unwrap();
            calls.push(BlockCall {
                data: data.clone(),
                token: token.as_str().to_string(),
                host: host.map(str::to_string),
            });
            calls.len()
        };

        let mut failures = self.block_failures.lock().unwrap();
        if failures.transient > 0 {
            failures.transient -= 1;
            return Err(KodoError::transport("mkblk", format!("connection reset on attempt {}", attempt)));
        }

        // Index of the block being written
        let index = self.acknowledged.lock().unwrap().len();
        if failures.permanent_at == Some(index) {
            return Err(KodoError::transport("mkblk", format!("block {} unreachable", index)));
        }
        drop(failures);

        let ctx = format!("ctx-{}-{}", index, data.len());
        self.acknowledged.lock().unwrap().push(ctx.clone());
        Ok(BlockAck::new(ctx, host.unwrap_or(FIRST_HOST)))
    }

    async fn make_file(&self, request: FinalizeRequest) -> KodoResult<ObjectMetadata> {
        self.finalize_calls.lock().unwrap().push(FinalizeCall {
            key: request.key.clone(),
            file_size: request.file_size,
            content_type: request.content_type.clone(),
            contexts: request.contexts.clone(),
            host: request.host.clone(),
        });

        if let Some(error) = self.finalize_error.lock().unwrap().take() {
            return Err(error);
        }

        self.keys.lock().unwrap().insert(request.key.clone());
        let mut metadata = ObjectMetadata::new(request.key, "Fhash");
        metadata.extra.insert("fsize".to_string(), serde_json::json!(request.file_size));
        Ok(metadata)
    }

    async fn delete(&self, key: &str) -> KodoResult<()> {
        if self.fail_delete_of.lock().unwrap().as_deref() == Some(key) {
            return Err(KodoError::transport("delete", "connection reset"));
        }
        if !self.keys.lock().unwrap().remove(key) {
            return Err(KodoError::not_found(key));
        }
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn list(&self, prefix: &str, marker: Option<&str>, limit: usize) -> KodoResult<ListPage> {
        self.list_calls
            .lock()
            .unwrap()
            .push((prefix.to_string(), marker.map(str::to_string), limit));

        if let Some(stuck) = self.stuck_marker.lock().unwrap().clone() {
            return Ok(ListPage {
                items: Vec::new(),
                marker: Some(stuck),
            });
        }

        let matching: Vec<String> = self
            .keys
            .lock()
            .unwrap()
            .iter()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();

        let start = marker.and_then(|m| m.parse::<usize>().ok()).unwrap_or(0);
        let end = (start + limit).min(matching.len());
        let items = matching[start..end].iter().map(ListItem::new).collect();
        let marker = (end < matching.len()).then(|| end.to_string());

        Ok(ListPage { items, marker })
    }

    async fn fetch(&self, source_url: &str, key: &str) -> KodoResult<()> {
        self.fetched.lock().unwrap().push((source_url.to_string(), key.to_string()));
        Ok(())
    }

    async fn copy(&self, source_bucket: &str, source_key: &str, target_bucket: &str, target_key: &str)
        -> KodoResult<()> {
        self.copied.lock().unwrap().push((
            source_bucket.to_string(),
            source_key.to_string(),
            target_bucket.to_string(),
            target_key.to_string(),
        ));
        Ok(())
    }
}

impl RecordingStore {
    fn record_get(&self, url: &str, key: &str) -> KodoResult<()> {
        self.fetched_urls.lock().unwrap().push(url.to_string());
        self.fetched_keys.lock().unwrap().push(key.to_string());
        if *self.objects_missing.lock().unwrap() {
            return Err(KodoError::from_status(404, key, "no such file or directory"));
        }
        Ok(())
    }
}

#[async_trait]
impl UrlFetcher for RecordingStore {
    async fn get_stream(&self, url: &str, key: &str) -> KodoResult<ByteStream> {
        self.record_get(url, key)?;
        let content = self.content.lock().unwrap().clone();

        // Serve the body in uneven pieces to exercise re-chunking
        let pieces: Vec<Result<Bytes, std::io::Error>> = content
            .chunks(7)
            .map(|piece| Ok(Bytes::copy_from_slice(piece)))
            .collect();
        Ok(Box::pin(futures::stream::iter(pieces)))
    }

    async fn get_range(&self, url: &str, key: &str, range: ByteRange) -> KodoResult<Bytes> {
        self.record_get(url, key)?;
        self.ranges.lock().unwrap().push(range);

        let content = self.content.lock().unwrap().clone();
        let start = range.start as usize;
        let end = range
            .end
            .map(|end| end as usize + 1)
            .unwrap_or(content.len())
            .min(content.len());
        Ok(content.slice(start..end))
    }

    async fn get_json(&self, url: &str, key: &str) -> KodoResult<serde_json::Value> {
        self.record_get(url, key)?;
        self.json
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| KodoError::transport("get_json", "image service unavailable"))
    }
}

pub fn test_config(block_size: usize) -> KodoConfig {
    KodoConfig::new("photos", "cdn.example.com")
        .with_credentials("ak", "sk")
        .with_upload_rules(UploadRules::new().with_block_size(block_size))
}

pub fn adapter(store: &Arc<RecordingStore>, config: KodoConfig) -> KodoAdapter {
    KodoAdapter::with_store(config, store.clone(), store.clone())
        .unwrap()
        .with_clock(Arc::new(FixedClock::at_unix(NOW)))
}

pub fn source(data: &[u8], piece: usize) -> ByteStream {
    let pieces: Vec<Result<Bytes, std::io::Error>> = data
        .chunks(piece.max(1))
        .map(|p| Ok(Bytes::copy_from_slice(p)))
        .collect();
    Box::pin(futures::stream::iter(pieces))
}
