use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::{debug, info, instrument};

use crate::chunks;
use crate::policy::PutPolicyIssuer;
use crate::retry::RetryPolicy;
use crate::store::{BlockAck, FinalizeRequest, ObjectStore};
use crate::{ByteStream, KodoConfig, KodoError, KodoResult, ObjectMetadata, UploadRules, UploadToken};

/// One acknowledged block of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    /// Position of the block in the source
    pub index: usize,
    pub ctx: String,
    pub host: String,
    pub size: u64,
}

/// State of a single block upload, owned by the call that runs it.
///
/// The first recorded block pins the host; later writes must go to
/// [`UploadSession::pinned_host`].
#[derive(Debug)]
pub struct UploadSession {
    key: String,
    token: UploadToken,
    blocks: Vec<BlockContext>,
    file_size: u64,
    pinned_host: Option<String>,
}

impl UploadSession {
    pub fn new<K: Into<String>>(key: K, token: UploadToken) -> Self {
        Self {
            key: key.into(),
            token,
            blocks: Vec::new(),
            file_size: 0,
            pinned_host: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &UploadToken {
        &self.token
    }

    /// Host every block after the first must be written to
    pub fn pinned_host(&self) -> Option<&str> {
        self.pinned_host.as_deref()
    }

    /// Bytes acknowledged so far
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn blocks(&self) -> &[BlockContext] {
        &self.blocks
    }

    /// Index the next block read from the source will get
    pub fn next_index(&self) -> usize {
        self.blocks.len()
    }

    /// Record the store's acknowledgement for block `index`
    pub fn record(&mut self, index: usize, ack: BlockAck, size: u64) -> KodoResult<()> {
        if self.blocks.iter().any(|block| block.index == index) {
            return Err(KodoError::invalid(format!("block {} recorded twice", index)));
        }

        let host = match &self.pinned_host {
            Some(pinned) => pinned.clone(),
            None => {
                self.pinned_host = Some(ack.host.clone());
                ack.host
            }
        };

        self.file_size += size;
        self.blocks.push(BlockContext {
            index,
            ctx: ack.ctx,
            host,
            size,
        });
        Ok(())
    }

    /// Turn the session into a finalize request.
    ///
    /// Contexts are ordered by block index, not by the order blocks were recorded.
    pub fn finish(mut self, content_type: Option<&str>) -> FinalizeRequest {
        self.blocks.sort_by_key(|block| block.index);

        FinalizeRequest {
            token: self.token,
            key: self.key,
            file_size: self.file_size,
            content_type: content_type.map(str::to_string),
            contexts: self.blocks.into_iter().map(|block| block.ctx).collect(),
            host: self.pinned_host,
        }
    }
}

/// Uploads a stream as a sequence of fixed-size blocks, then finalizes it.
///
/// Blocks are written strictly one after another. A block that still fails
/// after the retry bound aborts the upload before finalize; blocks already
/// written are left to the store to expire.
#[derive(Clone)]
pub struct ChunkedUploader {
    store: Arc<dyn ObjectStore>,
    issuer: PutPolicyIssuer,
    rules: UploadRules,
    expires_in: Duration,
}

impl ChunkedUploader {
    pub fn new(store: Arc<dyn ObjectStore>, issuer: PutPolicyIssuer, config: &KodoConfig) -> Self {
        Self {
            store,
            issuer,
            rules: config.upload_rules.clone(),
            expires_in: config.put_policy_expires_in,
        }
    }

    /// Upload `source` under `key`.
    ///
    /// With a `planned_size` the token rejects anything larger than that size
    /// plus slack; without one the size is unbounded.
    #[instrument(skip(self, source), fields(block_size = self.rules.block_size))]
    pub async fn upload(
        &self,
        key: &str,
        source: ByteStream,
        content_type: Option<&str>,
        planned_size: Option<u64>,
    ) -> KodoResult<ObjectMetadata> {
        let token = match planned_size {
            Some(size) => self.issuer.issue_for_size(key, self.expires_in, size)?,
            None => self.issuer.issue(key, self.expires_in)?,
        };
        let session = self.write_blocks(UploadSession::new(key, token), source).await?;

        info!(
            "Uploaded {} blocks ({} bytes) for {}, finalizing",
            session.blocks().len(),
            session.file_size(),
            key
        );
        self.finalize(session, content_type).await
    }

    async fn write_blocks(&self, mut session: UploadSession, source: ByteStream) -> KodoResult<UploadSession> {
        let retry = RetryPolicy::new(self.rules.max_attempts);
        let mut blocks = chunks::fixed_size(source, self.rules.block_size);

        while let Some(block) = blocks.next().await {
            let block = block?;
            let index = session.next_index();
            let size = block.len() as u64;

            let ack = retry
                .run("mkblk", || {
                    self.store
                        .make_block(block.clone(), session.token(), session.pinned_host())
                })
                .await?;

            debug!("Block {} ({} bytes) accepted by {}", index, size, ack.host);
            session.record(index, ack, size)?;
        }

        Ok(session)
    }

    async fn finalize(&self, session: UploadSession, content_type: Option<&str>) -> KodoResult<ObjectMetadata> {
        let key = session.key().to_string();
        let request = session.finish(content_type);

        self.store.make_file(request).await.map_err(|error| match error {
            KodoError::Remote { status, message } => {
                KodoError::finalize(key, format!("{} (status {})", message, status))
            }
            other => other,
        })
    }
}
