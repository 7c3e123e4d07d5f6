//! # dog-kodo: Kodo object storage for DogRS
//!
//! `dog-kodo` uploads files to a Kodo-compatible blob store in fixed-size
//! blocks, issues time-boxed upload tokens, and builds public or signed read
//! URLs, including partial reads.
//!
//! ## Key Features
//!
//! - **Block uploads**: Streams are cut into fixed-size blocks, written one by one with bounded retries, then assembled
//! - **Upload tokens**: Insert-only, expiring put policies signed with HMAC-SHA1
//! - **Direct uploads**: Form data a browser can POST straight to the store
//! - **Read URLs**: Public URLs or signed private ones, with attachment/inline overrides and processing directives
//! - **Range requests**: Inclusive `Range` headers from either `a..b` or `a..=b`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dog_kodo::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> KodoResult<()> {
//! // 1. Configure the bucket
//! let config = KodoConfig::new("my-bucket", "cdn.example.com")
//!     .with_credentials("access-key", "secret-key");
//! let adapter = KodoAdapter::new(config)?;
//!
//! // 2. Upload
//! let metadata = adapter
//!     .upload_bytes("docs/hello.txt", &b"Hello, world!"[..], Some("text/plain"))
//!     .await?;
//!
//! // 3. Read it back
//! let url = adapter.url("docs/hello.txt", &DownloadOptions::attachment())?;
//! let first_five = adapter.download_range("docs/hello.txt", 0..5u64).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │         KodoAdapter          │  ← What services embed
//! ├───────────────┬──────────────┤
//! │ChunkedUploader│  UrlSigner   │  ← Block sequencing / URL composition
//! │PutPolicyIssuer│              │
//! ├───────────────┴──────────────┤
//! │  ObjectStore  │  UrlFetcher  │  ← Remote primitives (KodoHttpStore)
//! └──────────────────────────────┘
//! ```

pub mod adapter;
pub mod analyzer;
pub mod auth;
pub mod chunks;
pub mod clock;
mod config;
mod error;
mod kodo_store;
pub mod policy;
mod receipt;
pub mod retry;
pub mod store;
mod types;
pub mod upload;
pub mod url;

// Re-export main types for clean API
pub use adapter::KodoAdapter;
pub use analyzer::{ImageInfoProbe, ImageMetadata};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{KodoConfig, Protocol, UploadRules};
pub use error::{KodoError, KodoResult};
pub use kodo_store::KodoHttpStore;
pub use policy::{PutPolicy, PutPolicyIssuer, UploadToken};
pub use receipt::{DirectUploadDescriptor, ObjectMetadata};
pub use retry::RetryPolicy;
pub use store::{BlockAck, FinalizeRequest, ListItem, ListPage, ObjectStore, UrlFetcher};
pub use types::{ByteRange, ByteStream, Disposition, DownloadOptions};
pub use upload::{BlockContext, ChunkedUploader, UploadSession};
pub use url::UrlSigner;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ByteRange, ByteStream, Disposition, DownloadOptions, KodoAdapter, KodoConfig, KodoError, KodoResult,
        ObjectMetadata,
    };
}
