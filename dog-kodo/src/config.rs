use std::env;
use std::time::Duration;

use crate::{KodoError, KodoResult};

/// URL scheme used for download URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = KodoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(KodoError::invalid(format!("Unknown protocol: {}", other))),
        }
    }
}

/// Configuration for the object store
#[derive(Debug, Clone)]
pub struct KodoConfig {
    /// Download domain bound to the bucket
    pub domain: String,

    /// Scheme used when composing download URLs
    pub protocol: Protocol,

    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,

    /// Public buckets get plain URLs, private buckets get signed ones
    pub public: bool,

    /// Upload host, also the target of direct (browser) uploads
    pub up_host: String,

    /// Management host (delete, copy)
    pub rs_host: String,

    /// Listing host
    pub rsf_host: String,

    /// Remote fetch host
    pub io_host: String,

    /// Rules for block uploads
    pub upload_rules: UploadRules,

    /// Lifetime of upload tokens issued for server-side uploads
    pub put_policy_expires_in: Duration,

    /// Default lifetime of signed download URLs
    pub url_expires_in: Duration,

    /// Chunk size yielded by streaming downloads
    pub download_chunk_size: usize,

    /// Per-request timeout for the HTTP client
    pub request_timeout: Duration,
}

/// Rules for block uploads
#[derive(Debug, Clone)]
pub struct UploadRules {
    /// Bytes per block write
    pub block_size: usize,

    /// Total attempts per block write, including the first one
    pub max_attempts: u32,
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            block_size: 4 * 1024 * 1024, // 4MB
            max_attempts: 3,
        }
    }
}

impl Default for KodoConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            protocol: Protocol::Https,
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            public: false,
            up_host: "https://upload.qiniup.com".to_string(),
            rs_host: "https://rs.qiniuapi.com".to_string(),
            rsf_host: "https://rsf.qiniuapi.com".to_string(),
            io_host: "https://iovip.qiniuio.com".to_string(),
            upload_rules: UploadRules::default(),
            put_policy_expires_in: Duration::from_secs(3600),
            url_expires_in: Duration::from_secs(3600),
            download_chunk_size: 64 * 1024, // 64KB
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl KodoConfig {
    /// Create a config for a bucket served from `domain`
    pub fn new<B: Into<String>, D: Into<String>>(bucket: B, domain: D) -> Self {
        Self {
            bucket: bucket.into(),
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `KODO_*` environment variables
    pub fn from_env() -> KodoResult<Self> {
        fn get_env(key: &str) -> KodoResult<String> {
            env::var(key).map_err(|_| KodoError::invalid(format!("{} environment variable required", key)))
        }

        let mut config = Self::new(get_env("KODO_BUCKET")?, get_env("KODO_DOMAIN")?)
            .with_credentials(get_env("KODO_ACCESS_KEY")?, get_env("KODO_SECRET_KEY")?);

        if let Ok(protocol) = env::var("KODO_PROTOCOL") {
            config.protocol = protocol.parse()?;
        }
        if let Ok(public) = env::var("KODO_PUBLIC") {
            config.public = matches!(public.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(host) = env::var("KODO_UP_HOST") {
            config.up_host = host;
        }
        if let Ok(host) = env::var("KODO_RS_HOST") {
            config.rs_host = host;
        }
        if let Ok(host) = env::var("KODO_RSF_HOST") {
            config.rsf_host = host;
        }
        if let Ok(host) = env::var("KODO_IO_HOST") {
            config.io_host = host;
        }
        if let Ok(size) = env::var("KODO_BLOCK_SIZE") {
            let size = size
                .parse()
                .map_err(|_| KodoError::invalid(format!("KODO_BLOCK_SIZE is not a number: {}", size)))?;
            config.upload_rules.block_size = size;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the options that every operation depends on
    pub fn validate(&self) -> KodoResult<()> {
        if self.bucket.is_empty() {
            return Err(KodoError::invalid("bucket is required"));
        }
        if self.domain.is_empty() {
            return Err(KodoError::invalid("domain is required"));
        }
        if self.upload_rules.block_size == 0 {
            return Err(KodoError::invalid("block size must be greater than zero"));
        }
        if self.download_chunk_size == 0 {
            return Err(KodoError::invalid("download chunk size must be greater than zero"));
        }
        Ok(())
    }

    /// Set access and secret keys
    pub fn with_credentials<A: Into<String>, S: Into<String>>(mut self, access_key: A, secret_key: S) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Mark the bucket as publicly readable
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn with_up_host<S: Into<String>>(mut self, host: S) -> Self {
        self.up_host = host.into();
        self
    }

    pub fn with_upload_rules(mut self, rules: UploadRules) -> Self {
        self.upload_rules = rules;
        self
    }

    pub fn with_put_policy_expires_in(mut self, expires_in: Duration) -> Self {
        self.put_policy_expires_in = expires_in;
        self
    }

    pub fn with_url_expires_in(mut self, expires_in: Duration) -> Self {
        self.url_expires_in = expires_in;
        self
    }

    pub fn with_download_chunk_size(mut self, bytes: usize) -> Self {
        self.download_chunk_size = bytes;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl UploadRules {
    /// Create new upload rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Set block size
    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    /// Set the total attempts allowed per block write
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
}
