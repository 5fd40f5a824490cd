//! Resumption configuration with builder pattern.

/// Default upper bound on an encoded session (512 KiB).
pub const DEFAULT_MAX_ENCODED_LEN: usize = 512 * 1024;
/// Default upper bound on a single certificate record.
pub const DEFAULT_MAX_CERTIFICATE_LEN: usize = 0xFFFF;
/// Default upper bound on the encoded certificate chain (256 KiB).
pub const DEFAULT_MAX_CHAIN_LEN: usize = 256 * 1024;
/// Default upper bound on the number of certificates in the chain.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 16;
/// Default upper bound on the number of negotiated extensions.
pub const DEFAULT_MAX_EXTENSIONS: usize = 64;
/// Default session lifetime in seconds (2 hours).
pub const DEFAULT_SESSION_LIFETIME: u64 = 7200;

/// Limits applied when decoding untrusted session bytes, and the lifetime
/// enforced when installing a decoded session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionConfig {
    /// Reject encodings longer than this before parsing anything.
    pub max_encoded_len: usize,
    /// Maximum size of one certificate record.
    pub max_certificate_len: usize,
    /// Maximum size of the encoded chain (records plus their length headers).
    pub max_chain_len: usize,
    /// Maximum number of certificate records.
    pub max_chain_depth: usize,
    /// Maximum number of negotiated extensions.
    pub max_extensions: usize,
    /// Session lifetime in seconds. 0 means no expiry.
    pub session_lifetime: u64,
}

impl Default for ResumptionConfig {
    fn default() -> Self {
        ResumptionConfigBuilder::default().build()
    }
}

impl ResumptionConfig {
    /// Create a builder for resumption configuration.
    pub fn builder() -> ResumptionConfigBuilder {
        ResumptionConfigBuilder::default()
    }
}

/// Builder for `ResumptionConfig`.
#[derive(Debug)]
pub struct ResumptionConfigBuilder {
    max_encoded_len: usize,
    max_certificate_len: usize,
    max_chain_len: usize,
    max_chain_depth: usize,
    max_extensions: usize,
    session_lifetime: u64,
}

impl Default for ResumptionConfigBuilder {
    fn default() -> Self {
        Self {
            max_encoded_len: DEFAULT_MAX_ENCODED_LEN,
            max_certificate_len: DEFAULT_MAX_CERTIFICATE_LEN,
            max_chain_len: DEFAULT_MAX_CHAIN_LEN,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            max_extensions: DEFAULT_MAX_EXTENSIONS,
            session_lifetime: DEFAULT_SESSION_LIFETIME,
        }
    }
}

impl ResumptionConfigBuilder {
    pub fn max_encoded_len(mut self, len: usize) -> Self {
        self.max_encoded_len = len;
        self
    }

    pub fn max_certificate_len(mut self, len: usize) -> Self {
        self.max_certificate_len = len;
        self
    }

    pub fn max_chain_len(mut self, len: usize) -> Self {
        self.max_chain_len = len;
        self
    }

    pub fn max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    pub fn max_extensions(mut self, count: usize) -> Self {
        self.max_extensions = count;
        self
    }

    /// Session lifetime in seconds; 0 disables the expiry check.
    pub fn session_lifetime(mut self, secs: u64) -> Self {
        self.session_lifetime = secs;
        self
    }

    pub fn build(self) -> ResumptionConfig {
        ResumptionConfig {
            max_encoded_len: self.max_encoded_len,
            max_certificate_len: self.max_certificate_len,
            max_chain_len: self.max_chain_len,
            max_chain_depth: self.max_chain_depth,
            max_extensions: self.max_extensions,
            session_lifetime: self.session_lifetime,
        }
    }
}
