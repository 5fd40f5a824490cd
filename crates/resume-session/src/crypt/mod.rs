//! Cipher suite parameters relevant to session resumption.
//!
//! The codec only needs to know, per suite, which PRF hash the suite uses
//! and which protocol versions may negotiate it. That is enough to derive
//! the exact length of the secret a resumable session must carry.

use crate::{CipherSuite, ProtocolVersion};

/// Length of the TLS 1.0-1.2 / DTLS / TLCP master secret (RFC 5246 §8.1).
pub const MASTER_SECRET_LEN: usize = 48;

/// Group of protocol versions a cipher suite is defined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFamily {
    /// RFC 8446 suites, TLS 1.3 only.
    Tls13,
    /// AEAD and SHA-2 MAC suites, TLS 1.2 and DTLS 1.2 only.
    Tls12,
    /// CBC-SHA suites, TLS 1.0 through 1.2 and DTLS 1.2.
    Legacy,
    /// GB/T 38636 suites, TLCP only.
    Tlcp,
}

impl SuiteFamily {
    /// Whether a suite of this family can be negotiated under `version`.
    pub fn permits(self, version: ProtocolVersion) -> bool {
        use ProtocolVersion::*;
        match self {
            SuiteFamily::Tls13 => version == Tls13,
            SuiteFamily::Tls12 => matches!(version, Tls12 | Dtls12),
            SuiteFamily::Legacy => matches!(version, Tls10 | Tls11 | Tls12 | Dtls12),
            SuiteFamily::Tlcp => version == Tlcp,
        }
    }
}

/// Parameters associated with a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteParams {
    /// The cipher suite identifier.
    pub suite: CipherSuite,
    /// PRF / HKDF hash output size in bytes (32 for SHA-256/SM3, 48 for SHA-384).
    pub hash_len: usize,
    pub family: SuiteFamily,
}

impl CipherSuiteParams {
    /// Look up parameters for a known cipher suite.
    pub fn from_suite(suite: CipherSuite) -> Option<Self> {
        let (hash_len, family) = match suite {
            // --- TLS 1.3 ---
            CipherSuite::TLS_AES_128_GCM_SHA256
            | CipherSuite::TLS_CHACHA20_POLY1305_SHA256
            | CipherSuite::TLS_AES_128_CCM_SHA256
            | CipherSuite::TLS_AES_128_CCM_8_SHA256
            | CipherSuite::TLS_SM4_GCM_SM3
            | CipherSuite::TLS_SM4_CCM_SM3 => (32, SuiteFamily::Tls13),
            CipherSuite::TLS_AES_256_GCM_SHA384 => (48, SuiteFamily::Tls13),

            // --- TLS 1.2, SHA-384 PRF ---
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
            | CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
            | CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384
            | CipherSuite::TLS_RSA_WITH_AES_256_GCM_SHA384
            | CipherSuite::TLS_DHE_RSA_WITH_AES_256_GCM_SHA384
            | CipherSuite::TLS_PSK_WITH_AES_256_GCM_SHA384 => (48, SuiteFamily::Tls12),

            // --- TLS 1.2, SHA-256 PRF ---
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
            | CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
            | CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
            | CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
            | CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256
            | CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256
            | CipherSuite::TLS_DHE_RSA_WITH_AES_128_GCM_SHA256
            | CipherSuite::TLS_PSK_WITH_AES_128_GCM_SHA256 => (32, SuiteFamily::Tls12),

            // --- CBC-SHA, usable before TLS 1.2 ---
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
            | CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA
            | CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA
            | CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA => (32, SuiteFamily::Legacy),

            // --- TLCP, SM3 PRF ---
            CipherSuite::ECDHE_SM4_CBC_SM3
            | CipherSuite::ECC_SM4_CBC_SM3
            | CipherSuite::ECDHE_SM4_GCM_SM3
            | CipherSuite::ECC_SM4_GCM_SM3 => (32, SuiteFamily::Tlcp),

            _ => return None,
        };
        Some(Self {
            suite,
            hash_len,
            family,
        })
    }

    /// Secret length a session of `version` using this suite must carry.
    ///
    /// Returns `None` when the suite cannot be negotiated under `version`.
    pub fn master_secret_len(&self, version: ProtocolVersion) -> Option<usize> {
        if !self.family.permits(version) {
            return None;
        }
        match self.family {
            SuiteFamily::Tls13 => Some(self.hash_len),
            _ => Some(MASTER_SECRET_LEN),
        }
    }
}

/// Expected master secret length for a (version, suite) pair, if the pair is valid.
pub fn expected_master_secret_len(version: ProtocolVersion, suite: CipherSuite) -> Option<usize> {
    CipherSuiteParams::from_suite(suite)?.master_secret_len(version)
}
