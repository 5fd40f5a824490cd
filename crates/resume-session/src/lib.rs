#![forbid(unsafe_code)]
#![doc = "TLS session serialization and resumption for connection handlers."]

pub mod config;
pub mod connection;
pub mod crypt;
pub mod extensions;
pub mod identifier;
pub mod installer;
pub mod session;

pub use config::ResumptionConfig;
pub use connection::{ConnectionHandle, HandshakeContext, HandshakePhase};
pub use identifier::get_session_id;
pub use installer::{Incompatibility, SessionInstaller};
pub use resume_types::SessionError;
pub use session::codec::{decode_session_state, encode_session_state, SessionCodec};
pub use session::{MasterSecret, SessionId, SessionState, SessionStateBuilder};

/// TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
    Dtls12,
    Tlcp,
}

impl ProtocolVersion {
    /// The on-the-wire version code.
    pub fn wire_value(self) -> u16 {
        match self {
            ProtocolVersion::Tls10 => 0x0301,
            ProtocolVersion::Tls11 => 0x0302,
            ProtocolVersion::Tls12 => 0x0303,
            ProtocolVersion::Tls13 => 0x0304,
            ProtocolVersion::Dtls12 => 0xFEFD,
            ProtocolVersion::Tlcp => 0x0101,
        }
    }

    /// Map an on-the-wire version code back to a known version.
    pub fn from_wire(value: u16) -> Option<Self> {
        match value {
            0x0301 => Some(ProtocolVersion::Tls10),
            0x0302 => Some(ProtocolVersion::Tls11),
            0x0303 => Some(ProtocolVersion::Tls12),
            0x0304 => Some(ProtocolVersion::Tls13),
            0xFEFD => Some(ProtocolVersion::Dtls12),
            0x0101 => Some(ProtocolVersion::Tlcp),
            _ => None,
        }
    }
}

/// TLS cipher suite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    // TLS 1.3 cipher suites
    pub const TLS_AES_128_GCM_SHA256: Self = Self(0x1301);
    pub const TLS_AES_256_GCM_SHA384: Self = Self(0x1302);
    pub const TLS_CHACHA20_POLY1305_SHA256: Self = Self(0x1303);
    pub const TLS_AES_128_CCM_SHA256: Self = Self(0x1304);
    pub const TLS_AES_128_CCM_8_SHA256: Self = Self(0x1305);
    pub const TLS_SM4_GCM_SM3: Self = Self(0x00C6);
    pub const TLS_SM4_CCM_SM3: Self = Self(0x00C7);

    // TLS 1.2 cipher suites (representative)
    pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0xC02F);
    pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC030);
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: Self = Self(0xC02B);
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC02C);
    pub const TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256: Self = Self(0xCCA8);
    pub const TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256: Self = Self(0xCCA9);
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA: Self = Self(0xC013);
    pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA: Self = Self(0xC014);
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256: Self = Self(0xC027);
    pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384: Self = Self(0xC028);
    pub const TLS_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0x009C);
    pub const TLS_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0x009D);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: Self = Self(0x002F);
    pub const TLS_RSA_WITH_AES_256_CBC_SHA: Self = Self(0x0035);
    pub const TLS_DHE_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0x009E);
    pub const TLS_DHE_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0x009F);
    pub const TLS_PSK_WITH_AES_128_GCM_SHA256: Self = Self(0x00A8);
    pub const TLS_PSK_WITH_AES_256_GCM_SHA384: Self = Self(0x00A9);

    // TLCP (GB/T 38636) cipher suites
    pub const ECDHE_SM4_CBC_SM3: Self = Self(0xE011);
    pub const ECC_SM4_CBC_SM3: Self = Self(0xE013);
    pub const ECDHE_SM4_GCM_SM3: Self = Self(0xE051);
    pub const ECC_SM4_GCM_SM3: Self = Self(0xE053);
}

/// Fetch the serialized form of the connection's established session.
///
/// Fails with [`SessionError::NoActiveSession`] when the connection has no
/// session context yet.
pub fn get_serialized_session<C>(conn: &C) -> Result<Vec<u8>, SessionError>
where
    C: ConnectionHandle + ?Sized,
{
    get_serialized_session_with_config(conn, &ResumptionConfig::default())
}

/// [`get_serialized_session`] with explicit codec limits.
pub fn get_serialized_session_with_config<C>(
    conn: &C,
    config: &ResumptionConfig,
) -> Result<Vec<u8>, SessionError>
where
    C: ConnectionHandle + ?Sized,
{
    let id = get_session_id(conn)?;
    let state = conn.session().ok_or(SessionError::NoActiveSession)?;
    let encoded = SessionCodec::new(config).encode(state)?;
    tracing::debug!(
        session_id = %id,
        encoded_len = encoded.len(),
        "serialized session"
    );
    Ok(encoded)
}

/// Decode `data` and try to install it on `conn` for resumption.
///
/// Returns `Ok(true)` when the session was bound, `Ok(false)` when the
/// session is valid but cannot be resumed on this connection, and an error
/// when the bytes are malformed or the connection is past the point where a
/// session can be installed.
pub fn set_serialized_session<C>(conn: &mut C, data: &[u8]) -> Result<bool, SessionError>
where
    C: ConnectionHandle + ?Sized,
{
    set_serialized_session_with_config(conn, data, &ResumptionConfig::default())
}

/// [`set_serialized_session`] with explicit codec limits and session lifetime.
pub fn set_serialized_session_with_config<C>(
    conn: &mut C,
    data: &[u8],
    config: &ResumptionConfig,
) -> Result<bool, SessionError>
where
    C: ConnectionHandle + ?Sized,
{
    let state = SessionCodec::new(config).decode(data)?;
    SessionInstaller::new(config).apply(conn, state)
}
