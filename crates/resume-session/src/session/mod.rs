//! TLS session state: the transport-independent model of a resumable session.

pub mod codec;

use std::collections::BTreeMap;
use std::fmt;

use self::codec::SessionCodec;
use crate::crypt::expected_master_secret_len;
use crate::extensions::ExtensionType;
use crate::{CipherSuite, ProtocolVersion};
use resume_types::SessionError;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Maximum legacy session ID length (RFC 5246 §7.4.1.2).
pub const MAX_SESSION_ID_LEN: usize = 32;
/// Maximum session ticket length (RFC 5077 §3.3, RFC 8446 §4.6.1).
pub const MAX_TICKET_LEN: usize = 0xFFFF;
/// Maximum size of one extension value (16-bit length).
pub const MAX_EXTENSION_DATA_LEN: usize = 0xFFFF;

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A session identifier of 0 to 32 bytes. Empty for ticket-only sessions.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct SessionId(Vec<u8>);

impl SessionId {
    /// The empty identifier.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Generate a fresh 32-byte identifier for a new full handshake.
    pub fn generate() -> Result<Self, SessionError> {
        let mut id = vec![0u8; MAX_SESSION_ID_LEN];
        getrandom::getrandom(&mut id)
            .map_err(|e| SessionError::RandomFailure(format!("getrandom: {e}")))?;
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<&[u8]> for SessionId {
    type Error = SessionError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() > MAX_SESSION_ID_LEN {
            return Err(SessionError::InvalidSession(format!(
                "session id length {} exceeds {MAX_SESSION_ID_LEN}",
                bytes.len()
            )));
        }
        Ok(Self(bytes.to_vec()))
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", hex::encode(&self.0))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

// ---------------------------------------------------------------------------
// MasterSecret
// ---------------------------------------------------------------------------

/// Session secret material. Zeroed on drop, never printed, compared in
/// constant time.
#[derive(Clone, Default)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for MasterSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl PartialEq for MasterSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && bool::from(self.0.ct_eq(&other.0))
    }
}

impl Eq for MasterSecret {}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} bytes]", self.0.len())
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// A resumable TLS session.
///
/// Built either by the handshake machinery through [`SessionState::builder`]
/// or by decoding externally stored bytes. Immutable once constructed. The
/// builder only accepts states within the default [`SessionCodec`] limits,
/// so encoding a built state with the default codec can only fail on
/// allocation failure.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionState {
    session_id: SessionId,
    protocol_version: ProtocolVersion,
    cipher_suite: CipherSuite,
    master_secret: MasterSecret,
    /// Seconds since UNIX epoch.
    creation_time: u64,
    ticket_lifetime_hint: Option<u32>,
    ticket: Option<Vec<u8>>,
    ticket_age_add: u32,
    max_early_data: u32,
    peer_certificate_chain: Vec<Vec<u8>>,
    negotiated_extensions: BTreeMap<ExtensionType, Vec<u8>>,
}

impl SessionState {
    /// Start building a session negotiated with `version` and `suite`.
    pub fn builder(version: ProtocolVersion, suite: CipherSuite) -> SessionStateBuilder {
        SessionStateBuilder::new(version, suite)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    pub fn master_secret(&self) -> &MasterSecret {
        &self.master_secret
    }

    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    pub fn ticket_lifetime_hint(&self) -> Option<u32> {
        self.ticket_lifetime_hint
    }

    pub fn ticket(&self) -> Option<&[u8]> {
        self.ticket.as_deref()
    }

    pub fn ticket_age_add(&self) -> u32 {
        self.ticket_age_add
    }

    pub fn max_early_data(&self) -> u32 {
        self.max_early_data
    }

    /// Peer certificates, leaf first.
    pub fn peer_certificate_chain(&self) -> &[Vec<u8>] {
        &self.peer_certificate_chain
    }

    pub fn negotiated_extensions(&self) -> &BTreeMap<ExtensionType, Vec<u8>> {
        &self.negotiated_extensions
    }

    pub fn extension(&self, extension_type: ExtensionType) -> Option<&[u8]> {
        self.negotiated_extensions
            .get(&extension_type)
            .map(Vec::as_slice)
    }

    /// Negotiated ALPN protocol name.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.extension(ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION)
    }

    /// Host name the session was established for.
    pub fn server_name(&self) -> Option<&[u8]> {
        self.extension(ExtensionType::SERVER_NAME)
    }

    /// Whether the master secret was derived with RFC 7627.
    pub fn uses_extended_master_secret(&self) -> bool {
        self.negotiated_extensions
            .contains_key(&ExtensionType::EXTENDED_MASTER_SECRET)
    }

    /// A session resumable only through its ticket.
    pub fn is_ticket_only(&self) -> bool {
        self.session_id.is_empty() && self.ticket.is_some()
    }

    /// Age in seconds at `now`, or `None` if the session claims to be from
    /// the future.
    pub fn age_at(&self, now: u64) -> Option<u64> {
        now.checked_sub(self.creation_time)
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("session_id", &self.session_id)
            .field("protocol_version", &self.protocol_version)
            .field("cipher_suite", &self.cipher_suite)
            .field("master_secret", &self.master_secret)
            .field("creation_time", &self.creation_time)
            .field("ticket_lifetime_hint", &self.ticket_lifetime_hint)
            .field(
                "ticket",
                &self.ticket.as_ref().map(|t| format!("[{} bytes]", t.len())),
            )
            .field("peer_certificates", &self.peer_certificate_chain.len())
            .field(
                "negotiated_extensions",
                &self.negotiated_extensions.keys().collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Builder for `SessionState`. All invariants are checked in [`build`].
///
/// [`build`]: SessionStateBuilder::build
pub struct SessionStateBuilder {
    protocol_version: ProtocolVersion,
    cipher_suite: CipherSuite,
    session_id: Vec<u8>,
    master_secret: MasterSecret,
    creation_time: Option<u64>,
    ticket_lifetime_hint: Option<u32>,
    ticket: Option<Vec<u8>>,
    ticket_age_add: u32,
    max_early_data: u32,
    peer_certificate_chain: Vec<Vec<u8>>,
    negotiated_extensions: BTreeMap<ExtensionType, Vec<u8>>,
}

impl fmt::Debug for SessionStateBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStateBuilder")
            .field("protocol_version", &self.protocol_version)
            .field("cipher_suite", &self.cipher_suite)
            .finish_non_exhaustive()
    }
}

impl SessionStateBuilder {
    fn new(protocol_version: ProtocolVersion, cipher_suite: CipherSuite) -> Self {
        Self {
            protocol_version,
            cipher_suite,
            session_id: Vec::new(),
            master_secret: MasterSecret::default(),
            creation_time: None,
            ticket_lifetime_hint: None,
            ticket: None,
            ticket_age_add: 0,
            max_early_data: 0,
            peer_certificate_chain: Vec::new(),
            negotiated_extensions: BTreeMap::new(),
        }
    }

    pub fn session_id(mut self, id: &[u8]) -> Self {
        self.session_id = id.to_vec();
        self
    }

    pub fn master_secret(mut self, secret: &[u8]) -> Self {
        self.master_secret = MasterSecret::new(secret);
        self
    }

    /// Creation timestamp in seconds since UNIX epoch. Defaults to now.
    pub fn creation_time(mut self, secs: u64) -> Self {
        self.creation_time = Some(secs);
        self
    }

    pub fn ticket_lifetime_hint(mut self, secs: u32) -> Self {
        self.ticket_lifetime_hint = Some(secs);
        self
    }

    pub fn ticket(mut self, ticket: &[u8]) -> Self {
        self.ticket = Some(ticket.to_vec());
        self
    }

    pub fn ticket_age_add(mut self, value: u32) -> Self {
        self.ticket_age_add = value;
        self
    }

    pub fn max_early_data(mut self, size: u32) -> Self {
        self.max_early_data = size;
        self
    }

    /// Append one peer certificate (DER). Call leaf first.
    pub fn peer_certificate(mut self, der: &[u8]) -> Self {
        self.peer_certificate_chain.push(der.to_vec());
        self
    }

    pub fn peer_certificate_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.peer_certificate_chain = chain;
        self
    }

    /// Record a negotiated extension value, replacing any earlier value.
    pub fn extension(mut self, extension_type: ExtensionType, data: &[u8]) -> Self {
        self.negotiated_extensions
            .insert(extension_type, data.to_vec());
        self
    }

    pub fn alpn_protocol(self, protocol: &[u8]) -> Self {
        self.extension(
            ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION,
            protocol,
        )
    }

    pub fn server_name(self, host: &str) -> Self {
        self.extension(ExtensionType::SERVER_NAME, host.as_bytes())
    }

    pub fn extended_master_secret(mut self, enabled: bool) -> Self {
        if enabled {
            self.negotiated_extensions
                .insert(ExtensionType::EXTENDED_MASTER_SECRET, Vec::new());
        } else {
            self.negotiated_extensions
                .remove(&ExtensionType::EXTENDED_MASTER_SECRET);
        }
        self
    }

    /// Validate and produce the session.
    pub fn build(self) -> Result<SessionState, SessionError> {
        let invalid = SessionError::InvalidSession;

        let session_id = SessionId::try_from(self.session_id.as_slice())?;

        let expected = expected_master_secret_len(self.protocol_version, self.cipher_suite)
            .ok_or_else(|| {
                invalid(format!(
                    "cipher suite 0x{:04x} not valid for {:?}",
                    self.cipher_suite.0, self.protocol_version
                ))
            })?;
        if self.master_secret.len() != expected {
            return Err(invalid(format!(
                "master secret length {} (expected {expected})",
                self.master_secret.len()
            )));
        }

        if let Some(ticket) = &self.ticket {
            if ticket.is_empty() || ticket.len() > MAX_TICKET_LEN {
                return Err(invalid(format!("ticket length {}", ticket.len())));
            }
        }

        if self.peer_certificate_chain.iter().any(Vec::is_empty) {
            return Err(invalid("empty certificate record".into()));
        }
        for (ty, data) in &self.negotiated_extensions {
            if data.len() > MAX_EXTENSION_DATA_LEN {
                return Err(invalid(format!(
                    "extension {} length {}",
                    ty.0,
                    data.len()
                )));
            }
        }

        let state = SessionState {
            session_id,
            protocol_version: self.protocol_version,
            cipher_suite: self.cipher_suite,
            master_secret: self.master_secret,
            creation_time: self.creation_time.unwrap_or_else(now_secs),
            ticket_lifetime_hint: self.ticket_lifetime_hint,
            ticket: self.ticket,
            ticket_age_add: self.ticket_age_add,
            max_early_data: self.max_early_data,
            peer_certificate_chain: self.peer_certificate_chain,
            negotiated_extensions: self.negotiated_extensions,
        };
        // Anything built here must decode with the default limits.
        SessionCodec::default().check_limits(&state)?;
        Ok(state)
    }
}
