//! Canonical binary encoding of [`SessionState`].
//!
//! Format (version 1, all integers big-endian):
//!
//! ```text
//! magic(2) = "RS" || format_version(1)
//! protocol_version(2) || cipher_suite(2)
//! session_id_len(1) || session_id
//! master_secret_len(1) || master_secret
//! creation_time(8) || flags(1)
//! [ticket_lifetime_hint(4)]                     if flags & 0x01
//! ticket_age_add(4) || max_early_data(4)
//! [ticket_len(2) || ticket]                     if flags & 0x02
//! chain_len(3) || (cert_len(3) || cert)*
//! ext_count(2) || (ext_type(2) || ext_len(2) || ext_data)*
//! ```
//!
//! Extensions are written in ascending type order; the decoder rejects any
//! other order, so every session has exactly one encoding.

use std::collections::BTreeMap;

use super::{
    MasterSecret, SessionId, SessionState, MAX_SESSION_ID_LEN, MAX_TICKET_LEN,
};
use crate::config::ResumptionConfig;
use crate::crypt::expected_master_secret_len;
use crate::extensions::ExtensionType;
use crate::{CipherSuite, ProtocolVersion};
use resume_types::SessionError;

/// Leading bytes of every encoded session.
pub const SESSION_MAGIC: [u8; 2] = *b"RS";
/// The format version this codec writes and reads.
pub const FORMAT_VERSION: u8 = 1;

const FLAG_LIFETIME_HINT: u8 = 0x01;
const FLAG_TICKET: u8 = 0x02;
const KNOWN_FLAGS: u8 = FLAG_LIFETIME_HINT | FLAG_TICKET;

/// Size of the smallest possible encoding: every fixed-width field present,
/// every variable field empty, no optional field.
pub const MIN_ENCODED_LEN: usize = 2 + 1 + 2 + 2 + 1 + 1 + 8 + 1 + 4 + 4 + 3 + 2;

fn malformed(msg: impl Into<String>) -> SessionError {
    SessionError::MalformedData(msg.into())
}

// ---------------------------------------------------------------------------
// Bounds-checked reader
// ---------------------------------------------------------------------------

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], SessionError> {
        let data = self.data;
        let out = self
            .pos
            .checked_add(n)
            .and_then(|end| data.get(self.pos..end))
            .ok_or_else(|| malformed(format!("{what}: truncated")))?;
        self.pos += n;
        Ok(out)
    }

    fn read_u8(&mut self, what: &str) -> Result<u8, SessionError> {
        Ok(self.take(1, what)?[0])
    }

    fn read_u16(&mut self, what: &str) -> Result<u16, SessionError> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u24(&mut self, what: &str) -> Result<usize, SessionError> {
        let b = self.take(3, what)?;
        Ok(((b[0] as usize) << 16) | ((b[1] as usize) << 8) | (b[2] as usize))
    }

    fn read_u32(&mut self, what: &str) -> Result<u32, SessionError> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self, what: &str) -> Result<u64, SessionError> {
        let b = self.take(8, what)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }
}

fn push_u24(out: &mut Vec<u8>, value: usize) {
    out.push((value >> 16) as u8);
    out.push((value >> 8) as u8);
    out.push(value as u8);
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encoder/decoder for session state, carrying the decode limits.
#[derive(Debug, Clone)]
pub struct SessionCodec {
    max_encoded_len: usize,
    max_certificate_len: usize,
    max_chain_len: usize,
    max_chain_depth: usize,
    max_extensions: usize,
}

impl Default for SessionCodec {
    fn default() -> Self {
        Self::new(&ResumptionConfig::default())
    }
}

impl SessionCodec {
    pub fn new(config: &ResumptionConfig) -> Self {
        Self {
            max_encoded_len: config.max_encoded_len,
            max_certificate_len: config.max_certificate_len,
            max_chain_len: config.max_chain_len,
            max_chain_depth: config.max_chain_depth,
            max_extensions: config.max_extensions,
        }
    }

    /// Exact number of bytes `encode` will produce for `state`.
    pub fn encoded_len(state: &SessionState) -> usize {
        let mut len = MIN_ENCODED_LEN + state.session_id.len() + state.master_secret.len();
        if state.ticket_lifetime_hint.is_some() {
            len += 4;
        }
        if let Some(ticket) = &state.ticket {
            len += 2 + ticket.len();
        }
        len += chain_body_len(state);
        len += state
            .negotiated_extensions
            .values()
            .map(|data| 4 + data.len())
            .sum::<usize>();
        len
    }

    /// Check `state` against the limits this codec enforces on decode.
    ///
    /// Every state [`SessionState::builder`] accepts passes this check for
    /// the default limits. A codec with tighter limits fails with
    /// [`SessionError::InvalidSession`] here rather than producing bytes its
    /// own `decode` would reject.
    pub fn check_limits(&self, state: &SessionState) -> Result<(), SessionError> {
        let invalid = SessionError::InvalidSession;
        let chain = &state.peer_certificate_chain;
        if chain.len() > self.max_chain_depth {
            return Err(invalid(format!(
                "{} certificates exceeds limit {}",
                chain.len(),
                self.max_chain_depth
            )));
        }
        if let Some(cert) = chain.iter().find(|c| c.len() > self.max_certificate_len) {
            return Err(invalid(format!(
                "certificate length {} exceeds limit {}",
                cert.len(),
                self.max_certificate_len
            )));
        }
        let chain_len = chain_body_len(state);
        if chain_len > self.max_chain_len {
            return Err(invalid(format!(
                "certificate chain length {chain_len} exceeds limit {}",
                self.max_chain_len
            )));
        }
        if state.negotiated_extensions.len() > self.max_extensions {
            return Err(invalid(format!(
                "{} extensions exceeds limit {}",
                state.negotiated_extensions.len(),
                self.max_extensions
            )));
        }
        let len = Self::encoded_len(state);
        if len > self.max_encoded_len {
            return Err(invalid(format!(
                "encoded length {len} exceeds limit {}",
                self.max_encoded_len
            )));
        }
        Ok(())
    }

    /// Encode `state` into its canonical byte form.
    ///
    /// Fails with [`SessionError::InvalidSession`] when `state` exceeds this
    /// codec's limits (never for the default codec) and with
    /// [`SessionError::SerializationFailure`] when the output buffer cannot
    /// be allocated.
    pub fn encode(&self, state: &SessionState) -> Result<Vec<u8>, SessionError> {
        self.check_limits(state)?;
        let len = Self::encoded_len(state);
        let mut out = Vec::new();
        out.try_reserve_exact(len)?;

        out.extend_from_slice(&SESSION_MAGIC);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&state.protocol_version.wire_value().to_be_bytes());
        out.extend_from_slice(&state.cipher_suite.0.to_be_bytes());

        out.push(state.session_id.len() as u8);
        out.extend_from_slice(state.session_id.as_bytes());
        out.push(state.master_secret.len() as u8);
        out.extend_from_slice(state.master_secret.as_bytes());

        out.extend_from_slice(&state.creation_time.to_be_bytes());
        let mut flags = 0u8;
        if state.ticket_lifetime_hint.is_some() {
            flags |= FLAG_LIFETIME_HINT;
        }
        if state.ticket.is_some() {
            flags |= FLAG_TICKET;
        }
        out.push(flags);
        if let Some(hint) = state.ticket_lifetime_hint {
            out.extend_from_slice(&hint.to_be_bytes());
        }
        out.extend_from_slice(&state.ticket_age_add.to_be_bytes());
        out.extend_from_slice(&state.max_early_data.to_be_bytes());
        if let Some(ticket) = &state.ticket {
            out.extend_from_slice(&(ticket.len() as u16).to_be_bytes());
            out.extend_from_slice(ticket);
        }

        push_u24(&mut out, chain_body_len(state));
        for cert in &state.peer_certificate_chain {
            push_u24(&mut out, cert.len());
            out.extend_from_slice(cert);
        }

        out.extend_from_slice(&(state.negotiated_extensions.len() as u16).to_be_bytes());
        for (ty, data) in &state.negotiated_extensions {
            out.extend_from_slice(&ty.0.to_be_bytes());
            out.extend_from_slice(&(data.len() as u16).to_be_bytes());
            out.extend_from_slice(data);
        }

        debug_assert_eq!(out.len(), len);
        Ok(out)
    }

    /// Decode and validate untrusted bytes into an owned [`SessionState`].
    ///
    /// Never reads past `data` and never retains a reference into it.
    pub fn decode(&self, data: &[u8]) -> Result<SessionState, SessionError> {
        let result = self.decode_inner(data);
        if let Err(e) = &result {
            tracing::debug!(input_len = data.len(), error = %e, "session decode rejected");
        }
        result
    }

    fn decode_inner(&self, data: &[u8]) -> Result<SessionState, SessionError> {
        if data.len() < MIN_ENCODED_LEN {
            return Err(malformed(format!(
                "length {} below minimum {MIN_ENCODED_LEN}",
                data.len()
            )));
        }
        if data.len() > self.max_encoded_len {
            return Err(malformed(format!(
                "length {} exceeds limit {}",
                data.len(),
                self.max_encoded_len
            )));
        }

        let mut r = Reader::new(data);
        if r.take(2, "magic")? != SESSION_MAGIC {
            return Err(malformed("bad magic"));
        }
        let format_version = r.read_u8("format version")?;
        if format_version != FORMAT_VERSION {
            return Err(SessionError::VersionMismatch {
                found: format_version,
                supported: FORMAT_VERSION,
            });
        }

        let wire_version = r.read_u16("protocol version")?;
        let protocol_version = ProtocolVersion::from_wire(wire_version)
            .ok_or_else(|| malformed(format!("unknown protocol version 0x{wire_version:04x}")))?;
        let cipher_suite = CipherSuite(r.read_u16("cipher suite")?);
        let expected_secret_len = expected_master_secret_len(protocol_version, cipher_suite)
            .ok_or_else(|| {
                malformed(format!(
                    "cipher suite 0x{:04x} not valid for {protocol_version:?}",
                    cipher_suite.0
                ))
            })?;

        let id_len = r.read_u8("session id length")? as usize;
        if id_len > MAX_SESSION_ID_LEN {
            return Err(malformed(format!(
                "session id length {id_len} exceeds {MAX_SESSION_ID_LEN}"
            )));
        }
        let session_id = SessionId(r.take(id_len, "session id")?.to_vec());

        let secret_len = r.read_u8("master secret length")? as usize;
        if secret_len != expected_secret_len {
            return Err(malformed(format!(
                "master secret length {secret_len} (expected {expected_secret_len})"
            )));
        }
        let master_secret = MasterSecret::new(r.take(secret_len, "master secret")?);

        let creation_time = r.read_u64("creation time")?;
        let flags = r.read_u8("flags")?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(malformed(format!("unknown flags 0x{flags:02x}")));
        }
        let ticket_lifetime_hint = if flags & FLAG_LIFETIME_HINT != 0 {
            Some(r.read_u32("ticket lifetime hint")?)
        } else {
            None
        };
        let ticket_age_add = r.read_u32("ticket age add")?;
        let max_early_data = r.read_u32("max early data")?;
        let ticket = if flags & FLAG_TICKET != 0 {
            let len = r.read_u16("ticket length")? as usize;
            if len == 0 || len > MAX_TICKET_LEN {
                return Err(malformed(format!("ticket length {len}")));
            }
            Some(r.take(len, "ticket")?.to_vec())
        } else {
            None
        };

        let peer_certificate_chain = self.decode_chain(&mut r)?;
        let negotiated_extensions = self.decode_extensions(&mut r)?;

        if r.remaining() != 0 {
            return Err(malformed(format!("{} trailing bytes", r.remaining())));
        }

        Ok(SessionState {
            session_id,
            protocol_version,
            cipher_suite,
            master_secret,
            creation_time,
            ticket_lifetime_hint,
            ticket,
            ticket_age_add,
            max_early_data,
            peer_certificate_chain,
            negotiated_extensions,
        })
    }

    fn decode_chain(&self, r: &mut Reader<'_>) -> Result<Vec<Vec<u8>>, SessionError> {
        let chain_len = r.read_u24("certificate chain length")?;
        if chain_len > self.max_chain_len {
            return Err(malformed(format!(
                "certificate chain length {chain_len} exceeds limit {}",
                self.max_chain_len
            )));
        }
        let mut chain_reader = Reader::new(r.take(chain_len, "certificate chain")?);
        let mut chain = Vec::new();
        while chain_reader.remaining() > 0 {
            if chain.len() == self.max_chain_depth {
                return Err(malformed(format!(
                    "more than {} certificates",
                    self.max_chain_depth
                )));
            }
            let cert_len = chain_reader.read_u24("certificate length")?;
            if cert_len == 0 || cert_len > self.max_certificate_len {
                return Err(malformed(format!("certificate length {cert_len}")));
            }
            chain.push(chain_reader.take(cert_len, "certificate")?.to_vec());
        }
        Ok(chain)
    }

    fn decode_extensions(
        &self,
        r: &mut Reader<'_>,
    ) -> Result<BTreeMap<ExtensionType, Vec<u8>>, SessionError> {
        let count = r.read_u16("extension count")? as usize;
        if count > self.max_extensions {
            return Err(malformed(format!(
                "{count} extensions exceeds limit {}",
                self.max_extensions
            )));
        }
        let mut extensions = BTreeMap::new();
        let mut last: Option<ExtensionType> = None;
        for _ in 0..count {
            let ty = ExtensionType(r.read_u16("extension type")?);
            if last.is_some_and(|prev| prev >= ty) {
                return Err(malformed(format!(
                    "extension {} out of order or duplicated",
                    ty.0
                )));
            }
            let len = r.read_u16("extension length")? as usize;
            extensions.insert(ty, r.take(len, "extension data")?.to_vec());
            last = Some(ty);
        }
        Ok(extensions)
    }
}

fn chain_body_len(state: &SessionState) -> usize {
    state
        .peer_certificate_chain
        .iter()
        .map(|cert| 3 + cert.len())
        .sum()
}

/// Encode with the default codec.
pub fn encode_session_state(state: &SessionState) -> Result<Vec<u8>, SessionError> {
    SessionCodec::default().encode(state)
}

/// Decode with the default limits.
pub fn decode_session_state(data: &[u8]) -> Result<SessionState, SessionError> {
    SessionCodec::default().decode(data)
}
