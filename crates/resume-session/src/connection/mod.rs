//! The connection-facing seam.
//!
//! [`ConnectionHandle`] is the narrow surface a real TLS stack exposes to the
//! resumption core. [`HandshakeContext`] is a plain implementation an adapter
//! can fill in from whatever handshake state machine it wraps.

use std::collections::BTreeMap;

use crate::extensions::{Extension, ExtensionType};
use crate::session::{SessionId, SessionState};
use crate::{CipherSuite, ProtocolVersion};
use resume_types::SessionError;

/// Coarse handshake progress, as far as resumption is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakePhase {
    /// No handshake message processed yet.
    Idle,
    /// The peer's hello has been parsed.
    HelloReceived,
    /// Protocol version and cipher suite are fixed.
    Negotiated,
    /// Traffic keys have been derived.
    KeysDerived,
    /// Handshake complete.
    Connected,
    /// Connection closed.
    Closed,
}

impl HandshakePhase {
    /// Whether a session can still be bound in this phase.
    pub fn accepts_resumption(self) -> bool {
        matches!(
            self,
            HandshakePhase::Idle | HandshakePhase::HelloReceived | HandshakePhase::Negotiated
        )
    }
}

/// A live TLS connection as seen by the resumption core.
pub trait ConnectionHandle {
    /// Current handshake phase.
    fn phase(&self) -> HandshakePhase;
    /// Session ID the connection currently carries, `None` before any
    /// session context exists.
    fn session_id(&self) -> Option<&[u8]>;
    /// Established (or installed) session, if any.
    fn session(&self) -> Option<&SessionState>;
    /// Protocol versions this endpoint is willing to negotiate.
    fn enabled_versions(&self) -> &[ProtocolVersion];
    /// Cipher suites on offer for this handshake.
    fn offered_cipher_suites(&self) -> &[CipherSuite];
    /// Version and suite, once fixed.
    fn negotiated(&self) -> Option<(ProtocolVersion, CipherSuite)>;
    /// Raw body of an extension the peer is offering in this handshake.
    fn peer_extension(&self, extension_type: ExtensionType) -> Option<&[u8]>;
    /// Bind session material so the abbreviated handshake is taken.
    fn bind_session(&mut self, state: SessionState);
}

/// Connection-local handshake state backing [`ConnectionHandle`].
#[derive(Debug)]
pub struct HandshakeContext {
    phase: HandshakePhase,
    enabled_versions: Vec<ProtocolVersion>,
    cipher_suites: Vec<CipherSuite>,
    negotiated: Option<(ProtocolVersion, CipherSuite)>,
    session_id: Option<SessionId>,
    peer_extensions: BTreeMap<ExtensionType, Vec<u8>>,
    session: Option<SessionState>,
    resumed: bool,
}

impl HandshakeContext {
    pub fn new(enabled_versions: &[ProtocolVersion], cipher_suites: &[CipherSuite]) -> Self {
        Self {
            phase: HandshakePhase::Idle,
            enabled_versions: enabled_versions.to_vec(),
            cipher_suites: cipher_suites.to_vec(),
            negotiated: None,
            session_id: None,
            peer_extensions: BTreeMap::new(),
            session: None,
            resumed: false,
        }
    }

    /// Move to `phase`. Phases only move forward.
    pub fn advance(&mut self, phase: HandshakePhase) -> Result<(), SessionError> {
        if phase < self.phase {
            return Err(SessionError::HandshakeStateError(format!(
                "cannot move from {:?} back to {phase:?}",
                self.phase
            )));
        }
        self.phase = phase;
        Ok(())
    }

    /// Record the peer's hello: its legacy session ID and offered extensions.
    pub fn receive_hello(
        &mut self,
        session_id: &[u8],
        extensions: Vec<Extension>,
    ) -> Result<(), SessionError> {
        if self.phase != HandshakePhase::Idle {
            return Err(SessionError::HandshakeStateError(format!(
                "hello received in phase {:?}",
                self.phase
            )));
        }
        self.session_id = Some(SessionId::try_from(session_id)?);
        self.peer_extensions = extensions
            .into_iter()
            .map(|ext| (ext.extension_type, ext.data))
            .collect();
        self.phase = HandshakePhase::HelloReceived;
        Ok(())
    }

    /// Fix the protocol version and cipher suite.
    pub fn negotiate(
        &mut self,
        version: ProtocolVersion,
        suite: CipherSuite,
    ) -> Result<(), SessionError> {
        if self.phase >= HandshakePhase::Negotiated {
            return Err(SessionError::HandshakeStateError(format!(
                "negotiation in phase {:?}",
                self.phase
            )));
        }
        self.negotiated = Some((version, suite));
        self.phase = HandshakePhase::Negotiated;
        Ok(())
    }

    /// Record the session established by a completed full handshake.
    pub fn complete(&mut self, state: SessionState) -> Result<(), SessionError> {
        if self.phase >= HandshakePhase::Closed {
            return Err(SessionError::HandshakeStateError(
                "connection already closed".into(),
            ));
        }
        self.session_id = Some(state.session_id().clone());
        self.negotiated = Some((state.protocol_version(), state.cipher_suite()));
        self.session = Some(state);
        self.phase = HandshakePhase::Connected;
        Ok(())
    }

    /// Whether a stored session was bound to this connection.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }
}

impl ConnectionHandle for HandshakeContext {
    fn phase(&self) -> HandshakePhase {
        self.phase
    }

    fn session_id(&self) -> Option<&[u8]> {
        self.session_id.as_ref().map(SessionId::as_bytes)
    }

    fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    fn enabled_versions(&self) -> &[ProtocolVersion] {
        &self.enabled_versions
    }

    fn offered_cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    fn negotiated(&self) -> Option<(ProtocolVersion, CipherSuite)> {
        self.negotiated
    }

    fn peer_extension(&self, extension_type: ExtensionType) -> Option<&[u8]> {
        self.peer_extensions
            .get(&extension_type)
            .map(Vec::as_slice)
    }

    fn bind_session(&mut self, state: SessionState) {
        self.session_id = Some(state.session_id().clone());
        self.negotiated = Some((state.protocol_version(), state.cipher_suite()));
        self.session = Some(state);
        self.resumed = true;
    }
}
