//! Session installer: compatibility checks and binding of a decoded session
//! to a live connection.

use std::fmt;

use crate::config::ResumptionConfig;
use crate::connection::{ConnectionHandle, HandshakePhase};
use crate::extensions::{parse_alpn_list, parse_server_name, ExtensionType};
use crate::session::{now_secs, SessionState};
use resume_types::SessionError;

/// Why a valid session cannot be resumed on a given connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incompatibility {
    /// The session's protocol version is not enabled on this connection.
    VersionNotEnabled,
    /// The session's cipher suite is not on offer.
    CipherNotOffered,
    /// Version or suite already fixed to different values.
    NegotiatedMismatch,
    /// Session older than its lifetime, or dated in the future.
    Expired,
    /// SNI differs from the one the session was established for (RFC 6066 §3).
    ServerNameMismatch,
    /// The peer no longer offers the session's ALPN protocol.
    AlpnMismatch,
    /// Extended master secret use differs (RFC 7627 §5.3).
    ExtendedMasterSecretMismatch,
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Incompatibility::VersionNotEnabled => "protocol version not enabled",
            Incompatibility::CipherNotOffered => "cipher suite not offered",
            Incompatibility::NegotiatedMismatch => "differs from negotiated parameters",
            Incompatibility::Expired => "session expired",
            Incompatibility::ServerNameMismatch => "server name mismatch",
            Incompatibility::AlpnMismatch => "ALPN protocol not offered",
            Incompatibility::ExtendedMasterSecretMismatch => "extended master secret mismatch",
        };
        f.write_str(s)
    }
}

/// Validates decoded sessions against a connection and binds them.
#[derive(Debug, Clone)]
pub struct SessionInstaller {
    /// Seconds. 0 means no expiry.
    session_lifetime: u64,
}

impl Default for SessionInstaller {
    fn default() -> Self {
        Self::new(&ResumptionConfig::default())
    }
}

impl SessionInstaller {
    pub fn new(config: &ResumptionConfig) -> Self {
        Self {
            session_lifetime: config.session_lifetime,
        }
    }

    /// Install `state` on `conn` using the current wall clock.
    pub fn apply<C>(&self, conn: &mut C, state: SessionState) -> Result<bool, SessionError>
    where
        C: ConnectionHandle + ?Sized,
    {
        self.apply_at(conn, state, now_secs())
    }

    /// Install `state` on `conn`, judging expiry at `now` (seconds since UNIX epoch).
    ///
    /// Returns `Ok(false)` when resumption cannot proceed and the connection
    /// should fall back to a full handshake. Fails with
    /// [`SessionError::HandshakeStateError`] once the connection is past the
    /// point where a session can be bound.
    pub fn apply_at<C>(
        &self,
        conn: &mut C,
        state: SessionState,
        now: u64,
    ) -> Result<bool, SessionError>
    where
        C: ConnectionHandle + ?Sized,
    {
        let phase = conn.phase();
        if !phase.accepts_resumption() {
            tracing::warn!(?phase, "session install attempted too late in handshake");
            return Err(SessionError::HandshakeStateError(format!(
                "cannot install session in phase {phase:?}"
            )));
        }

        if let Some(reason) = self.check(&*conn, &state, now) {
            tracing::debug!(
                session_id = %state.session_id(),
                %reason,
                "session not resumable"
            );
            return Ok(false);
        }

        tracing::debug!(
            session_id = %state.session_id(),
            version = ?state.protocol_version(),
            cipher_suite = state.cipher_suite().0,
            "session installed for resumption"
        );
        conn.bind_session(state);
        Ok(true)
    }

    /// First reason `state` cannot be resumed on `conn`, if any.
    pub fn check<C>(&self, conn: &C, state: &SessionState, now: u64) -> Option<Incompatibility>
    where
        C: ConnectionHandle + ?Sized,
    {
        if !conn.enabled_versions().contains(&state.protocol_version()) {
            return Some(Incompatibility::VersionNotEnabled);
        }
        if !conn.offered_cipher_suites().contains(&state.cipher_suite()) {
            return Some(Incompatibility::CipherNotOffered);
        }
        if conn.phase() == HandshakePhase::Negotiated {
            if let Some(fixed) = conn.negotiated() {
                if fixed != (state.protocol_version(), state.cipher_suite()) {
                    return Some(Incompatibility::NegotiatedMismatch);
                }
            }
        }
        if self.is_expired(state, now) {
            return Some(Incompatibility::Expired);
        }
        if !server_name_matches(conn, state) {
            return Some(Incompatibility::ServerNameMismatch);
        }
        if !alpn_matches(conn, state) {
            return Some(Incompatibility::AlpnMismatch);
        }
        let peer_ems = conn
            .peer_extension(ExtensionType::EXTENDED_MASTER_SECRET)
            .is_some();
        if peer_ems != state.uses_extended_master_secret() {
            return Some(Incompatibility::ExtendedMasterSecretMismatch);
        }
        None
    }

    fn is_expired(&self, state: &SessionState, now: u64) -> bool {
        let Some(age) = state.age_at(now) else {
            return true;
        };
        if self.session_lifetime != 0 && age > self.session_lifetime {
            return true;
        }
        matches!(state.ticket_lifetime_hint(), Some(hint) if age > u64::from(hint))
    }
}

fn server_name_matches<C>(conn: &C, state: &SessionState) -> bool
where
    C: ConnectionHandle + ?Sized,
{
    let offered = conn.peer_extension(ExtensionType::SERVER_NAME);
    match (state.server_name(), offered) {
        (None, None) => true,
        (Some(host), Some(data)) => {
            matches!(parse_server_name(data), Ok(name) if name.eq_ignore_ascii_case(host))
        }
        _ => false,
    }
}

fn alpn_matches<C>(conn: &C, state: &SessionState) -> bool
where
    C: ConnectionHandle + ?Sized,
{
    let Some(selected) = state.alpn_protocol() else {
        return true;
    };
    match conn.peer_extension(ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION) {
        Some(data) => match parse_alpn_list(data) {
            Ok(protocols) => protocols.iter().any(|p| p.as_slice() == selected),
            Err(_) => false,
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::HandshakeContext;
    use crate::extensions::{build_alpn, build_extended_master_secret, build_server_name, Extension};
    use crate::{CipherSuite, ProtocolVersion};

    const NOW: u64 = 1_700_010_000;
    const CREATED: u64 = 1_700_000_000;

    fn session() -> SessionState {
        SessionState::builder(ProtocolVersion::Tls12, CipherSuite(0xC02F))
            .session_id(&[0x33; 32])
            .master_secret(&[0x44; 48])
            .creation_time(CREATED)
            .build()
            .unwrap()
    }

    fn server(exts: Vec<Extension>) -> HandshakeContext {
        let mut ctx = HandshakeContext::new(
            &[ProtocolVersion::Tls12, ProtocolVersion::Tls13],
            &[CipherSuite(0xC02F), CipherSuite(0x1301)],
        );
        ctx.receive_hello(&[0x33; 32], exts).unwrap();
        ctx
    }

    fn installer() -> SessionInstaller {
        SessionInstaller::new(&ResumptionConfig::builder().session_lifetime(86_400).build())
    }

    // -----------------------------------------------------------------------
    // Success and phase gating
    // -----------------------------------------------------------------------

    #[test]
    fn test_install_compatible_session() {
        let mut conn = server(Vec::new());
        assert!(installer().apply_at(&mut conn, session(), NOW).unwrap());
        assert!(conn.is_resumed());
        assert_eq!(
            conn.negotiated(),
            Some((ProtocolVersion::Tls12, CipherSuite(0xC02F)))
        );
        assert_eq!(conn.session(), Some(&session()));
    }

    #[test]
    fn test_install_in_idle_phase() {
        let mut conn = HandshakeContext::new(&[ProtocolVersion::Tls12], &[CipherSuite(0xC02F)]);
        assert!(installer().apply_at(&mut conn, session(), NOW).unwrap());
    }

    #[test]
    fn test_install_after_key_derivation_fails() {
        let mut conn = server(Vec::new());
        conn.advance(HandshakePhase::KeysDerived).unwrap();
        let err = installer().apply_at(&mut conn, session(), NOW).unwrap_err();
        assert!(matches!(err, SessionError::HandshakeStateError(_)));
        assert!(!conn.is_resumed());
    }

    #[test]
    fn test_install_after_connected_fails() {
        let mut conn = server(Vec::new());
        conn.advance(HandshakePhase::Connected).unwrap();
        assert!(matches!(
            installer().apply_at(&mut conn, session(), NOW),
            Err(SessionError::HandshakeStateError(_))
        ));
    }

    #[test]
    fn test_install_when_negotiated_matches() {
        let mut conn = server(Vec::new());
        let suite = CipherSuite(0xC02F);
        conn.negotiate(ProtocolVersion::Tls12, suite).unwrap();
        assert!(installer().apply_at(&mut conn, session(), NOW).unwrap());
    }

    #[test]
    fn test_install_when_negotiated_differs() {
        let mut conn = server(Vec::new());
        let suite = CipherSuite(0x1301);
        conn.negotiate(ProtocolVersion::Tls13, suite).unwrap();
        assert!(!installer().apply_at(&mut conn, session(), NOW).unwrap());
        assert_eq!(
            installer().check(&conn, &session(), NOW),
            Some(Incompatibility::NegotiatedMismatch)
        );
    }

    // -----------------------------------------------------------------------
    // Declines (installed = false, no error)
    // -----------------------------------------------------------------------

    #[test]
    fn test_cipher_not_offered() {
        let mut conn = HandshakeContext::new(&[ProtocolVersion::Tls12], &[CipherSuite(0xC030)]);
        assert!(!installer().apply_at(&mut conn, session(), NOW).unwrap());
        assert!(!conn.is_resumed());
        assert!(conn.session().is_none());
        assert_eq!(
            installer().check(&conn, &session(), NOW),
            Some(Incompatibility::CipherNotOffered)
        );
    }

    #[test]
    fn test_version_not_enabled() {
        let conn = HandshakeContext::new(&[ProtocolVersion::Tls13], &[CipherSuite(0xC02F)]);
        assert_eq!(
            installer().check(&conn, &session(), NOW),
            Some(Incompatibility::VersionNotEnabled)
        );
    }

    #[test]
    fn test_expired_by_lifetime() {
        let conn = server(Vec::new());
        let inst = SessionInstaller::new(&ResumptionConfig::builder().session_lifetime(60).build());
        assert_eq!(
            inst.check(&conn, &session(), CREATED + 61),
            Some(Incompatibility::Expired)
        );
        assert_eq!(inst.check(&conn, &session(), CREATED + 60), None);
    }

    #[test]
    fn test_zero_lifetime_never_expires() {
        let conn = server(Vec::new());
        let inst = SessionInstaller::new(&ResumptionConfig::builder().session_lifetime(0).build());
        assert_eq!(inst.check(&conn, &session(), u64::MAX), None);
    }

    #[test]
    fn test_expired_by_ticket_hint() {
        let conn = server(Vec::new());
        let state = SessionState::builder(ProtocolVersion::Tls12, CipherSuite(0xC02F))
            .master_secret(&[0x44; 48])
            .creation_time(CREATED)
            .ticket_lifetime_hint(300)
            .ticket(&[0x01; 32])
            .build()
            .unwrap();
        assert_eq!(
            installer().check(&conn, &state, CREATED + 301),
            Some(Incompatibility::Expired)
        );
        assert_eq!(installer().check(&conn, &state, CREATED + 299), None);
    }

    #[test]
    fn test_future_dated_session_rejected() {
        let conn = server(Vec::new());
        assert_eq!(
            installer().check(&conn, &session(), CREATED - 1),
            Some(Incompatibility::Expired)
        );
    }

    #[test]
    fn test_server_name_rules() {
        let state = SessionState::builder(ProtocolVersion::Tls12, CipherSuite(0xC02F))
            .master_secret(&[0x44; 48])
            .creation_time(CREATED)
            .server_name("example.com")
            .build()
            .unwrap();

        let same = server(vec![build_server_name("EXAMPLE.com")]);
        assert_eq!(installer().check(&same, &state, NOW), None);

        let other = server(vec![build_server_name("other.example")]);
        assert_eq!(
            installer().check(&other, &state, NOW),
            Some(Incompatibility::ServerNameMismatch)
        );

        let absent = server(Vec::new());
        assert_eq!(
            installer().check(&absent, &state, NOW),
            Some(Incompatibility::ServerNameMismatch)
        );

        // Session without SNI, peer now sends one.
        let added = server(vec![build_server_name("example.com")]);
        assert_eq!(
            installer().check(&added, &session(), NOW),
            Some(Incompatibility::ServerNameMismatch)
        );
    }

    #[test]
    fn test_alpn_rules() {
        let state = SessionState::builder(ProtocolVersion::Tls12, CipherSuite(0xC02F))
            .master_secret(&[0x44; 48])
            .creation_time(CREATED)
            .alpn_protocol(b"h2")
            .build()
            .unwrap();

        let offers = server(vec![build_alpn(&[b"http/1.1".to_vec(), b"h2".to_vec()])]);
        assert_eq!(installer().check(&offers, &state, NOW), None);

        let differs = server(vec![build_alpn(&[b"http/1.1".to_vec()])]);
        assert_eq!(
            installer().check(&differs, &state, NOW),
            Some(Incompatibility::AlpnMismatch)
        );

        let absent = server(Vec::new());
        assert_eq!(
            installer().check(&absent, &state, NOW),
            Some(Incompatibility::AlpnMismatch)
        );

        // Session negotiated no ALPN; peer offering one is fine.
        let newly = server(vec![build_alpn(&[b"h2".to_vec()])]);
        assert_eq!(installer().check(&newly, &session(), NOW), None);
    }

    #[test]
    fn test_malformed_peer_alpn_declines() {
        let state = SessionState::builder(ProtocolVersion::Tls12, CipherSuite(0xC02F))
            .master_secret(&[0x44; 48])
            .creation_time(CREATED)
            .alpn_protocol(b"h2")
            .build()
            .unwrap();
        let conn = server(vec![Extension {
            extension_type: ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION,
            data: vec![0xFF],
        }]);
        assert_eq!(
            installer().check(&conn, &state, NOW),
            Some(Incompatibility::AlpnMismatch)
        );
    }

    #[test]
    fn test_extended_master_secret_must_match() {
        let ems_session = SessionState::builder(ProtocolVersion::Tls12, CipherSuite(0xC02F))
            .master_secret(&[0x44; 48])
            .creation_time(CREATED)
            .extended_master_secret(true)
            .build()
            .unwrap();

        let with_ems = server(vec![build_extended_master_secret()]);
        let without_ems = server(Vec::new());

        assert_eq!(installer().check(&with_ems, &ems_session, NOW), None);
        assert_eq!(
            installer().check(&without_ems, &ems_session, NOW),
            Some(Incompatibility::ExtendedMasterSecretMismatch)
        );
        assert_eq!(
            installer().check(&with_ems, &session(), NOW),
            Some(Incompatibility::ExtendedMasterSecretMismatch)
        );
    }

    #[test]
    fn test_incompatibility_display() {
        assert_eq!(
            Incompatibility::CipherNotOffered.to_string(),
            "cipher suite not offered"
        );
    }
}
