//! Integration tests for resume-session.
//! Sessions exported from one connection and resumed on another through an
//! in-memory store.

use std::collections::HashMap;

use resume_session::{get_serialized_session, get_session_id, set_serialized_session};
use resume_session::{ConnectionHandle, SessionId};
use resume_types::SessionError;

/// Serialized sessions keyed by session ID, as a server-side cache would
/// hold them.
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: HashMap<SessionId, Vec<u8>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export the connection's established session into the store.
    pub fn save<C>(&mut self, conn: &C) -> Result<SessionId, SessionError>
    where
        C: ConnectionHandle + ?Sized,
    {
        let id = get_session_id(conn)?;
        let encoded = get_serialized_session(conn)?;
        self.entries.insert(id.clone(), encoded);
        Ok(id)
    }

    /// Look up the ID the connection is proposing and try to resume it.
    ///
    /// `Ok(false)` covers both a cache miss and a session the connection
    /// cannot resume.
    pub fn resume<C>(&self, conn: &mut C) -> Result<bool, SessionError>
    where
        C: ConnectionHandle + ?Sized,
    {
        let id = get_session_id(conn)?;
        match self.entries.get(&id) {
            Some(encoded) => set_serialized_session(conn, encoded),
            None => Ok(false),
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<&[u8]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resume_session::extensions::{
        build_alpn, build_extended_master_secret, build_server_name, Extension,
    };
    use resume_session::{
        set_serialized_session_with_config, CipherSuite, HandshakeContext, HandshakePhase,
        ProtocolVersion, ResumptionConfig, SessionState,
    };

    const SUITE: CipherSuite = CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256;

    fn hello_extensions(host: &str) -> Vec<Extension> {
        vec![
            build_server_name(host),
            build_alpn(&[b"h2".to_vec(), b"http/1.1".to_vec()]),
            build_extended_master_secret(),
        ]
    }

    fn server() -> HandshakeContext {
        HandshakeContext::new(
            &[ProtocolVersion::Tls12, ProtocolVersion::Tls13],
            &[SUITE, CipherSuite::TLS_AES_128_GCM_SHA256],
        )
    }

    /// Run a "full handshake" on a fresh connection and return it.
    fn full_handshake(host: &str) -> (HandshakeContext, SessionState) {
        let mut conn = server();
        conn.receive_hello(&[], hello_extensions(host)).unwrap();
        let state = SessionState::builder(ProtocolVersion::Tls12, SUITE)
            .session_id(SessionId::generate().unwrap().as_bytes())
            .master_secret(&[0x5C; 48])
            .peer_certificate(&[0x30, 0x82, 0x01, 0x0A, 0x02, 0x01])
            .alpn_protocol(b"h2")
            .server_name(host)
            .extended_master_secret(true)
            .build()
            .unwrap();
        conn.complete(state.clone()).unwrap();
        (conn, state)
    }

    // -------------------------------------------------------
    // 1. Store on one connection, resume on the next
    // -------------------------------------------------------
    #[test]
    fn test_store_and_resume_across_connections() {
        let mut store = SessionStore::new();
        let (first, original) = full_handshake("example.com");
        let id = store.save(&first).unwrap();
        assert_eq!(id.len(), 32);
        assert_eq!(store.len(), 1);

        let mut second = server();
        second
            .receive_hello(id.as_bytes(), hello_extensions("example.com"))
            .unwrap();
        assert!(store.resume(&mut second).unwrap());
        assert!(second.is_resumed());

        let resumed = second.session().unwrap();
        assert_eq!(resumed, &original);
        assert_eq!(resumed.master_secret(), original.master_secret());
        assert_eq!(resumed.peer_certificate_chain().len(), 1);
        assert_eq!(get_session_id(&second).unwrap(), id);
    }

    #[test]
    fn test_resumed_session_can_be_exported_again() {
        let mut store = SessionStore::new();
        let (first, _) = full_handshake("example.com");
        let id = store.save(&first).unwrap();

        let mut second = server();
        second
            .receive_hello(id.as_bytes(), hello_extensions("example.com"))
            .unwrap();
        assert!(store.resume(&mut second).unwrap());

        let again = get_serialized_session(&second).unwrap();
        assert_eq!(again.as_slice(), store.get(&id).unwrap());
    }

    // -------------------------------------------------------
    // 2. Fallback to a full handshake
    // -------------------------------------------------------
    #[test]
    fn test_unknown_id_is_a_miss() {
        let store = SessionStore::new();
        let mut conn = server();
        conn.receive_hello(&[0xEE; 32], hello_extensions("example.com"))
            .unwrap();
        assert!(!store.resume(&mut conn).unwrap());
        assert!(store.is_empty());
        assert!(!conn.is_resumed());
    }

    #[test]
    fn test_suite_no_longer_offered_falls_back() {
        let mut store = SessionStore::new();
        let (first, _) = full_handshake("example.com");
        let id = store.save(&first).unwrap();

        let mut second = HandshakeContext::new(
            &[ProtocolVersion::Tls12],
            &[CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384],
        );
        second
            .receive_hello(id.as_bytes(), hello_extensions("example.com"))
            .unwrap();
        assert!(!store.resume(&mut second).unwrap());
        assert!(!second.is_resumed());
        assert!(second.session().is_none());
    }

    #[test]
    fn test_different_host_falls_back() {
        let mut store = SessionStore::new();
        let (first, _) = full_handshake("example.com");
        let id = store.save(&first).unwrap();

        let mut second = server();
        second
            .receive_hello(id.as_bytes(), hello_extensions("evil.example"))
            .unwrap();
        assert!(!store.resume(&mut second).unwrap());
    }

    #[test]
    fn test_expired_session_falls_back() {
        let (first, _) = full_handshake("example.com");
        let encoded = get_serialized_session(&first).unwrap();

        let mut aged = server();
        aged.receive_hello(&[], hello_extensions("example.com"))
            .unwrap();
        let state = SessionState::builder(ProtocolVersion::Tls12, SUITE)
            .master_secret(&[0x5C; 48])
            .creation_time(1_000)
            .alpn_protocol(b"h2")
            .server_name("example.com")
            .extended_master_secret(true)
            .build()
            .unwrap();
        let mut old = HandshakeContext::new(&[ProtocolVersion::Tls12], &[SUITE]);
        old.complete(state).unwrap();
        let stale = get_serialized_session(&old).unwrap();
        assert!(!set_serialized_session(&mut aged, &stale).unwrap());

        // With expiry disabled the same bytes are accepted.
        let config = ResumptionConfig::builder().session_lifetime(0).build();
        let mut lenient = server();
        lenient
            .receive_hello(&[], hello_extensions("example.com"))
            .unwrap();
        assert!(set_serialized_session_with_config(&mut lenient, &stale, &config).unwrap());

        // The fresh session is still fine under defaults.
        let mut fresh = server();
        fresh
            .receive_hello(&[], hello_extensions("example.com"))
            .unwrap();
        assert!(set_serialized_session(&mut fresh, &encoded).unwrap());
    }

    // -------------------------------------------------------
    // 3. Errors
    // -------------------------------------------------------
    #[test]
    fn test_save_without_session_fails() {
        let mut store = SessionStore::new();
        let conn = server();
        assert!(matches!(
            store.save(&conn),
            Err(SessionError::NoActiveSession)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_resume_after_key_derivation_fails() {
        let mut store = SessionStore::new();
        let (first, _) = full_handshake("example.com");
        let id = store.save(&first).unwrap();

        let mut late = server();
        late.receive_hello(id.as_bytes(), hello_extensions("example.com"))
            .unwrap();
        late.advance(HandshakePhase::KeysDerived).unwrap();
        assert!(matches!(
            store.resume(&mut late),
            Err(SessionError::HandshakeStateError(_))
        ));
        assert!(!late.is_resumed());
    }

    #[test]
    fn test_tampered_entry_is_rejected() {
        let (first, _) = full_handshake("example.com");
        let mut encoded = get_serialized_session(&first).unwrap();

        let mut truncated = server();
        truncated
            .receive_hello(&[], hello_extensions("example.com"))
            .unwrap();
        let cut = &encoded[..encoded.len() - 1];
        assert!(matches!(
            set_serialized_session(&mut truncated, cut),
            Err(SessionError::MalformedData(_))
        ));

        // Format version byte follows the two-byte magic.
        encoded[2] = encoded[2].wrapping_add(1);
        assert!(matches!(
            set_serialized_session(&mut truncated, &encoded),
            Err(SessionError::VersionMismatch { .. })
        ));
        assert!(!truncated.is_resumed());
    }

    // -------------------------------------------------------
    // 4. Ticket-only sessions
    // -------------------------------------------------------
    #[test]
    fn test_ticket_only_session_round_trip() {
        let state =
            SessionState::builder(ProtocolVersion::Tls13, CipherSuite::TLS_AES_128_GCM_SHA256)
                .master_secret(&[0x7A; 32])
                .ticket_lifetime_hint(3600)
                .ticket(&[0xAB; 96])
                .ticket_age_add(0x0102_0304)
                .alpn_protocol(b"h2")
                .server_name("example.com")
                .extended_master_secret(true)
                .build()
                .unwrap();
        assert!(state.is_ticket_only());

        let mut issuing = server();
        issuing.complete(state.clone()).unwrap();
        assert!(get_session_id(&issuing).unwrap().is_empty());
        let encoded = get_serialized_session(&issuing).unwrap();

        let mut resuming = server();
        resuming
            .receive_hello(&[], hello_extensions("example.com"))
            .unwrap();
        assert!(set_serialized_session(&mut resuming, &encoded).unwrap());
        assert_eq!(resuming.session(), Some(&state));
        assert_eq!(
            resuming.negotiated(),
            Some((ProtocolVersion::Tls13, CipherSuite::TLS_AES_128_GCM_SHA256))
        );
    }
}
