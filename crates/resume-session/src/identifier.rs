//! Session identifier accessor.

use crate::connection::ConnectionHandle;
use crate::session::SessionId;
use resume_types::SessionError;

/// Read the session ID carried by `conn`.
///
/// The ID may be empty for ticket-based sessions. Fails with
/// [`SessionError::NoActiveSession`] before any session context exists.
pub fn get_session_id<C>(conn: &C) -> Result<SessionId, SessionError>
where
    C: ConnectionHandle + ?Sized,
{
    let id = conn.session_id().ok_or(SessionError::NoActiveSession)?;
    SessionId::try_from(id)
}
