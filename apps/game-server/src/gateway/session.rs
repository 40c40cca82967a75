//! Per-connection session scope: cancellation, close reasons, terminal errors.

use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why the server closes a connection. Maps onto WebSocket close codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Normal,
    GoingAway,
    SlowConsumer,
    InternalError,
}

impl CloseReason {
    pub fn code(self) -> u16 {
        match self {
            CloseReason::Normal => 1000,
            CloseReason::GoingAway => 1001,
            CloseReason::SlowConsumer => 1008,
            CloseReason::InternalError => 1011,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            CloseReason::Normal => "bye",
            CloseReason::GoingAway => "server going away",
            CloseReason::SlowConsumer => "connection too slow to keep up with messages",
            CloseReason::InternalError => "internal error",
        }
    }
}

/// Force-close capability for one session.
///
/// Any task may call [`SessionCloser::close`]; the first reason recorded wins
/// and later calls are no-ops apart from re-cancelling an already cancelled
/// token.
pub struct SessionCloser {
    token: CancellationToken,
    reason: Mutex<Option<CloseReason>>,
}

impl SessionCloser {
    /// A session scope that is also cancelled when `parent` is (server shutdown).
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            reason: Mutex::new(None),
        }
    }

    /// A session scope with no parent.
    pub fn detached() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Mutex::new(None),
        }
    }

    /// Record `reason` (if none yet) and cancel the session.
    ///
    /// Returns `true` if this call recorded the reason.
    pub fn close(&self, reason: CloseReason) -> bool {
        let recorded = {
            let mut current = self.reason.lock();
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        };
        self.token.cancel();
        recorded
    }

    /// The recorded reason, if the session was closed through this handle.
    pub fn reason(&self) -> Option<CloseReason> {
        *self.reason.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// The terminal error of a session's reader or writer loop.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("write exceeded the {0:?} deadline")]
    WriteTimeout(Duration),

    #[error("write failed: {0}")]
    Write(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("peer closed the connection (code {code:?})")]
    RemoteClosed { code: Option<u16> },

    #[error("session cancelled")]
    Cancelled,
}

impl SessionError {
    /// Normal endings that should not be reported as failures.
    pub fn is_expected(&self) -> bool {
        match self {
            SessionError::Cancelled => true,
            SessionError::RemoteClosed { code } => matches!(
                code,
                None | Some(1000) | Some(1001) | Some(1005)
            ),
            _ => false,
        }
    }

    /// Close reason to report back when this error ends the session.
    pub fn close_reason(&self) -> CloseReason {
        match self {
            SessionError::RemoteClosed { .. } => CloseReason::Normal,
            SessionError::Cancelled => CloseReason::GoingAway,
            SessionError::WriteTimeout(_) | SessionError::Write(_) | SessionError::Read(_) => {
                CloseReason::InternalError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_close_reason_wins() {
        let closer = SessionCloser::detached();
        assert!(!closer.is_closed());

        assert!(closer.close(CloseReason::SlowConsumer));
        assert!(!closer.close(CloseReason::Normal));

        assert!(closer.is_closed());
        assert_eq!(closer.reason(), Some(CloseReason::SlowConsumer));
    }

    #[test]
    fn parent_cancellation_closes_without_reason() {
        let shutdown = CancellationToken::new();
        let closer = SessionCloser::new(&shutdown);

        shutdown.cancel();
        assert!(closer.is_closed());
        assert_eq!(closer.reason(), None);

        // The session can still record why it ended.
        assert!(closer.close(CloseReason::GoingAway));
        assert_eq!(closer.reason(), Some(CloseReason::GoingAway));
    }

    #[test]
    fn closing_a_session_leaves_the_parent_alone() {
        let shutdown = CancellationToken::new();
        let closer = SessionCloser::new(&shutdown);
        closer.close(CloseReason::InternalError);
        assert!(!shutdown.is_cancelled());
    }

    #[test]
    fn close_codes() {
        assert_eq!(CloseReason::Normal.code(), 1000);
        assert_eq!(CloseReason::GoingAway.code(), 1001);
        assert_eq!(CloseReason::SlowConsumer.code(), 1008);
        assert_eq!(CloseReason::InternalError.code(), 1011);
    }

    #[test]
    fn expected_endings() {
        assert!(SessionError::Cancelled.is_expected());
        assert!(SessionError::RemoteClosed { code: Some(1001) }.is_expected());
        assert!(SessionError::RemoteClosed { code: None }.is_expected());
        assert!(!SessionError::RemoteClosed { code: Some(1011) }.is_expected());
        assert!(!SessionError::WriteTimeout(Duration::from_secs(10)).is_expected());
        assert!(!SessionError::Read("reset".into()).is_expected());
    }
}
