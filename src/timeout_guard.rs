//! A scope guard that resets a session's read timeout when it goes out of scope.

use crate::{backend::Backend, session::Session};
use std::{fmt, io, time::Duration};

/// Holds a [`Session`] with a temporary read timeout and restores the
/// previous timeout when dropped.
///
/// Create one with [`Session::timeout_guard`]. The guard dereferences to the
/// session, so it can be used in its place while in scope.
///
/// If the previous timeout cannot be restored, the session is poisoned and
/// its next operation returns the error.
pub struct TimeoutGuard<'s, 'a, B: Backend> {
    session: &'s mut Session<'a, B>,
    /// Restored on drop.
    previous: Option<Duration>,
}

impl<'s, 'a, B: Backend> TimeoutGuard<'s, 'a, B> {
    /// Apply `timeout` to the session's backend and wrap the session.
    pub(crate) fn new(
        session: &'s mut Session<'a, B>,
        timeout: Option<Duration>,
    ) -> Result<Self, io::Error> {
        let backend = session.backend_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "the session is closed")
        })?;
        let previous = backend.read_timeout()?;
        backend.set_read_timeout(timeout)?;
        Ok(TimeoutGuard { session, previous })
    }
}

impl<B: Backend> fmt::Debug for TimeoutGuard<'_, '_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutGuard")
            .field("session", &self.session)
            .field("previous", &self.previous)
            .finish()
    }
}

impl<'a, B: Backend> std::ops::Deref for TimeoutGuard<'_, 'a, B> {
    type Target = Session<'a, B>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<B: Backend> std::ops::DerefMut for TimeoutGuard<'_, '_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<B: Backend> Drop for TimeoutGuard<'_, '_, B> {
    fn drop(&mut self) {
        // Closed inside the guard.
        let Some(backend) = self.session.backend_mut() else {
            return;
        };
        if let Err(err) = backend.set_read_timeout(self.previous) {
            log::warn!("failed to restore the read timeout: {err}");
            let message = match self.previous {
                Some(timeout) => format!("failed to reset timeout to {} ms: {err}", timeout.as_millis()),
                None => format!("failed to reset to an infinite timeout: {err}"),
            };
            self.session.set_poison(io::Error::new(io::ErrorKind::Other, message));
        }
    }
}
