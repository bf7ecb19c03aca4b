// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owned backend handle with a one-way connection lifecycle.

use std::fmt;

use super::{open_backend, Backend};
use crate::config::BackendConfig;
use crate::errors::{EngineError, Result};

/// Connection lifecycle; transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connected,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Unconnected => "unconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Owns the single backend handle for one invocation.
///
/// The handle is released exactly once: by [`Session::close`] or, failing
/// that, when the session is dropped.
pub struct Session {
    config: Option<BackendConfig>,
    backend: Option<Box<dyn Backend>>,
    state: ConnectionState,
}

impl Session {
    /// A session that opens the configured backend on [`connect`](Self::connect).
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config: Some(config),
            backend: None,
            state: ConnectionState::Unconnected,
        }
    }

    /// Wraps an already-open backend.
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            config: None,
            backend: Some(backend),
            state: ConnectionState::Connected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn name(&self) -> &'static str {
        match (&self.backend, &self.config) {
            (Some(backend), _) => backend.name(),
            (None, Some(config)) => config.kind().as_str(),
            (None, None) => "backend",
        }
    }

    /// Opens the backend. No-op when already connected; fails once closed.
    pub fn connect(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Closed => Err(EngineError::connection(
                self.name(),
                "session is closed and cannot reconnect",
            )),
            ConnectionState::Unconnected => {
                let config = self.config.as_ref().ok_or_else(|| {
                    EngineError::connection(self.name(), "no backend configured")
                })?;
                self.backend = Some(open_backend(config)?);
                self.state = ConnectionState::Connected;
                tracing::debug!(backend = self.name(), "session connected");
                Ok(())
            }
        }
    }

    /// The live backend; fails unless connected.
    pub fn backend(&self) -> Result<&dyn Backend> {
        match (self.state, &self.backend) {
            (ConnectionState::Connected, Some(backend)) => Ok(backend.as_ref()),
            (state, _) => Err(EngineError::connection(
                self.name(),
                format!("session is {}", state),
            )),
        }
    }

    /// Releases the handle. Calling it again is a no-op.
    ///
    /// The session is closed even when releasing the handle reports an error.
    pub fn close(&mut self) -> Result<()> {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Closed);
        match (previous, self.backend.take()) {
            (ConnectionState::Connected, Some(mut backend)) => {
                tracing::debug!(backend = backend.name(), "closing session");
                backend.close()
            }
            _ => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == ConnectionState::Connected {
            if let Err(err) = self.close() {
                tracing::warn!(error = %err, "failed to release backend on drop");
            }
        }
    }
}
