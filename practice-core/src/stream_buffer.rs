//! # Stream Buffer Module
//!
//! Accumulates arbitrarily sized chunks of incoming samples and hands them out as
//! fixed-size analysis windows, one FIFO queue per session.

use dashmap::DashMap;
use std::collections::VecDeque;

use crate::error::{ConfigError, Result, SessionError};
use crate::session::SessionId;

/// Pending samples of a single session.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    window_size: usize,
    pending: VecDeque<f32>,
}

/// A zero-sized window would never leave anything pending to wait for.
fn check_window_size(window_size: usize) -> std::result::Result<(), ConfigError> {
    if window_size == 0 {
        return Err(ConfigError::Invalid("window_size must be positive".to_string()));
    }
    Ok(())
}

impl WindowBuffer {
    pub fn new(window_size: usize) -> std::result::Result<Self, ConfigError> {
        check_window_size(window_size)?;
        Ok(Self::empty(window_size))
    }

    fn empty(window_size: usize) -> Self {
        Self {
            window_size,
            // Room for one full window plus a typical chunk.
            pending: VecDeque::with_capacity(window_size * 2),
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.pending.extend(samples.iter().copied());
    }

    /// Removes and returns the oldest `window_size` samples once that many are queued.
    pub fn drain_window_if_ready(&mut self) -> Option<Vec<f32>> {
        if self.pending.len() < self.window_size {
            return None;
        }
        Some(self.pending.drain(..self.window_size).collect())
    }

    /// Number of samples waiting for the next window.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Per-session sample queues keyed by session id.
///
/// Only the shard holding the addressed session is locked, and only for the
/// duration of one call, so sessions never wait on each other here.
#[derive(Debug)]
pub struct StreamBuffer {
    window_size: usize,
    buffers: DashMap<SessionId, WindowBuffer>,
}

impl StreamBuffer {
    /// # Errors
    /// * `ConfigError::Invalid` - `window_size` is zero
    pub fn new(window_size: usize) -> std::result::Result<Self, ConfigError> {
        check_window_size(window_size)?;
        Ok(Self {
            window_size,
            buffers: DashMap::new(),
        })
    }

    /// Allocates an empty queue for a session. An existing queue is reset.
    pub fn open(&self, session_id: SessionId) {
        self.buffers
            .insert(session_id, WindowBuffer::empty(self.window_size));
    }

    /// Frees a session's queue, returning the samples that never filled a window.
    pub fn close(&self, session_id: &SessionId) -> Option<usize> {
        self.buffers
            .remove(session_id)
            .map(|(_, buffer)| buffer.pending())
    }

    /// Appends samples to the session's queue.
    pub fn push(&self, session_id: &SessionId, samples: &[f32]) -> Result<()> {
        let mut buffer = self
            .buffers
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        buffer.push(samples);
        Ok(())
    }

    /// Takes the next full window for the session, if one is ready.
    pub fn drain_window_if_ready(&self, session_id: &SessionId) -> Result<Option<Vec<f32>>> {
        let mut buffer = self
            .buffers
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        Ok(buffer.drain_window_if_ready())
    }

    /// Number of queued samples for the session.
    pub fn pending(&self, session_id: &SessionId) -> Option<usize> {
        self.buffers.get(session_id).map(|buffer| buffer.pending())
    }

    /// Number of sessions holding a queue.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
