//! Observed-dependency reporting for watch mode.
//!
//! Every loaded module URL is reported to a watcher process so it can restart
//! when one of them changes. Reporting is fire-and-forget: a missing or
//! disconnected watcher is not an error.
//!
//! # Protocol
//!
//! Messages are serialized as JSON with a 4-byte little-endian length prefix:
//! ```text
//! [len: u32 LE][payload: JSON bytes]
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use url::Url;

use crate::error::{HookError, HookResult};

/// Largest frame accepted by [`decode_frame`].
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

pub trait DependencyReporter: Send + Sync {
    fn report(&self, url: &Url);
}

/// Reporter used when no watcher is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl DependencyReporter for NoopReporter {
    fn report(&self, _url: &Url) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WatchMessage {
    Dependency { path: String },
}

/// Forwards dependencies over an in-process channel, typically to a task
/// that writes frames to the watcher's IPC socket.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<WatchMessage>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WatchMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::UnboundedSender<WatchMessage>) -> Self {
        Self { tx }
    }
}

impl DependencyReporter for ChannelReporter {
    fn report(&self, url: &Url) {
        let message = WatchMessage::Dependency {
            path: url.to_string(),
        };
        if self.tx.send(message).is_err() {
            tracing::trace!(url = %url, "no dependency watcher listening");
        }
    }
}

/// Encode a message as one length-prefixed frame.
pub fn encode_frame(message: &WatchMessage) -> HookResult<Vec<u8>> {
    let payload = serde_json::to_vec(message)?;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode the first frame in `buf`. Returns the message and the number of
/// bytes consumed, or `None` when `buf` does not hold a complete frame yet.
pub fn decode_frame(buf: &[u8]) -> HookResult<Option<(WatchMessage, usize)>> {
    let Some(len_bytes) = buf.get(..4) else {
        return Ok(None);
    };
    let mut len_buf = [0u8; 4];
    len_buf.copy_from_slice(len_bytes);
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > MAX_FRAME_LEN {
        return Err(HookError::FrameTooLarge {
            len,
            limit: MAX_FRAME_LEN,
        });
    }
    let Some(payload) = buf.get(4..4 + len) else {
        return Ok(None);
    };

    let message = serde_json::from_slice(payload)?;
    Ok(Some((message, 4 + len)))
}
