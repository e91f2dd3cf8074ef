//! Bounded capture of child output

use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 8192;

#[derive(Debug, Default)]
pub(crate) struct Captured {
    pub data: Vec<u8>,
    pub truncated: bool,
}

/// Shared buffer a drain task writes into
///
/// Shared rather than returned from the task so whatever was captured is
/// still available if the task has to be abandoned after a kill.
#[derive(Debug, Clone)]
pub(crate) struct OutputBuffer {
    inner: Arc<Mutex<Captured>>,
    limit: usize,
}

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Captured::default())),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append up to the limit; the rest is dropped and flagged
    pub fn push(&self, bytes: &[u8]) {
        let mut captured = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let room = self.limit.saturating_sub(captured.data.len());
        if bytes.len() > room {
            captured.truncated = true;
        }
        let take = bytes.len().min(room);
        captured.data.extend_from_slice(&bytes[..take]);
    }

    pub fn take(&self) -> Captured {
        std::mem::take(&mut *self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Read `reader` to EOF into `buffer`
///
/// Keeps reading past the limit so the child never blocks on a full pipe.
pub(crate) fn drain<R>(reader: Option<R>, buffer: OutputBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer.push(&chunk[..n]),
            }
        }
    })
}
