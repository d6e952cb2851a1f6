// src/bundle/stream.rs

use std::io::{self, Write};
use std::time::Duration;

use axum::body::Bytes;
use futures::{Stream, StreamExt, stream};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};

use crate::bundle::{BundleGenerator, BundlePlan};

pub type Chunk = io::Result<Bytes>;

/// Buffers archive bytes and hands them to the response body in chunks.
///
/// Blocks the calling thread while the channel is full, so it must only be
/// used from a blocking task.
pub struct ChannelWriter {
    tx: mpsc::Sender<Chunk>,
    buf: Vec<u8>,
    chunk_bytes: usize,
}

impl ChannelWriter {
    pub fn new(tx: mpsc::Sender<Chunk>, chunk_bytes: usize) -> Self {
        let chunk_bytes = chunk_bytes.max(1);
        Self {
            tx,
            buf: Vec::with_capacity(chunk_bytes),
            chunk_bytes,
        }
    }

    fn send_pending(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(self.chunk_bytes));
        self.tx.blocking_send(Ok(Bytes::from(chunk))).map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "response body receiver dropped")
        })
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= self.chunk_bytes {
            self.send_pending()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_pending()
    }
}

/// Runs the generator on a blocking thread and returns the receiving end of its output.
///
/// The channel carries `Ok` chunks of a valid archive, or a single trailing
/// `Err` when the bundle aborted. The channel closes once the task is done.
pub fn spawn_bundle(generator: BundleGenerator, plan: BundlePlan) -> mpsc::Receiver<Chunk> {
    let settings = generator.settings().clone();
    let (tx, rx) = mpsc::channel(settings.channel_capacity.max(1));
    let span = tracing::info_span!("qr_bundle", exam_id = plan.exam_id);

    tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let probe = tx.clone();
        let writer = ChannelWriter::new(tx, settings.chunk_bytes);

        match generator.write_bundle(&plan, writer, || !probe.is_closed()) {
            Ok(report) => tracing::info!(
                entries = report.entries,
                pdf_bytes = report.pdf_bytes,
                "QR bundle complete"
            ),
            Err(e) => {
                tracing::error!("QR bundle aborted: {}", e);
                // Receiver may already be gone; nothing else to tell it
                let _ = probe.blocking_send(Err(io::Error::other(e.to_string())));
            }
        }
    });

    rx
}

/// Waits for the next chunk, giving up at `deadline`.
pub async fn next_chunk(
    rx: &mut mpsc::Receiver<Chunk>,
    deadline: Option<Instant>,
) -> Option<Chunk> {
    match deadline {
        None => rx.recv().await,
        Some(at) => match timeout_at(at, rx.recv()).await {
            Ok(item) => item,
            Err(_) => Some(Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "bundle deadline exceeded",
            ))),
        },
    }
}

/// Response body: `first` followed by the rest of the channel.
///
/// Ends after the first error; dropping the stream drops the receiver, which
/// makes the generator stop at its next write or liveness check.
pub fn body_stream(
    first: Bytes,
    rx: mpsc::Receiver<Chunk>,
    deadline: Option<Instant>,
) -> impl Stream<Item = Chunk> + Send + 'static {
    let rest = stream::unfold(Some(rx), move |state| async move {
        let mut rx = state?;
        match next_chunk(&mut rx, deadline).await? {
            Ok(chunk) => Some((Ok(chunk), Some(rx))),
            Err(e) => {
                tracing::warn!("Terminating bundle response: {}", e);
                Some((Err(e), None))
            }
        }
    });

    stream::once(async move { Ok(first) }).chain(rest)
}

/// Absolute deadline for a bundle that may run for `limit`.
pub fn deadline_after(limit: Option<Duration>) -> Option<Instant> {
    limit.map(|d| Instant::now() + d)
}
