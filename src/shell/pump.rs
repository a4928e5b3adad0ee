use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::buffer::OutputBuffer;

/// How long a read may sit idle before a partial line is flushed.
const IDLE_FLUSH: Duration = Duration::from_millis(40);

/// Drain one child stream into `buffer`, one completed line at a time.
///
/// Bytes are split on `\n`; `\r` never reaches the buffer, which covers both
/// `\r\n` line endings and stray carriage returns. When a read sits idle with
/// a partial line pending (a prompt, or the tail of a command's output with no
/// trailing newline), the partial line is flushed as-is so pollers are never
/// left waiting on bytes the child already produced.
///
/// The pump only borrows the stream; closing it is the session's job. Any
/// read error ends the loop quietly; the session notices a finished pump on
/// its next empty read and relaunches it.
pub async fn run_pump<R>(
    reader: Arc<Mutex<R>>,
    buffer: Arc<OutputBuffer>,
    cancel: CancellationToken,
    label: &'static str,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut chunk = [0u8; 4096];
    let mut partial: Vec<u8> = Vec::new();

    loop {
        let mut stream = reader.lock().await;
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = tokio::time::timeout(IDLE_FLUSH, stream.read(&mut chunk)) => read,
        };
        drop(stream);

        match read {
            // Idle with no data pending: hand any partial line to the poller.
            Err(_) => {
                if !partial.is_empty() {
                    flush(&buffer, &mut partial);
                }
            }
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                for &byte in &chunk[..n] {
                    match byte {
                        b'\n' => flush(&buffer, &mut partial),
                        b'\r' => {}
                        _ => partial.push(byte),
                    }
                }
            }
            Ok(Err(e)) => {
                debug!("{label} pump read failed: {e}");
                break;
            }
        }
    }

    if !partial.is_empty() {
        flush(&buffer, &mut partial);
    }
    debug!("{label} pump exited");
}

fn flush(buffer: &OutputBuffer, partial: &mut Vec<u8>) {
    let line = String::from_utf8_lossy(partial).into_owned();
    partial.clear();
    buffer.append(line);
}
