use std::sync::Mutex;

/// Thread-safe FIFO of completed output lines.
///
/// The stream pump appends while request handlers drain. Neither side holds
/// the lock for more than a push or a swap, and neither takes the session
/// mutex, so pumps keep writing while a stop or status check is in progress.
/// The queue is unbounded; a runaway producer can grow it without limit.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    lines: Mutex<Vec<String>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one completed line at the tail.
    pub fn append(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    /// Remove and return every queued line, oldest first, leaving the
    /// buffer empty.
    pub fn drain_all(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap())
    }
}
