//! Bounded in-memory log ring that doubles as a `tracing_subscriber` writer.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

pub const DEFAULT_LOG_CAPACITY: usize = 1000;

#[derive(Debug)]
struct Ring {
    lines: VecDeque<String>,
    /// Sequence number of `lines[0]`
    first_seq: u64,
    capacity: usize,
}

impl Ring {
    fn next_seq(&self) -> u64 {
        self.first_seq + self.lines.len() as u64
    }
}

/// Lines waiting for upload. Clones share the same ring.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    ring: Arc<Mutex<Ring>>,
}

/// Lines handed out for one upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogs {
    pub lines: Vec<String>,
    end_seq: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: Arc::new(Mutex::new(Ring {
                lines: VecDeque::new(),
                first_seq: 0,
                capacity: capacity.max(1),
            })),
        }
    }

    fn ring(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add one line, evicting the oldest when full
    pub fn push(&self, line: impl Into<String>) {
        let mut ring = self.ring();
        if ring.lines.len() == ring.capacity {
            ring.lines.pop_front();
            ring.first_seq += 1;
        }
        ring.lines.push_back(line.into());
    }

    pub fn len(&self) -> usize {
        self.ring().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring().lines.is_empty()
    }

    /// Copy of everything buffered; nothing is removed until [`Self::acknowledge`]
    pub fn pending(&self) -> PendingLogs {
        let ring = self.ring();
        PendingLogs {
            lines: ring.lines.iter().cloned().collect(),
            end_seq: ring.next_seq(),
        }
    }

    /// Drop the lines of a successful upload. Lines added since
    /// [`Self::pending`] stay buffered.
    pub fn acknowledge(&self, pending: &PendingLogs) {
        let mut ring = self.ring();
        while ring.first_seq < pending.end_seq && ring.lines.pop_front().is_some() {
            ring.first_seq += 1;
        }
    }
}

/// Writer for one formatted event; complete lines land in the ring on drop
#[derive(Debug)]
pub struct LogBufferWriter {
    buffer: LogBuffer,
    bytes: Vec<u8>,
}

impl io::Write for LogBufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogBufferWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.bytes);
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            self.buffer.push(line);
        }
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogBufferWriter {
            buffer: self.clone(),
            bytes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn ring_keeps_the_newest_lines() {
        let buffer = LogBuffer::with_capacity(2);
        buffer.push("a");
        buffer.push("b");
        buffer.push("c");
        assert_eq!(buffer.pending().lines, vec!["b", "c"]);
    }

    #[test]
    fn acknowledge_keeps_lines_written_during_upload() {
        let buffer = LogBuffer::new();
        buffer.push("first");
        let pending = buffer.pending();
        buffer.push("second");

        buffer.acknowledge(&pending);
        assert_eq!(buffer.pending().lines, vec!["second"]);
    }

    #[test]
    fn acknowledge_after_eviction_only_drops_uploaded_lines() {
        let buffer = LogBuffer::with_capacity(2);
        buffer.push("a");
        buffer.push("b");
        let pending = buffer.pending();
        buffer.push("c");

        buffer.acknowledge(&pending);
        assert_eq!(buffer.pending().lines, vec!["c"]);
    }

    #[test]
    fn unacknowledged_lines_stay() {
        let buffer = LogBuffer::new();
        buffer.push("kept");
        let _ = buffer.pending();
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn writer_splits_lines_on_drop() {
        let buffer = LogBuffer::new();
        {
            let mut writer = buffer.make_writer();
            writer.write_all(b"one\ntwo").unwrap();
            writer.write_all(b"\n\n").unwrap();
            assert!(buffer.is_empty());
        }
        assert_eq!(buffer.pending().lines, vec!["one", "two"]);
    }
}
