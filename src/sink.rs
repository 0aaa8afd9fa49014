//! Output sinks.
//!
//! The logger writes through `tracing_subscriber`'s [`MakeWriter`], so stdout,
//! stderr, files or any custom writer plug in the same way. [`BufferSink`]
//! keeps records in memory, which is what tests and replay buffers need.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// A cloneable handle to a boxed [`MakeWriter`], shared by the logger and the
/// tracing bridge.
#[derive(Clone)]
pub struct SharedWriter(Arc<BoxMakeWriter>);

impl SharedWriter {
    pub fn new<M>(make_writer: M) -> Self
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self(Arc::new(BoxMakeWriter::new(make_writer)))
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout)
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr)
    }
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = Box<dyn Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.0.make_writer()
    }
}

impl std::fmt::Debug for SharedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedWriter").field(&self.0).finish()
    }
}

/// In-memory sink. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Written records, one per line.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    pub fn clear(&self) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Writer handed out by [`BufferSink`]. Each `write` call appends atomically.
pub struct BufferSinkWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for BufferSinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferSink {
    type Writer = BufferSinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferSinkWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_buffer() {
        let sink = BufferSink::new();
        let clone = sink.clone();

        clone.make_writer().write_all(b"first\nsecond\n").unwrap();

        assert_eq!(sink.lines(), ["first", "second"]);
        sink.clear();
        assert!(clone.contents().is_empty());
    }

    #[test]
    fn shared_writer_delegates() {
        let sink = BufferSink::new();
        let shared = SharedWriter::new(sink.clone());

        shared.make_writer().write_all(b"line\n").unwrap();
        shared.clone().make_writer().write_all(b"again\n").unwrap();

        assert_eq!(sink.lines(), ["line", "again"]);
    }
}
