//! `MakeWriter` adapter that redacts each formatted log line before it is written

use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

use crate::redactor::PiiRedactor;

/// Wraps another [`MakeWriter`]; with no redactor it passes lines through
#[derive(Clone)]
pub struct RedactingMakeWriter<M> {
    inner: M,
    redactor: Option<Arc<PiiRedactor>>,
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(inner: M, redactor: Option<Arc<PiiRedactor>>) -> Self {
        Self { inner, redactor }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new(self.inner.make_writer(), self.redactor.clone())
    }
}

/// Buffers one event and writes it redacted on flush or drop
pub struct RedactingWriter<W: Write> {
    inner: W,
    redactor: Option<Arc<PiiRedactor>>,
    buffer: Vec<u8>,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W, redactor: Option<Arc<PiiRedactor>>) -> Self {
        Self {
            inner,
            redactor,
            buffer: Vec::new(),
        }
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        match &self.redactor {
            Some(redactor) => {
                let line = String::from_utf8_lossy(&self.buffer);
                let redacted = redactor.redact(&line);
                self.inner.write_all(redacted.as_bytes())?;
            }
            None => self.inner.write_all(&self.buffer)?,
        }
        self.buffer.clear();
        Ok(())
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
