//! BinaryFILE framing: each message is preceded by a 2-byte big-endian length.

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::message::Message;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed io: {0}")]
    Io(#[from] io::Error),

    #[error("truncated frame at byte {offset}: expected {expected} bytes, {available} available")]
    Truncated {
        offset: u64,
        expected: usize,
        available: usize,
    },

    #[error("zero-length frame at byte {offset}")]
    ZeroLength { offset: u64 },

    #[error("message of {0} bytes does not fit a 2-byte length prefix")]
    Oversized(usize),
}

/// Yields one message at a time from a framed stream, reusing one buffer.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
    offset: u64,
    frames: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(64),
            offset: 0,
            frames: 0,
        }
    }

    /// Next message body, or `None` at a clean end of stream.
    ///
    /// A zero-length frame is reported but leaves the reader aligned on the
    /// next frame.
    pub fn next_frame(&mut self) -> Result<Option<&[u8]>, FeedError> {
        let start = self.offset;
        let mut prefix = [0u8; 2];
        let got = fill(&mut self.inner, &mut prefix)?;
        self.offset += got as u64;
        match got {
            0 => return Ok(None),
            2 => {}
            available => {
                return Err(FeedError::Truncated {
                    offset: start,
                    expected: 2,
                    available,
                })
            }
        }

        let len = u16::from_be_bytes(prefix) as usize;
        if len == 0 {
            return Err(FeedError::ZeroLength { offset: start });
        }

        self.buf.resize(len, 0);
        let got = fill(&mut self.inner, &mut self.buf)?;
        self.offset += got as u64;
        if got < len {
            return Err(FeedError::Truncated {
                offset: start,
                expected: len,
                available: got,
            });
        }

        self.frames += 1;
        Ok(Some(&self.buf))
    }

    /// Frames read successfully so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Reads until `buf` is full or the stream ends; returns bytes read.
fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match r.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(read)
}

pub struct FrameWriter<W> {
    inner: W,
    frames: u64,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, frames: 0 }
    }

    pub fn write_message(&mut self, msg: &Message) -> Result<(), FeedError> {
        self.write_frame(&msg.encode())
    }

    pub fn write_frame(&mut self, body: &[u8]) -> Result<(), FeedError> {
        let len = u16::try_from(body.len()).map_err(|_| FeedError::Oversized(body.len()))?;
        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(body)?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn flush(&mut self) -> Result<(), FeedError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
