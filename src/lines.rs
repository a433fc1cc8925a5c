//! Byte stream to line decoding.
//!
//! Reads may split a line anywhere, including inside a multi-byte UTF-8
//! sequence, so splitting happens on raw bytes and only complete lines are
//! decoded. Both `\n` and `\r\n` terminate a line; the terminator is stripped.

use std::collections::VecDeque;
use std::io;

use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 8 * 1024;

/// Incremental splitter holding the one pending partial line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        if chunk.is_empty() {
            return lines;
        }

        let mut scan_from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.pending[scan_from..].iter().position(|&b| b == b'\n') {
            let end = scan_from + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
            scan_from = start;
        }
        self.pending.drain(..start);
        lines
    }

    /// End of stream: the unterminated tail, if any, is emitted once.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        // No terminator followed, so a trailing `\r` is content.
        let tail = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Pulls chunks from an async reader and hands out complete lines.
pub struct LineReader<R> {
    reader: R,
    decoder: LineDecoder,
    ready: VecDeque<String>,
    buf: Box<[u8]>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: LineDecoder::new(),
            ready: Default::default(),
            buf: vec![0; READ_CHUNK].into_boxed_slice(),
            eof: false,
        }
    }

    /// Next line, or `None` once the stream has ended and everything was returned.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }
            let n = self.reader.read(&mut self.buf).await?;
            if n == 0 {
                self.eof = true;
                self.ready.extend(self.decoder.finish());
            } else {
                let lines = self.decoder.push(&self.buf[..n]);
                self.ready.extend(lines);
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = io::Result<String>> {
        futures::stream::unfold(self, |mut reader| async move {
            match reader.next_line().await {
                Ok(Some(line)) => Some((Ok(line), reader)),
                Ok(None) => None,
                Err(e) => {
                    // A failed read ends the sequence after reporting the error.
                    reader.eof = true;
                    reader.ready.clear();
                    Some((Err(e), reader))
                }
            }
        })
    }
}
