//! Buffered reader over the blocking upstream byte pipe.
//!
//! Wraps any `Read` source behind a fixed internal window so the
//! producer thread can `peek` ahead for an embedded format header
//! without consuming audio bytes it hasn't classified yet.

use std::io::{self, Read};

use crate::error::{CoreError, Result};
use crate::format::FORMAT_HEADER_MAGIC;

const WINDOW_SIZE: usize = 64 * 1024;

pub struct PipeReader<R> {
    source: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

impl<R: Read> PipeReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            buf: vec![0u8; WINDOW_SIZE],
            start: 0,
            end: 0,
        }
    }

    fn available(&self) -> usize {
        self.end - self.start
    }

    fn compact(&mut self) {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
    }

    /// Reads from the source until the window holds at least `want`
    /// bytes (capped to window capacity) or the source signals EOF.
    fn fill(&mut self, want: usize) -> Result<()> {
        self.compact();
        let want = want.min(self.buf.len());
        while self.available() < want {
            match self.source.read(&mut self.buf[self.end..]) {
                Ok(0) => break,
                Ok(n) => self.end += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CoreError::from(e)),
            }
        }
        Ok(())
    }

    /// Returns exactly `n` bytes, blocking as needed, or `CoreError::Eof`
    /// if the source ends before `n` bytes are available.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        let take = self.available().min(n);
        out.extend_from_slice(&self.buf[self.start..self.start + take]);
        self.start += take;
        let mut remaining = n - take;
        while remaining > 0 {
            self.fill(remaining)?;
            let take = self.available().min(remaining);
            if take == 0 {
                return Err(CoreError::Eof);
            }
            out.extend_from_slice(&self.buf[self.start..self.start + take]);
            self.start += take;
            remaining -= take;
        }
        Ok(out)
    }

    /// Returns `n` bytes without consuming them; compacts and refills
    /// the window if it doesn't already hold enough. `n` must not
    /// exceed the window capacity.
    pub fn peek(&mut self, n: usize) -> Result<&[u8]> {
        if n > self.buf.len() {
            return Err(CoreError::InvalidCapacity);
        }
        if self.available() < n {
            self.fill(n)?;
        }
        if self.available() < n {
            return Err(CoreError::Eof);
        }
        Ok(&self.buf[self.start..self.start + n])
    }

    /// Returns 1..=`max` bytes. If the format header magic appears at
    /// offset `i >= 1` within the span that would otherwise be
    /// returned, truncates the span to `i` bytes so audio never
    /// subsumes an embedded header. Offset 0 is excluded: the caller
    /// is expected to have already checked via `peek` that the window
    /// doesn't start with a header.
    pub fn read_up_to(&mut self, max: usize) -> Result<Vec<u8>> {
        if self.available() == 0 {
            self.fill(1)?;
            if self.available() == 0 {
                return Err(CoreError::Eof);
            }
        }
        let take = self.available().min(max);
        let span = &self.buf[self.start..self.start + take];
        let magic_len = FORMAT_HEADER_MAGIC.len();
        let mut truncate_at = take;
        if take > magic_len {
            for i in 1..=(take - magic_len) {
                if span[i..i + magic_len] == FORMAT_HEADER_MAGIC {
                    truncate_at = i;
                    break;
                }
            }
        }
        let out = span[..truncate_at].to_vec();
        self.start += truncate_at;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_exact_returns_requested_bytes() {
        let mut reader = PipeReader::new(Cursor::new(vec![1, 2, 3, 4, 5]));
        let bytes = reader.read_exact(3).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        let bytes = reader.read_exact(2).unwrap();
        assert_eq!(bytes, vec![4, 5]);
    }

    #[test]
    fn read_exact_signals_eof_on_short_source() {
        let mut reader = PipeReader::new(Cursor::new(vec![1, 2]));
        assert_eq!(reader.read_exact(5), Err(CoreError::Eof));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut reader = PipeReader::new(Cursor::new(vec![9, 8, 7, 6]));
        assert_eq!(reader.peek(2).unwrap(), &[9, 8]);
        assert_eq!(reader.peek(2).unwrap(), &[9, 8]);
        let bytes = reader.read_exact(2).unwrap();
        assert_eq!(bytes, vec![9, 8]);
    }

    #[test]
    fn read_up_to_truncates_at_embedded_header() {
        let mut data = vec![1, 2, 3];
        data.extend_from_slice(b"SQFH");
        data.extend_from_slice(&[9, 9, 9]);
        let mut reader = PipeReader::new(Cursor::new(data));
        let span = reader.read_up_to(100).unwrap();
        assert_eq!(span, vec![1, 2, 3]);
        let next = reader.read_exact(4).unwrap();
        assert_eq!(next, b"SQFH".to_vec());
    }

    #[test]
    fn read_up_to_ignores_magic_at_offset_zero() {
        let mut data = b"SQFH".to_vec();
        data.extend_from_slice(&[1, 2, 3]);
        let mut reader = PipeReader::new(Cursor::new(data));
        let span = reader.read_up_to(100).unwrap();
        assert_eq!(span, b"SQFH\x01\x02\x03".to_vec());
    }

    #[test]
    fn read_up_to_respects_max() {
        let mut reader = PipeReader::new(Cursor::new(vec![1, 2, 3, 4, 5]));
        let span = reader.read_up_to(2).unwrap();
        assert_eq!(span, vec![1, 2]);
    }

    #[test]
    fn read_up_to_eof_on_empty_source() {
        let mut reader = PipeReader::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(reader.read_up_to(10), Err(CoreError::Eof));
    }
}
