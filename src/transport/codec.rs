//! Frame extraction and encoding
//!
//! A frame is `[u32 big-endian length][body]`, or for backends that write
//! JSON lines, a newline-terminated body. The decoder only ever yields whole
//! bodies; partial input stays buffered until the rest arrives.

use std::str::FromStr;
use thiserror::Error;

const LENGTH_PREFIX: usize = 4;

/// How inbound bytes are split into frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    #[default]
    LengthPrefixed,
    Newline,
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "length_prefixed" | "length" => Ok(Framing::LengthPrefixed),
            "newline" | "ndjson" => Ok(Framing::Newline),
            other => Err(format!("unknown framing `{other}`")),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame length {len} exceeds limit {max}")]
    TooLarge { len: usize, max: usize },
}

/// Incremental frame decoder
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    max_frame_len: usize,
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new(framing: Framing, max_frame_len: usize) -> Self {
        Self {
            framing,
            max_frame_len,
            buf: Vec::new(),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Pop the next complete frame body, if one is buffered.
    ///
    /// An oversized frame discards the whole buffer: there is no way to find
    /// the next frame boundary once a length prefix is garbage.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        match self.framing {
            Framing::LengthPrefixed => self.next_length_prefixed(),
            Framing::Newline => self.next_line(),
        }
    }

    fn next_length_prefixed(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if self.buf.len() < LENGTH_PREFIX {
            return Ok(None);
        }
        let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > self.max_frame_len {
            self.buf.clear();
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        if self.buf.len() < LENGTH_PREFIX + len {
            return Ok(None);
        }
        let body = self.buf[LENGTH_PREFIX..LENGTH_PREFIX + len].to_vec();
        self.buf.drain(..LENGTH_PREFIX + len);
        Ok(Some(body))
    }

    fn next_line(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        loop {
            let Some(pos) = self.buf.iter().position(|b| *b == b'\n') else {
                if self.buf.len() > self.max_frame_len {
                    let len = self.buf.len();
                    self.buf.clear();
                    return Err(FrameError::TooLarge {
                        len,
                        max: self.max_frame_len,
                    });
                }
                return Ok(None);
            };
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(line));
        }
    }
}

/// Prefix a body with its big-endian length
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waits_for_full_body_across_reads() {
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 1024);
        decoder.extend(&[0, 0, 0, 5]);
        decoder.extend(b"he");
        assert_eq!(decoder.next_frame().unwrap(), None);
        decoder.extend(b"llo");
        assert_eq!(decoder.next_frame().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_split_length_prefix() {
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 1024);
        decoder.extend(&[0, 0]);
        assert_eq!(decoder.next_frame().unwrap(), None);
        decoder.extend(&[0, 2, b'o', b'k']);
        assert_eq!(decoder.next_frame().unwrap(), Some(b"ok".to_vec()));
    }

    #[test]
    fn test_multiple_frames_in_one_read() {
        let mut bytes = encode_frame(b"one").unwrap();
        bytes.extend(encode_frame(b"two").unwrap());
        bytes.extend(&[0, 0, 0, 9, b'p']);
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 1024);
        decoder.extend(&bytes);
        assert_eq!(decoder.next_frame().unwrap(), Some(b"one".to_vec()));
        assert_eq!(decoder.next_frame().unwrap(), Some(b"two".to_vec()));
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.buffered(), 5);
    }

    #[test]
    fn test_zero_length_frame() {
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 1024);
        decoder.extend(&[0, 0, 0, 0]);
        assert_eq!(decoder.next_frame().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_oversized_frame_resets_buffer() {
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 16);
        decoder.extend(&[0, 0, 1, 0, 1, 2, 3]);
        assert_eq!(
            decoder.next_frame(),
            Err(FrameError::TooLarge { len: 256, max: 16 })
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_newline_framing() {
        let mut decoder = FrameDecoder::new(Framing::Newline, 1024);
        decoder.extend(b"{\"a\":1}\r\n\n{\"b\"");
        assert_eq!(decoder.next_frame().unwrap(), Some(b"{\"a\":1}".to_vec()));
        assert_eq!(decoder.next_frame().unwrap(), None);
        decoder.extend(b":2}\n");
        assert_eq!(decoder.next_frame().unwrap(), Some(b"{\"b\":2}".to_vec()));
    }

    #[test]
    fn test_newline_runaway_line_is_dropped() {
        let mut decoder = FrameDecoder::new(Framing::Newline, 4);
        decoder.extend(b"abcdefgh");
        assert!(decoder.next_frame().is_err());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_encode_prefixes_length() {
        assert_eq!(
            encode_frame(b"hello").unwrap(),
            vec![0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn test_framing_from_str() {
        assert_eq!("newline".parse::<Framing>(), Ok(Framing::Newline));
        assert_eq!("LENGTH".parse::<Framing>(), Ok(Framing::LengthPrefixed));
        assert!("xml".parse::<Framing>().is_err());
    }
}
