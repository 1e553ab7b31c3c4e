//! Incremental request body boundaries.
//!
//! Bodies are streamed upstream as they arrive, so the proxy only needs to
//! know where each one ends. Chunk framing is checked byte by byte and never
//! rescanned.

use crate::http::parser::ParseError;
use crate::http::request::BodyFraming;

/// Remaining body of one request.
#[derive(Debug)]
pub enum BodyTracker {
    Length(u64),
    Chunked(ChunkedDecoder),
}

impl BodyTracker {
    /// `None` when the request has no body.
    pub fn new(framing: BodyFraming) -> Option<Self> {
        match framing {
            BodyFraming::Empty => None,
            BodyFraming::Length(len) => Some(Self::Length(len)),
            BodyFraming::Chunked => Some(Self::Chunked(ChunkedDecoder::new())),
        }
    }

    /// Accounts for bytes at the front of `buf` and returns how many of them
    /// belong to the body.
    pub fn advance(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        match self {
            Self::Length(remaining) => {
                let n = (*remaining).min(buf.len() as u64);
                *remaining -= n;
                Ok(n as usize)
            }
            Self::Chunked(decoder) => decoder.advance(buf),
        }
    }

    pub fn is_done(&self) -> bool {
        match self {
            Self::Length(remaining) => *remaining == 0,
            Self::Chunked(decoder) => decoder.is_done(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Extension,
    SizeLf,
    Data,
    DataCr,
    DataLf,
    TrailerStart,
    TrailerLine,
    TrailerLf,
    FinalLf,
    Done,
}

/// Tracks `Transfer-Encoding: chunked` framing across reads.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: ChunkState,
    /// Size of the chunk being read, then bytes of it still to come
    size: u64,
    digits: usize,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self {
            state: ChunkState::Size,
            size: 0,
            digits: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == ChunkState::Done
    }

    /// Consumes framing and data from `buf`, stopping after the final
    /// chunk's trailer. Returns the number of bytes consumed.
    pub fn advance(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let mut pos = 0;

        while pos < buf.len() && self.state != ChunkState::Done {
            if self.state == ChunkState::Data {
                let n = self.size.min((buf.len() - pos) as u64);
                self.size -= n;
                pos += n as usize;
                if self.size == 0 {
                    self.state = ChunkState::DataCr;
                }
                continue;
            }

            let byte = buf[pos];
            pos += 1;

            self.state = match (self.state, byte) {
                (ChunkState::Size, b'\r') if self.digits > 0 => ChunkState::SizeLf,
                (ChunkState::Size, b';' | b' ' | b'\t') if self.digits > 0 => {
                    ChunkState::Extension
                }
                (ChunkState::Size, b) => {
                    let digit = (b as char).to_digit(16).ok_or(ParseError::InvalidChunk)?;
                    self.size = self
                        .size
                        .checked_mul(16)
                        .and_then(|s| s.checked_add(u64::from(digit)))
                        .ok_or(ParseError::InvalidChunk)?;
                    self.digits += 1;
                    ChunkState::Size
                }
                (ChunkState::Extension, b'\r') => ChunkState::SizeLf,
                (ChunkState::Extension, _) => ChunkState::Extension,
                (ChunkState::SizeLf, b'\n') if self.size == 0 => ChunkState::TrailerStart,
                (ChunkState::SizeLf, b'\n') => ChunkState::Data,
                (ChunkState::DataCr, b'\r') => ChunkState::DataLf,
                (ChunkState::DataLf, b'\n') => {
                    self.digits = 0;
                    ChunkState::Size
                }
                // Trailer fields end at an empty line
                (ChunkState::TrailerStart, b'\r') => ChunkState::FinalLf,
                (ChunkState::TrailerLine, b'\r') => ChunkState::TrailerLf,
                (ChunkState::TrailerStart | ChunkState::TrailerLine, _) => ChunkState::TrailerLine,
                (ChunkState::TrailerLf, b'\n') => ChunkState::TrailerStart,
                (ChunkState::FinalLf, b'\n') => ChunkState::Done,
                _ => return Err(ParseError::InvalidChunk),
            };
        }

        Ok(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_end_with_trailer() {
        let body = b"4\r\nWiki\r\n0\r\nExpires: never\r\n\r\nNEXT";
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(decoder.advance(body).unwrap(), body.len() - 4);
        assert!(decoder.is_done());
    }

    #[test]
    fn chunked_rejects_bad_size() {
        let mut decoder = ChunkedDecoder::new();
        assert_eq!(decoder.advance(b"zz\r\n"), Err(ParseError::InvalidChunk));
    }

    #[test]
    fn chunked_rejects_missing_data_terminator() {
        let mut decoder = ChunkedDecoder::new();
        assert_eq!(decoder.advance(b"2\r\nabX"), Err(ParseError::InvalidChunk));
    }

    #[test]
    fn chunked_split_across_reads() {
        let body = b"5;name=v\r\nhello\r\n10\r\n0123456789abcdef\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();

        let mut consumed = 0;
        for piece in body.chunks(3) {
            assert!(!decoder.is_done());
            consumed += decoder.advance(piece).unwrap();
        }

        assert_eq!(consumed, body.len());
        assert!(decoder.is_done());
    }

    #[test]
    fn length_stops_at_declared_size() {
        let mut tracker = BodyTracker::new(BodyFraming::Length(5)).unwrap();

        assert_eq!(tracker.advance(b"hel").unwrap(), 3);
        assert!(!tracker.is_done());
        assert_eq!(tracker.advance(b"loGET /").unwrap(), 2);
        assert!(tracker.is_done());
    }

    #[test]
    fn empty_framing_has_no_tracker() {
        assert!(BodyTracker::new(BodyFraming::Empty).is_none());
    }
}
