//! Streaming counterpart of [`decode_text`](super::decompression::decode_text)
//!
//! Wraps a byte reader and hands out UTF-8 only. UTF-8 input is validated
//! chunk by chunk (sequences split across reads are carried over); Latin-1
//! input is transcoded. Undecodable bytes fail the read with an
//! [`std::io::ErrorKind::InvalidData`] error carrying a [`DecodeError`].

use std::io::{self, Read};

use crate::errors::DecodeError;

const CHUNK_SIZE: usize = 8 * 1024;
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEncoding {
    /// Plain UTF-8; `declared` is a non-UTF-8 label from the XML declaration, if any
    Utf8 { declared: Option<String> },
    Latin1,
}

pub struct TextReader<R> {
    inner: R,
    encoding: SourceEncoding,
    source_name: String,
    /// Input bytes already emitted, BOM excluded
    offset: usize,
    /// Trailing bytes of an incomplete UTF-8 sequence
    carry: Vec<u8>,
    out: Vec<u8>,
    out_pos: usize,
    started: bool,
    /// Offset of an undecodable byte, reported after the valid prefix was handed out
    failed_at: Option<usize>,
}

impl<R: Read> TextReader<R> {
    pub fn new(inner: R, encoding: SourceEncoding, source_name: impl Into<String>) -> Self {
        Self {
            inner,
            encoding,
            source_name: source_name.into(),
            offset: 0,
            carry: Vec::new(),
            out: Vec::with_capacity(CHUNK_SIZE * 2),
            out_pos: 0,
            started: false,
            failed_at: None,
        }
    }

    fn decode_error(&self, valid_up_to: usize) -> io::Error {
        let err = match &self.encoding {
            SourceEncoding::Utf8 {
                declared: Some(encoding),
            } => DecodeError::UnsupportedEncoding {
                source_name: self.source_name.clone(),
                encoding: encoding.clone(),
            },
            _ => DecodeError::invalid_utf8(self.source_name.as_str(), valid_up_to),
        };
        io::Error::new(io::ErrorKind::InvalidData, err)
    }

    /// Decode the next chunk into `out`; `false` at end of input
    fn refill(&mut self) -> io::Result<bool> {
        self.out.clear();
        self.out_pos = 0;
        if let Some(at) = self.failed_at {
            return Err(self.decode_error(at));
        }

        let mut raw = [0u8; CHUNK_SIZE];
        let n = loop {
            match self.inner.read(&mut raw) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        if n == 0 {
            if self.carry.is_empty() {
                return Ok(false);
            }
            return Err(self.decode_error(self.offset));
        }

        match self.encoding {
            SourceEncoding::Latin1 => {
                let mut utf8 = [0u8; 2];
                for &b in &raw[..n] {
                    self.out
                        .extend_from_slice((b as char).encode_utf8(&mut utf8).as_bytes());
                }
                self.offset += n;
            }
            SourceEncoding::Utf8 { .. } => {
                let mut data = std::mem::take(&mut self.carry);
                data.extend_from_slice(&raw[..n]);
                if !self.started {
                    if data.starts_with(&UTF8_BOM) {
                        data.drain(..UTF8_BOM.len());
                        self.started = true;
                    } else if !UTF8_BOM.starts_with(&data) {
                        self.started = true;
                    }
                }

                match std::str::from_utf8(&data) {
                    Ok(_) => {}
                    // incomplete sequence at the end of this chunk
                    Err(e) if e.error_len().is_none() => {
                        self.carry = data.split_off(e.valid_up_to());
                    }
                    Err(e) => {
                        let valid_up_to = e.valid_up_to();
                        if valid_up_to == 0 {
                            return Err(self.decode_error(self.offset));
                        }
                        data.truncate(valid_up_to);
                        self.failed_at = Some(self.offset + valid_up_to);
                    }
                }
                self.offset += data.len();
                self.out = data;
            }
        }
        Ok(true)
    }
}

impl<R: Read> Read for TextReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.out_pos == self.out.len() {
            if !self.refill()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.out.len() - self.out_pos);
        buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
        self.out_pos += n;
        Ok(n)
    }
}

/// The [`DecodeError`] carried by an I/O error from a [`TextReader`], if any
pub fn decode_error_of(err: &io::Error) -> Option<&DecodeError> {
    err.get_ref().and_then(|inner| inner.downcast_ref::<DecodeError>())
}
