//! Gzip detection and text decoding for raw EPG payloads
//!
//! XMLTV feeds arrive either as plain XML or gzip-compressed (`.xml.gz`).
//! Detection looks at the gzip magic bytes first; the source name suffix and
//! the transport `Content-Encoding` are only consulted when the magic bytes
//! are absent. A payload that fails to decompress is treated as plain text.

use anyhow::{Context, Result};
use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use super::text_reader::{SourceEncoding, TextReader};
use crate::config::defaults::DEFAULT_COMPRESSED_SUFFIXES;
use crate::errors::DecodeError;

/// Gzip member header magic
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Compression formats we know how to undo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Uncompressed,
}

/// Advisory information about where a payload came from
#[derive(Debug, Clone, Default)]
pub struct DecodeHints {
    /// File name or URL path of the payload
    pub source_name: Option<String>,
    /// Transport-level `Content-Encoding` header value
    pub content_encoding: Option<String>,
}

impl DecodeHints {
    pub fn from_name<S: Into<String>>(source_name: S) -> Self {
        Self {
            source_name: Some(source_name.into()),
            content_encoding: None,
        }
    }

    pub fn with_content_encoding<S: Into<String>>(mut self, encoding: S) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    fn display_name(&self) -> &str {
        self.source_name.as_deref().unwrap_or("<memory>")
    }
}

/// Magic file detection and decompression utility
#[derive(Debug, Clone)]
pub struct DecompressionService {
    compressed_suffixes: Vec<String>,
}

impl Default for DecompressionService {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSED_SUFFIXES.iter().map(|s| s.to_string()).collect())
    }
}

impl DecompressionService {
    /// Create a service recognising the given source name suffixes as gzip
    pub fn new(compressed_suffixes: Vec<String>) -> Self {
        Self {
            compressed_suffixes: compressed_suffixes
                .into_iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Detect compression format using magic bytes
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        if data.starts_with(&GZIP_MAGIC) {
            CompressionFormat::Gzip
        } else {
            CompressionFormat::Uncompressed
        }
    }

    /// Whether the name or transport hints claim the payload is gzip
    pub fn hints_suggest_gzip(&self, hints: &DecodeHints) -> bool {
        let by_encoding = hints
            .content_encoding
            .as_deref()
            .map(|enc| {
                enc.split(',')
                    .any(|part| matches!(part.trim().to_ascii_lowercase().as_str(), "gzip" | "x-gzip"))
            })
            .unwrap_or(false);

        let by_name = hints
            .source_name
            .as_deref()
            .map(|name| {
                let name = name.to_ascii_lowercase();
                self.compressed_suffixes
                    .iter()
                    .any(|suffix| name.ends_with(suffix.as_str()))
            })
            .unwrap_or(false);

        by_encoding || by_name
    }

    /// Undo gzip compression if the payload appears to be compressed.
    ///
    /// Never fails: when decompression does not work out the original bytes
    /// are returned untouched.
    pub fn decompress(&self, data: Bytes, hints: &DecodeHints) -> Bytes {
        let by_magic = Self::detect_compression_format(&data) == CompressionFormat::Gzip;
        if !by_magic && !self.hints_suggest_gzip(hints) {
            return data;
        }

        match Self::decompress_gzip(&data) {
            Ok(decompressed) => {
                debug!(
                    source = hints.display_name(),
                    compressed = data.len(),
                    decompressed = decompressed.len(),
                    by_magic,
                    "Decompressed gzip EPG payload"
                );
                Bytes::from(decompressed)
            }
            Err(e) => {
                warn!(
                    source = hints.display_name(),
                    by_magic,
                    "Gzip decompression failed, treating payload as plain text: {e:#}"
                );
                data
            }
        }
    }

    /// Decompress (if needed) and decode a payload into XML text
    pub fn decode(&self, data: impl Into<Bytes>, hints: &DecodeHints) -> Result<String, DecodeError> {
        let data = self.decompress(data.into(), hints);
        decode_text(data.to_vec(), hints.display_name())
    }

    /// Open an EPG file as a buffered UTF-8 reader, gunzipping on the fly.
    ///
    /// Unlike [`DecompressionService::decode`] nothing is buffered beyond the
    /// reader's window, so this is the entry point for streaming passes over
    /// very large files. Text is decoded the same way as by
    /// [`decode_text`]: a declared Latin-1 document is transcoded and any other
    /// undecodable byte fails the read with a [`DecodeError`] (see
    /// [`decode_error_of`](super::text_reader::decode_error_of)).
    pub fn open_reader(&self, path: &Path) -> std::io::Result<Box<dyn BufRead>> {
        let source_name = path.to_string_lossy().into_owned();
        let mut file = BufReader::new(File::open(path)?);
        let by_magic = file.fill_buf()?.starts_with(&GZIP_MAGIC);
        let by_hint = !by_magic && self.hints_suggest_gzip(&DecodeHints::from_name(source_name.as_str()));

        let raw: Box<dyn BufRead> = if (by_magic || by_hint) && Self::gzip_stream_is_readable(path) {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            if by_magic {
                warn!(source = %source_name, "Gzip header without a readable body, treating file as plain text");
            }
            Box::new(file)
        };
        Self::text_reader(raw, source_name)
    }

    /// Wrap a raw byte stream so it yields UTF-8 in the encoding its XML
    /// declaration names
    fn text_reader(mut raw: Box<dyn BufRead>, source_name: String) -> std::io::Result<Box<dyn BufRead>> {
        let declared = declared_encoding(raw.fill_buf()?);
        let encoding = match declared {
            Some(enc) if is_latin1(&enc) => SourceEncoding::Latin1,
            Some(enc) if !is_utf8(&enc) => SourceEncoding::Utf8 { declared: Some(enc) },
            _ => SourceEncoding::Utf8 { declared: None },
        };
        debug!(source = %source_name, ?encoding, "Opened EPG file");
        Ok(Box::new(BufReader::new(TextReader::new(raw, encoding, source_name))))
    }

    /// Whether the start of a gzip file decompresses
    fn gzip_stream_is_readable(path: &Path) -> bool {
        let mut head = [0u8; 512];
        match File::open(path) {
            Ok(file) => MultiGzDecoder::new(BufReader::new(file)).read(&mut head).is_ok(),
            Err(_) => false,
        }
    }

    /// Decompress gzip data (handles multi-member streams)
    fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = MultiGzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .context("Failed to decompress gzip data")?;
        Ok(decompressed)
    }
}

/// Turn raw bytes into text.
///
/// UTF-8 is expected. Documents that declare ISO-8859-1 in their XML
/// declaration are transcoded, since every byte maps to one code point.
pub fn decode_text(bytes: Vec<u8>, source_name: &str) -> Result<String, DecodeError> {
    let bytes = match bytes.strip_prefix(&UTF8_BOM) {
        Some(rest) => rest.to_vec(),
        None => bytes,
    };

    if let Some(enc) = declared_encoding(&bytes).filter(|enc| is_latin1(enc)) {
        debug!(source = source_name, encoding = %enc, "Transcoding Latin-1 EPG payload");
        return Ok(bytes.iter().map(|&b| b as char).collect());
    }

    String::from_utf8(bytes).map_err(|e| {
        let valid_up_to = e.utf8_error().valid_up_to();
        match declared_encoding(e.as_bytes()) {
            Some(enc) if !is_utf8(&enc) => DecodeError::UnsupportedEncoding {
                source_name: source_name.to_string(),
                encoding: enc,
            },
            _ => DecodeError::invalid_utf8(source_name, valid_up_to),
        }
    })
}

fn is_utf8(encoding: &str) -> bool {
    encoding.eq_ignore_ascii_case("utf-8") || encoding.eq_ignore_ascii_case("utf8")
}

fn is_latin1(encoding: &str) -> bool {
    matches!(
        encoding.to_ascii_lowercase().as_str(),
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1"
    )
}

/// Read the `encoding` pseudo-attribute of a leading `<?xml ...?>` declaration
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let decl = head.trim_start().strip_prefix("<?xml")?;
    let decl = &decl[..decl.find("?>")?];
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    Some(value[..value.find(quote)?].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::text_reader::decode_error_of;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_detect_uncompressed() {
        let format = DecompressionService::detect_compression_format(b"<tv></tv>");
        assert_eq!(format, CompressionFormat::Uncompressed);
    }

    #[test]
    fn test_detect_and_decompress_gzip() {
        let service = DecompressionService::default();
        let compressed = gzip(b"<tv></tv>");

        assert_eq!(
            DecompressionService::detect_compression_format(&compressed),
            CompressionFormat::Gzip
        );
        let text = service.decode(compressed, &DecodeHints::default()).unwrap();
        assert_eq!(text, "<tv></tv>");
    }

    #[test]
    fn test_suffix_hint_on_plain_payload_falls_back_to_text() {
        let service = DecompressionService::default();
        let hints = DecodeHints::from_name("guide.xml.gz");

        assert!(service.hints_suggest_gzip(&hints));
        let text = service.decode(&b"<tv/>"[..], &hints).unwrap();
        assert_eq!(text, "<tv/>");
    }

    #[test]
    fn test_content_encoding_hint() {
        let service = DecompressionService::default();
        let hints = DecodeHints::default().with_content_encoding("x-gzip");
        assert!(service.hints_suggest_gzip(&hints));
        assert!(!service.hints_suggest_gzip(&DecodeHints::from_name("guide.xml")));
    }

    #[test]
    fn test_corrupt_gzip_falls_back_to_raw_bytes() {
        let service = DecompressionService::default();
        let mut corrupt = GZIP_MAGIC.to_vec();
        corrupt.extend_from_slice(b"definitely not deflate");

        let out = service.decompress(Bytes::from(corrupt.clone()), &DecodeHints::default());
        assert_eq!(out.as_ref(), corrupt.as_slice());
    }

    #[test]
    fn test_decode_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"<tv/>");
        assert_eq!(decode_text(bytes, "test").unwrap(), "<tv/>");
    }

    #[test]
    fn test_decode_latin1_declared_document() {
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><tv>".to_vec();
        bytes.push(0xE9); // e acute
        bytes.extend_from_slice(b"</tv>");

        let text = decode_text(bytes, "test").unwrap();
        assert!(text.ends_with("<tv>\u{e9}</tv>"));
    }

    #[test]
    fn test_decode_invalid_utf8_is_an_error() {
        let err = decode_text(vec![b'<', b't', 0xFF, 0xFE], "feed").unwrap_err();
        assert_eq!(err, DecodeError::invalid_utf8("feed", 2));
    }

    #[test]
    fn test_decode_unsupported_declared_encoding() {
        let mut bytes = b"<?xml version='1.0' encoding='windows-1252'?><tv>".to_vec();
        bytes.push(0x80);
        let err = decode_text(bytes, "feed").unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedEncoding { ref encoding, .. } if encoding == "windows-1252"));
    }

    #[test]
    fn test_open_reader_streams_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.xml.gz");
        std::fs::write(&path, gzip(b"<tv><channel id=\"a\"/></tv>")).unwrap();

        let mut reader = DecompressionService::default().open_reader(&path).unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "<tv><channel id=\"a\"/></tv>");
    }

    fn open_to_string(path: &Path) -> std::io::Result<String> {
        let mut text = String::new();
        DecompressionService::default()
            .open_reader(path)?
            .read_to_string(&mut text)?;
        Ok(text)
    }

    #[test]
    fn test_open_reader_transcodes_latin1_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.xml");
        std::fs::write(&path, b"<?xml version=\"1.0\" encoding=\"latin1\"?><tv>Caf\xE9</tv>").unwrap();

        let text = open_to_string(&path).unwrap();
        assert!(text.ends_with("<tv>Caf\u{e9}</tv>"));
    }

    #[test]
    fn test_open_reader_rejects_invalid_utf8_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.xml");
        std::fs::write(&path, b"<tv>X\xFF</tv>").unwrap();

        let err = open_to_string(&path).unwrap_err();
        assert_eq!(
            decode_error_of(&err),
            Some(&DecodeError::invalid_utf8(path.to_string_lossy(), 5))
        );
    }

    #[test]
    fn test_open_reader_reads_corrupt_gzip_as_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.xml.gz");
        std::fs::write(&path, b"<tv><channel id=\"a\"/></tv>").unwrap();
        assert_eq!(open_to_string(&path).unwrap(), "<tv><channel id=\"a\"/></tv>");

        let mut corrupt = GZIP_MAGIC.to_vec();
        corrupt.extend_from_slice(b"definitely not deflate");
        std::fs::write(&path, &corrupt).unwrap();
        let err = open_to_string(&path).unwrap_err();
        let expected = service_decode_error(corrupt, &path);
        assert_eq!(decode_error_of(&err), Some(&expected));
    }

    fn service_decode_error(data: Vec<u8>, path: &Path) -> DecodeError {
        DecompressionService::default()
            .decode(data, &DecodeHints::from_name(path.to_string_lossy()))
            .unwrap_err()
    }
}
