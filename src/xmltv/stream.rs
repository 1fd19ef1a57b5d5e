//! Forward-only XMLTV scanner
//!
//! [`scan`] walks a document once with quick-xml and reports every element to
//! an [`XmltvVisitor`]. The reader buffer is cleared after each event and only
//! the names of the currently open elements are kept, so memory is bounded by
//! nesting depth rather than by document size.
//!
//! Structural errors are caught here, at the top of the loop, and stored in
//! the returned [`ScanReport`]. The visitor keeps whatever it accumulated up to
//! that point; callers decide whether the error matters ([`scan_strict`]) or
//! not.

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::io::BufRead;
use std::ops::ControlFlow;

use crate::errors::{DecodeError, ParseError, ParseResult};
use crate::utils::text_reader::decode_error_of;

const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Source name used for decode errors found by the scanner itself
const STREAM_SOURCE: &str = "<stream>";

/// An opening tag, valid for the duration of one visitor callback
pub struct XmlTag<'e> {
    start: &'e BytesStart<'e>,
    name: Cow<'e, str>,
}

impl<'e> XmlTag<'e> {
    fn new(start: &'e BytesStart<'e>) -> Self {
        let name = String::from_utf8_lossy(start.name().into_inner());
        Self { start, name }
    }

    /// Qualified tag name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unescaped value of the first attribute called `key`
    pub fn attribute(&self, key: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|attr| attr.key.as_ref() == key.as_bytes())
            .map(|attr| expand_entities(&String::from_utf8_lossy(&attr.value)))
    }
}

/// Receives elements from [`scan`] in document order.
///
/// `depth` is the number of open ancestors: the root element has depth 0 and
/// text is reported with the depth of the element that contains it.
/// Returning [`ControlFlow::Break`] stops the scan.
pub trait XmltvVisitor {
    fn open(&mut self, _tag: &XmlTag<'_>, _depth: usize) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn text(&mut self, _text: &str, _depth: usize) {}

    fn close(&mut self, _name: &str, _depth: usize) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Bookkeeping for one pass over a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Elements that were closed and dropped
    pub elements_released: u64,
    /// Largest number of simultaneously open elements
    pub peak_depth: usize,
    /// Reader position when the scan ended
    pub bytes_read: u64,
    /// Visitor asked to stop before the end of the document
    pub stopped_early: bool,
    /// Structural error that ended the scan, if any
    pub error: Option<ParseError>,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && !self.stopped_early
    }
}

/// Scan a document, never failing. Errors end up in [`ScanReport::error`].
pub fn scan<R: BufRead, V: XmltvVisitor>(source: R, visitor: &mut V) -> ScanReport {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::with_capacity(READ_BUFFER_CAPACITY);
    let mut open: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut report = ScanReport::default();

    loop {
        let position = reader.buffer_position() as u64;
        let step = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match utf8(e, position + 1) {
                Err(err) => Err(err),
                Ok(_) if open.is_empty() && seen_root => {
                    Err(ParseError::syntax(position, "content after the root element"))
                }
                Ok(_) => {
                    seen_root = true;
                    let tag = XmlTag::new(e);
                    let flow = visitor.open(&tag, open.len());
                    open.push(tag.name.into_owned());
                    report.peak_depth = report.peak_depth.max(open.len());
                    Ok(flow)
                }
            },
            Ok(Event::Empty(ref e)) => match utf8(e, position + 1) {
                Err(err) => Err(err),
                Ok(_) if open.is_empty() && seen_root => {
                    Err(ParseError::syntax(position, "content after the root element"))
                }
                Ok(_) => {
                    seen_root = true;
                    let tag = XmlTag::new(e);
                    let depth = open.len();
                    report.peak_depth = report.peak_depth.max(depth + 1);
                    report.elements_released += 1;
                    match visitor.open(&tag, depth) {
                        ControlFlow::Continue(()) => Ok(visitor.close(tag.name(), depth)),
                        brk => Ok(brk),
                    }
                }
            },
            Ok(Event::End(ref e)) => match utf8(e.name().into_inner(), position + 2) {
                Err(err) => Err(err),
                Ok(name) => match open.pop() {
                    Some(expected) if expected == name => {
                        report.elements_released += 1;
                        Ok(visitor.close(name, open.len()))
                    }
                    Some(expected) => Err(ParseError::syntax(
                        position,
                        format!("expected </{expected}>, found </{name}>"),
                    )),
                    None => Err(ParseError::syntax(position, format!("unexpected </{name}>"))),
                },
            },
            Ok(Event::Text(ref e)) => match decode_text(e, position) {
                Err(err) => Err(err),
                Ok(text) => match open.len() {
                    0 if !text.trim().is_empty() => Err(ParseError::syntax(
                        position,
                        "text outside of the root element",
                    )),
                    0 => Ok(ControlFlow::Continue(())),
                    depth => {
                        visitor.text(&text, depth - 1);
                        Ok(ControlFlow::Continue(()))
                    }
                },
            },
            Ok(Event::CData(ref e)) => match utf8(e, position) {
                Err(err) => Err(err),
                Ok(text) => {
                    if !open.is_empty() {
                        visitor.text(text, open.len() - 1);
                    }
                    Ok(ControlFlow::Continue(()))
                }
            },
            Ok(Event::GeneralRef(ref e)) => match utf8(e, position) {
                Err(err) => Err(err),
                Ok(entity) => {
                    if !open.is_empty() {
                        visitor.text(&expand_entities(&format!("&{entity};")), open.len() - 1);
                    }
                    Ok(ControlFlow::Continue(()))
                }
            },
            Ok(Event::Eof) => {
                report.bytes_read = reader.buffer_position() as u64;
                if let Some(innermost) = open.last() {
                    report.error = Some(ParseError::truncated(open.len(), innermost.as_str()));
                } else if !seen_root {
                    report.error = Some(ParseError::NoRootElement);
                }
                break;
            }
            Ok(_) => Ok(ControlFlow::Continue(())),
            Err(quick_xml::Error::Io(io)) => Err(match decode_error_of(&io) {
                Some(decode) => ParseError::Decode(decode.clone()),
                None => ParseError::read(reader.error_position() as u64, io.to_string()),
            }),
            Err(e) => Err(ParseError::syntax(reader.error_position() as u64, e.to_string())),
        };
        buf.clear();

        match step {
            Ok(ControlFlow::Continue(())) => {}
            Ok(ControlFlow::Break(())) => {
                report.stopped_early = true;
                report.bytes_read = reader.buffer_position() as u64;
                break;
            }
            Err(err) => {
                report.bytes_read = reader.buffer_position() as u64;
                report.error = Some(err);
                break;
            }
        }
    }

    report
}

/// Scan a document and fail on the first structural error
pub fn scan_strict<R: BufRead, V: XmltvVisitor>(source: R, visitor: &mut V) -> ParseResult<ScanReport> {
    let mut report = scan(source, visitor);
    match report.error.take() {
        Some(err) => Err(err),
        None => Ok(report),
    }
}

/// Strict UTF-8 view of raw event bytes starting at `position`
fn utf8(raw: &[u8], position: u64) -> ParseResult<&str> {
    std::str::from_utf8(raw).map_err(|e| {
        ParseError::Decode(DecodeError::invalid_utf8(
            STREAM_SOURCE,
            position as usize + e.valid_up_to(),
        ))
    })
}

/// Strict UTF-8 decode followed by XML entity expansion
fn decode_text(raw: &[u8], position: u64) -> ParseResult<String> {
    utf8(raw, position).map(expand_entities)
}

/// Expand XML entities; text with unknown entities is kept as it was
fn expand_entities(text: &str) -> String {
    match unescape(text) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every callback as a flat trace line
    #[derive(Default)]
    struct Trace {
        lines: Vec<String>,
        stop_after_opens: Option<usize>,
        opens: usize,
    }

    impl XmltvVisitor for Trace {
        fn open(&mut self, tag: &XmlTag<'_>, depth: usize) -> ControlFlow<()> {
            self.opens += 1;
            let id = tag.attribute("id").unwrap_or_default();
            self.lines.push(format!("open {} {depth} {id}", tag.name()));
            match self.stop_after_opens {
                Some(n) if self.opens >= n => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        }

        fn text(&mut self, text: &str, depth: usize) {
            if !text.trim().is_empty() {
                self.lines.push(format!("text {depth} {text}"));
            }
        }

        fn close(&mut self, name: &str, depth: usize) -> ControlFlow<()> {
            self.lines.push(format!("close {name} {depth}"));
            ControlFlow::Continue(())
        }
    }

    #[test]
    fn test_scan_reports_depths_and_releases() {
        let xml = r#"<tv><channel id="a"><display-name>A</display-name></channel><programme channel="a"/></tv>"#;
        let mut trace = Trace::default();
        let report = scan(xml.as_bytes(), &mut trace);

        assert!(report.is_complete());
        assert_eq!(report.elements_released, 4);
        assert_eq!(report.peak_depth, 3);
        assert_eq!(
            trace.lines,
            vec![
                "open tv 0 ",
                "open channel 1 a",
                "open display-name 2 ",
                "text 2 A",
                "close display-name 2",
                "close channel 1",
                "open programme 1 ",
                "close programme 1",
                "close tv 0",
            ]
        );
    }

    #[test]
    fn test_entities_are_expanded_in_text_and_attributes() {
        let xml = r#"<tv><channel id="a&amp;b">Tom &amp; Jerry &#169;</channel></tv>"#;
        let mut trace = Trace::default();
        scan(xml.as_bytes(), &mut trace);

        assert!(trace.lines.contains(&"open channel 1 a&b".to_string()));
        let text: String = trace
            .lines
            .iter()
            .filter_map(|l| l.strip_prefix("text 1 "))
            .collect::<Vec<_>>()
            .join("");
        assert!(text.contains('&'));
        assert!(text.contains('\u{a9}'));
    }

    #[test]
    fn test_truncated_document_keeps_partial_trace() {
        let xml = r#"<tv><channel id="a"/><channel id="b"><display-name>B"#;
        let mut trace = Trace::default();
        let report = scan(xml.as_bytes(), &mut trace);

        assert!(report.error.is_some());
        assert!(trace.lines.contains(&"open channel 1 b".to_string()));
        assert_eq!(report.elements_released, 1);
    }

    #[test]
    fn test_mismatched_end_tag_is_an_error() {
        let xml = "<tv><channel></programme></tv>";
        let err = scan_strict(xml.as_bytes(), &mut Trace::default()).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn test_empty_input_has_no_root() {
        let err = scan_strict("  ".as_bytes(), &mut Trace::default()).unwrap_err();
        assert_eq!(err, ParseError::NoRootElement);
    }

    #[test]
    fn test_visitor_can_stop_the_scan() {
        let xml = "<tv><a/><b/><c/></tv>";
        let mut trace = Trace {
            stop_after_opens: Some(2),
            ..Default::default()
        };
        let report = scan(xml.as_bytes(), &mut trace);

        assert!(report.stopped_early);
        assert!(report.error.is_none());
        assert_eq!(trace.lines.last().unwrap(), "open a 1 ");
    }

    /// Hands out `data`, then fails every further read
    struct Failing<'a> {
        data: &'a [u8],
    }

    impl std::io::Read for Failing<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.data.is_empty() {
                return Err(std::io::Error::other("connection reset"));
            }
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_invalid_utf8_text_is_a_decode_error() {
        let xml = b"<tv><channel id=\"a\">X\xFF</channel></tv>";
        let mut trace = Trace::default();
        let report = scan(&xml[..], &mut trace);

        assert_eq!(
            report.error,
            Some(ParseError::Decode(DecodeError::invalid_utf8(STREAM_SOURCE, 21)))
        );
        assert!(!trace.lines.iter().any(|l| l.starts_with("text")));
    }

    #[test]
    fn test_invalid_utf8_tag_name_is_a_decode_error() {
        let err = scan_strict(&b"<tv><ch\xE9/></tv>"[..], &mut Trace::default()).unwrap_err();
        assert!(matches!(err, ParseError::Decode(DecodeError::InvalidUtf8 { .. })));
    }

    #[test]
    fn test_reader_failure_is_a_read_error() {
        let source = std::io::BufReader::new(Failing {
            data: b"<tv><channel id=\"a\"/>",
        });
        let mut trace = Trace::default();
        let report = scan(source, &mut trace);

        assert!(matches!(report.error, Some(ParseError::Read { .. })));
        assert!(trace.lines.contains(&"close channel 1".to_string()));
    }

    #[test]
    fn test_text_reader_failure_keeps_its_decode_error() {
        use crate::utils::{SourceEncoding, TextReader};

        let text = TextReader::new(
            &b"<tv><channel id=\"a\"/>\xFF</tv>"[..],
            SourceEncoding::Utf8 { declared: None },
            "guide.xml",
        );
        let report = scan(std::io::BufReader::new(text), &mut Trace::default());

        assert_eq!(
            report.error,
            Some(ParseError::Decode(DecodeError::invalid_utf8("guide.xml", 21)))
        );
        assert_eq!(report.elements_released, 1);
    }
}
