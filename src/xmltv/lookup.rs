//! Per-channel programme lookup
//!
//! The scan always runs to the end of the document so `total_found` reports
//! every matching programme, even when only `limit` of them are returned.

use std::io::BufRead;
use std::ops::ControlFlow;
use tracing::{debug, warn};

use super::stream::{ScanReport, XmlTag, XmltvVisitor, scan};
use super::{TAG_DESC, TAG_PROGRAMME, TAG_TITLE};
use crate::models::{Programme, ProgrammeLookup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Desc,
}

struct OpenProgramme {
    depth: usize,
    start: String,
    stop: String,
    title: Option<String>,
    desc: Option<String>,
    capturing: Option<Field>,
}

impl OpenProgramme {
    fn field_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Desc => &mut self.desc,
        }
    }

    fn finish(self) -> Programme {
        Programme {
            start: self.start,
            stop: self.stop,
            title: self.title.map(|t| t.trim().to_string()).unwrap_or_default(),
            desc: self.desc.map(|d| d.trim().to_string()).unwrap_or_default(),
        }
    }
}

/// Collects programmes of one channel
pub struct ProgrammeCollector {
    channel: String,
    limit: usize,
    lookup: ProgrammeLookup,
    current: Option<OpenProgramme>,
}

impl ProgrammeCollector {
    pub fn new(epg_id: &str, limit: usize) -> Self {
        Self {
            channel: epg_id.trim().to_lowercase(),
            limit,
            lookup: ProgrammeLookup::default(),
            current: None,
        }
    }

    pub fn into_lookup(self) -> ProgrammeLookup {
        self.lookup
    }

    fn is_target(&self, tag: &XmlTag<'_>) -> bool {
        tag.attribute("channel")
            .map(|ch| ch.trim().to_lowercase() == self.channel)
            .unwrap_or(false)
    }
}

impl XmltvVisitor for ProgrammeCollector {
    fn open(&mut self, tag: &XmlTag<'_>, depth: usize) -> ControlFlow<()> {
        if let Some(programme) = self.current.as_mut() {
            if programme.capturing.is_some() && depth == programme.depth + 2 {
                programme.capturing = None;
            }
        }

        match tag.name() {
            TAG_PROGRAMME if self.current.is_none() && self.is_target(tag) => {
                self.lookup.total_found += 1;
                if self.lookup.programmes.len() < self.limit {
                    self.current = Some(OpenProgramme {
                        depth,
                        start: tag.attribute("start").unwrap_or_default(),
                        stop: tag.attribute("stop").unwrap_or_default(),
                        title: None,
                        desc: None,
                        capturing: None,
                    });
                }
            }
            name @ (TAG_TITLE | TAG_DESC) => {
                let field = if name == TAG_TITLE { Field::Title } else { Field::Desc };
                if let Some(programme) = self.current.as_mut() {
                    if depth == programme.depth + 1
                        && programme.capturing.is_none()
                        && programme.field_mut(field).is_none()
                    {
                        *programme.field_mut(field) = Some(String::new());
                        programme.capturing = Some(field);
                    }
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn text(&mut self, text: &str, depth: usize) {
        if let Some(programme) = self.current.as_mut() {
            if depth == programme.depth + 1 {
                if let Some(field) = programme.capturing {
                    if let Some(value) = programme.field_mut(field).as_mut() {
                        value.push_str(text);
                    }
                }
            }
        }
    }

    fn close(&mut self, name: &str, depth: usize) -> ControlFlow<()> {
        let Some(programme) = self.current.as_mut() else {
            return ControlFlow::Continue(());
        };

        if depth == programme.depth + 1 && (name == TAG_TITLE || name == TAG_DESC) {
            programme.capturing = None;
        } else if depth == programme.depth && name == TAG_PROGRAMME {
            if let Some(finished) = self.current.take() {
                self.lookup.programmes.push(finished.finish());
            }
        }
        ControlFlow::Continue(())
    }
}

/// Return up to `limit` programmes of `epg_id` (case-insensitive) plus the
/// total number of programmes found for it.
///
/// A damaged document yields whatever was found before the damage.
pub fn lookup_programmes(xml_text: &str, epg_id: &str, limit: usize) -> ProgrammeLookup {
    lookup_programmes_from_reader(xml_text.as_bytes(), epg_id, limit).0
}

/// [`lookup_programmes`] over any buffered reader, with the scan report so
/// callers can tell a complete lookup from a partial one
pub fn lookup_programmes_from_reader<R: BufRead>(
    source: R,
    epg_id: &str,
    limit: usize,
) -> (ProgrammeLookup, ScanReport) {
    let mut collector = ProgrammeCollector::new(epg_id, limit);
    let report = scan(source, &mut collector);
    let lookup = collector.into_lookup();

    if let Some(err) = &report.error {
        warn!(
            epg_id,
            total_found = lookup.total_found,
            "EPG document damaged, returning partial programme lookup: {err}"
        );
    } else {
        debug!(
            epg_id,
            returned = lookup.programmes.len(),
            total_found = lookup.total_found,
            "Programme lookup finished"
        );
    }
    (lookup, report)
}
