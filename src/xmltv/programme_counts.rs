//! Programme-count index built in one streaming pass

use std::io::BufRead;
use std::ops::ControlFlow;
use tracing::{debug, warn};

use super::TAG_PROGRAMME;
use super::stream::{ScanReport, XmlTag, XmltvVisitor, scan};
use crate::models::ProgrammeCounts;

/// Counts `<programme>` elements per lowercased `channel` attribute
#[derive(Debug, Default)]
pub struct ProgrammeCounter {
    counts: ProgrammeCounts,
}

impl ProgrammeCounter {
    pub fn into_counts(self) -> ProgrammeCounts {
        self.counts
    }
}

impl XmltvVisitor for ProgrammeCounter {
    fn open(&mut self, tag: &XmlTag<'_>, _depth: usize) -> ControlFlow<()> {
        if tag.name() == TAG_PROGRAMME {
            if let Some(channel) = tag.attribute("channel") {
                let channel = channel.trim();
                if !channel.is_empty() {
                    *self.counts.entry(channel.to_lowercase()).or_insert(0) += 1;
                }
            }
        }
        ControlFlow::Continue(())
    }
}

/// Count programmes per channel id.
///
/// Never fails: if the document is damaged part-way, the counts gathered
/// before the damage are returned.
pub fn build_programme_counts(xml_text: &str) -> ProgrammeCounts {
    build_programme_counts_from_reader(xml_text.as_bytes()).0
}

/// [`build_programme_counts`] over any buffered reader, also returning the scan report
pub fn build_programme_counts_from_reader<R: BufRead>(source: R) -> (ProgrammeCounts, ScanReport) {
    let mut counter = ProgrammeCounter::default();
    let report = scan(source, &mut counter);
    let counts = counter.into_counts();

    if let Some(err) = &report.error {
        warn!(
            channels = counts.len(),
            bytes_read = report.bytes_read,
            "EPG document damaged, keeping partial programme counts: {err}"
        );
    } else {
        debug!(
            channels = counts.len(),
            elements = report.elements_released,
            "Built programme-count index"
        );
    }
    (counts, report)
}

/// Point lookup into a count index, case-insensitive on the channel id
pub fn programme_count(counts: &ProgrammeCounts, epg_id: &str) -> Option<usize> {
    counts.get(&epg_id.trim().to_lowercase()).copied()
}
