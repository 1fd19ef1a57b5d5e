//! Channel directory extraction

use std::io::BufRead;
use std::ops::ControlFlow;
use tracing::debug;

use super::stream::{XmlTag, XmltvVisitor, scan_strict};
use super::{TAG_CHANNEL, TAG_DISPLAY_NAME};
use crate::errors::ParseResult;
use crate::models::EpgChannel;

/// A `<channel>` whose end tag has not been seen yet
struct OpenChannel {
    slot: usize,
    depth: usize,
    display_name: Option<String>,
    capturing: bool,
}

/// Collects every `<channel>` element, at any depth, in document order
#[derive(Default)]
pub struct ChannelCollector {
    channels: Vec<EpgChannel>,
    open: Vec<OpenChannel>,
}

impl ChannelCollector {
    pub fn into_channels(self) -> Vec<EpgChannel> {
        self.channels
    }
}

impl XmltvVisitor for ChannelCollector {
    fn open(&mut self, tag: &XmlTag<'_>, depth: usize) -> ControlFlow<()> {
        // the name is the text before the first child element
        if let Some(channel) = self.open.last_mut() {
            if channel.capturing && depth == channel.depth + 2 {
                channel.capturing = false;
            }
        }

        match tag.name() {
            TAG_CHANNEL => {
                self.channels.push(EpgChannel::new(
                    tag.attribute("id").unwrap_or_default(),
                    String::new(),
                ));
                self.open.push(OpenChannel {
                    slot: self.channels.len() - 1,
                    depth,
                    display_name: None,
                    capturing: false,
                });
            }
            TAG_DISPLAY_NAME => {
                if let Some(channel) = self.open.last_mut() {
                    if depth == channel.depth + 1 && channel.display_name.is_none() {
                        channel.display_name = Some(String::new());
                        channel.capturing = true;
                    }
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn text(&mut self, text: &str, depth: usize) {
        if let Some(channel) = self.open.last_mut() {
            if channel.capturing && depth == channel.depth + 1 {
                if let Some(name) = channel.display_name.as_mut() {
                    name.push_str(text);
                }
            }
        }
    }

    fn close(&mut self, name: &str, depth: usize) -> ControlFlow<()> {
        let Some(channel) = self.open.last_mut() else {
            return ControlFlow::Continue(());
        };

        if name == TAG_DISPLAY_NAME && channel.capturing && depth == channel.depth + 1 {
            channel.capturing = false;
        } else if name == TAG_CHANNEL && depth == channel.depth {
            if let Some(finished) = self.open.pop() {
                self.channels[finished.slot].name = finished.display_name.unwrap_or_default();
            }
        }
        ControlFlow::Continue(())
    }
}

/// Parse the channel directory of an XMLTV document.
///
/// The whole document must be well-formed; a damaged document yields a
/// [`crate::errors::ParseError`] rather than a partial list.
pub fn parse_channels(xml_text: &str) -> ParseResult<Vec<EpgChannel>> {
    parse_channels_from_reader(xml_text.as_bytes())
}

/// [`parse_channels`] over any buffered reader
pub fn parse_channels_from_reader<R: BufRead>(source: R) -> ParseResult<Vec<EpgChannel>> {
    let mut collector = ChannelCollector::default();
    let report = scan_strict(source, &mut collector)?;
    let channels = collector.into_channels();
    debug!(
        channels = channels.len(),
        elements = report.elements_released,
        "Parsed XMLTV channel directory"
    );
    Ok(channels)
}
