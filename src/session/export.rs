//! Rendering of the current associations

use serde::Serialize;
use strum::{Display, EnumString};

use super::MappingSession;
use crate::errors::AppResult;
use crate::models::StreamId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Txt,
}

/// One association, resolved against the loaded channels.
///
/// Names are empty when the provider or EPG channel is no longer loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub stream_id: StreamId,
    pub name: String,
    pub epg_channel_id: String,
    pub epg_name: String,
}

const CSV_HEADER: &str = "stream_id,name,epg_channel_id,epg_name";

/// Associations ordered by provider key
pub fn export_rows(session: &MappingSession) -> Vec<ExportRow> {
    session
        .mappings()
        .iter()
        .map(|(key, epg_id)| {
            let provider = session.provider_channel(key);
            ExportRow {
                stream_id: provider
                    .map(|p| p.stream_id.clone())
                    .unwrap_or_else(|| StreamId::from(key.as_str())),
                name: provider.map(|p| p.name.clone()).unwrap_or_default(),
                epg_channel_id: epg_id.clone(),
                epg_name: session
                    .epg_channel(epg_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
            }
        })
        .collect()
}

pub fn export_mappings(session: &MappingSession, format: ExportFormat) -> AppResult<String> {
    let rows = export_rows(session);
    let rendered = match format {
        ExportFormat::Json => serde_json::to_string_pretty(&rows)?,
        ExportFormat::Csv => {
            let mut out = String::from(CSV_HEADER);
            out.push('\n');
            for row in &rows {
                let fields = [
                    row.stream_id.to_string(),
                    row.name.clone(),
                    row.epg_channel_id.clone(),
                    row.epg_name.clone(),
                ];
                let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
                out.push_str(&line.join(","));
                out.push('\n');
            }
            out
        }
        ExportFormat::Txt => rows
            .iter()
            .map(|row| format!("{} = {}\n", row.name, row.epg_channel_id))
            .collect(),
    };
    Ok(rendered)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
