//! End-to-end tests: provider streams + EPG file -> associations -> export

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use tempfile::TempDir;

use epg_mapper::matching::{MatchOptions, NameNormalization, StrategyKind};
use epg_mapper::session::{ExportFormat, MappingSession, export_mappings};

const GUIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="DasErste.de"><display-name>Das Erste</display-name></channel>
  <channel id="ZDF.de"><display-name>ZDF</display-name></channel>
  <channel id="sport1.de"><display-name>Sport 1</display-name></channel>
  <programme channel="daserste.de" start="20240101060000 +0100" stop="20240101090000 +0100"><title>Morgenmagazin</title></programme>
  <programme channel="DASERSTE.DE" start="20240101090000 +0100" stop="20240101091500 +0100"><title>Tagesschau</title></programme>
  <programme channel="sport1.de" start="20240101060000 +0100" stop="20240101080000 +0100"><title>Bundesliga</title></programme>
</tv>
"#;

const STREAMS: &str = r#"[
  {"num": 1, "name": "Das Erste", "stream_type": "live", "stream_id": 11, "epg_channel_id": null},
  {"num": 2, "name": "ZDF HD", "stream_type": "live", "stream_id": 12, "epg_channel_id": "ZDF.de"},
  {"num": 3, "name": "Sport 1", "stream_type": "live", "stream_id": "13"},
  {"num": 4, "name": "SPORT 1 ", "stream_type": "live", "stream_id": 14}
]"#;

fn write_gzip_guide(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("guide.xml.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(GUIDE.as_bytes()).unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

fn loaded_session() -> MappingSession {
    let dir = TempDir::new().unwrap();
    let path = write_gzip_guide(&dir);

    let mut session = MappingSession::new();
    assert_eq!(session.load_provider_json(STREAMS).unwrap(), 4);
    assert_eq!(session.load_epg_file(&path).unwrap(), 3);
    session
}

#[test]
fn test_greedy_auto_match_and_csv_export() {
    let mut session = loaded_session();

    let matched = session.auto_match(&MatchOptions::default()).unwrap();
    // "zdf hd" vs "zdf" scores 2*3/9, below the default threshold
    assert_eq!(matched, 3);

    let csv = export_mappings(&session, ExportFormat::Csv).unwrap();
    assert_eq!(
        csv,
        "stream_id,name,epg_channel_id,epg_name\n\
         11,Das Erste,DasErste.de,Das Erste\n\
         13,Sport 1,sport1.de,Sport 1\n\
         14,SPORT 1 ,sport1.de,Sport 1\n"
    );
}

#[test]
fn test_exclusive_strategy_with_stripped_tags() {
    let mut session = loaded_session();
    let options = MatchOptions {
        strategy: StrategyKind::Exclusive,
        normalization: NameNormalization::StripQualityTags,
        ..MatchOptions::default()
    };

    let matched = session.auto_match(&options).unwrap();
    assert_eq!(matched, 3);
    assert_eq!(session.mappings()["12"], "ZDF.de");
    assert_eq!(session.mappings()["13"], "sport1.de");
    assert!(!session.mappings().contains_key("14"));
}

#[test]
fn test_manual_edits_survive_auto_match_and_show_in_views() {
    let mut session = loaded_session();
    session.map(12, "ZDF.de").unwrap();
    session.auto_match(&MatchOptions::default()).unwrap();

    let rows = session.provider_view("zdf");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].mapped_to.as_deref(), Some("ZDF.de"));
    assert_eq!(rows[0].mapped_name.as_deref(), Some("ZDF"));

    let epg = session.epg_view("");
    let counts: Vec<Option<usize>> = epg.iter().map(|row| row.programme_count).collect();
    assert_eq!(counts, vec![Some(2), None, Some(1)]);

    assert!(session.unmap("12"));
    let txt = export_mappings(&session, ExportFormat::Txt).unwrap();
    assert!(!txt.contains("ZDF"));
    assert!(txt.starts_with("Das Erste = DasErste.de\n"));
}

#[test]
fn test_json_export_round_trips_provider_ids() {
    let mut session = loaded_session();
    session.auto_match(&MatchOptions::default()).unwrap();

    let json = export_mappings(&session, ExportFormat::Json).unwrap();
    let rows: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["stream_id"], 11);
    assert_eq!(rows[1]["stream_id"], "13");
    assert_eq!(rows[1]["epg_name"], "Sport 1");
}
