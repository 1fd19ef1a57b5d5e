/// Configuration default values
///
/// Every tunable has its default here so the serde defaults, the CLI and the
/// library agree on one value.
// Matching defaults
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;

// Indexer defaults
pub const DEFAULT_LOOKUP_LIMIT: usize = 50;
pub const DEFAULT_COMPRESSED_SUFFIXES: &[&str] = &[".gz", ".gzip"];

// Logging defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Config file
pub const DEFAULT_CONFIG_FILE: &str = "epg-mapper.toml";
pub const CONFIG_FILE_ENV: &str = "EPG_MAPPER_CONFIG";
