use crate::config::Config;
use crate::record::{enrich, Record};
use crate::source::timestamp::{TimestampError, TimestampExtractor};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, trace};

/// Directive that declares the column names for the lines that follow
pub const FIELDS_DIRECTIVE: &str = "#Fields:";

const COMMENT_MARKER: char = '#';
const SEPARATOR: char = ' ';

/// Errors that abort the parse of a whole file. Lines that merely do not fit
/// the active schema are skipped, not reported here.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Timestamp {
        line: usize,
        #[source]
        source: TimestampError,
    },
}

impl ParseError {
    /// True when the schema lacks the configured date or time field
    pub fn is_missing_field(&self) -> bool {
        matches!(
            self,
            ParseError::Timestamp {
                source: TimestampError::MissingField { .. },
                ..
            }
        )
    }
}

/// Ordered field names from the most recent `#Fields:` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    names: Vec<String>,
}

impl FieldSchema {
    /// Returns `None` when the line is not a `#Fields:` directive.
    pub fn from_directive(line: &str) -> Option<Self> {
        let rest = line.strip_prefix(FIELDS_DIRECTIVE)?;
        let rest = rest.strip_prefix(SEPARATOR).unwrap_or(rest);

        let names = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(SEPARATOR).map(str::to_string).collect()
        };

        Some(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Zips a data line against the schema. `None` if the token count differs.
    pub fn zip(&self, line: &str) -> Option<BTreeMap<String, String>> {
        let values: Vec<&str> = line.split(SEPARATOR).collect();
        if values.len() != self.names.len() {
            return None;
        }

        Some(
            self.names
                .iter()
                .cloned()
                .zip(values.into_iter().map(str::to_string))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub records: usize,
    /// Data lines dropped because no schema was active or the arity differed
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub records: Vec<Record>,
    pub stats: ParseStats,
}

/// Reads W3C extended log files into timestamped, enriched records.
#[derive(Debug, Clone)]
pub struct RecordParser {
    timestamps: TimestampExtractor,
    enrich_with: BTreeMap<String, String>,
}

impl RecordParser {
    pub fn new(timestamps: TimestampExtractor, enrich_with: BTreeMap<String, String>) -> Self {
        Self {
            timestamps,
            enrich_with,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, TimestampError> {
        let timestamps =
            TimestampExtractor::new(&config.date_field, &config.time_field, &config.date_format)?;
        Ok(Self::new(timestamps, config.enrich_with.clone()))
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedFile, ParseError> {
        debug!(file = %path.display(), "Parsing file");
        let parsed = self.parse_reader(BufReader::new(File::open(path)?))?;
        debug!(
            file = %path.display(),
            records = parsed.stats.records,
            skipped = parsed.stats.skipped,
            "File read complete"
        );
        Ok(parsed)
    }

    /// Parses line by line. The first timestamp failure aborts the whole
    /// input; nothing parsed before it is returned.
    pub fn parse_reader<R: BufRead>(&self, mut reader: R) -> Result<ParsedFile, ParseError> {
        let mut records = Vec::new();
        let mut stats = ParseStats::default();
        let mut schema: Option<FieldSchema> = None;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            stats.lines += 1;

            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(&['\n', '\r'][..]);

            if let Some(next) = FieldSchema::from_directive(line) {
                trace!(line = stats.lines, fields = next.len(), "Schema line");
                schema = Some(next);
                continue;
            }

            if line.is_empty() || line.starts_with(COMMENT_MARKER) {
                continue;
            }

            let Some(fields) = schema.as_ref().and_then(|s| s.zip(line)) else {
                trace!(line = stats.lines, "Skipping line that does not match the schema");
                stats.skipped += 1;
                continue;
            };

            let record = self
                .timestamps
                .extract(fields)
                .map_err(|source| ParseError::Timestamp {
                    line: stats.lines,
                    source,
                })?;

            records.push(enrich(record, &self.enrich_with));
            stats.records += 1;
        }

        Ok(ParsedFile { records, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TIMESTAMP_FIELD;
    use std::io::Cursor;

    fn parser(enrich_with: &[(&str, &str)]) -> RecordParser {
        RecordParser::new(
            TimestampExtractor::new("date", "time", "yyyy-MM-dd").unwrap(),
            enrich_with
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn parse(input: &str) -> Result<ParsedFile, ParseError> {
        parser(&[]).parse_reader(Cursor::new(input.as_bytes().to_vec()))
    }

    #[test]
    fn test_schema_from_directive() {
        let schema = FieldSchema::from_directive("#Fields: date time cs-uri-stem").unwrap();
        assert_eq!(schema.names(), &["date", "time", "cs-uri-stem"]);
        assert!(FieldSchema::from_directive("#Software: IIS").is_none());
        assert!(FieldSchema::from_directive("#Fields:").unwrap().is_empty());
    }

    #[test]
    fn test_schema_zip_requires_exact_arity() {
        let schema = FieldSchema::from_directive("#Fields: A B C").unwrap();

        let fields = schema.zip("1 2 3").unwrap();
        assert_eq!(fields.get("A").map(String::as_str), Some("1"));
        assert_eq!(fields.get("B").map(String::as_str), Some("2"));
        assert_eq!(fields.get("C").map(String::as_str), Some("3"));

        assert!(schema.zip("1 2").is_none());
        assert!(schema.zip("1 2 3 4").is_none());
        // A doubled separator yields an extra empty token
        let fields = schema.zip("1  2").unwrap();
        assert_eq!(fields.get("A").map(String::as_str), Some("1"));
        assert_eq!(fields.get("B").map(String::as_str), Some(""));
        assert_eq!(fields.get("C").map(String::as_str), Some("2"));

        let pair = FieldSchema::from_directive("#Fields: A B").unwrap();
        assert!(pair.zip("1 2").is_some());
        assert!(pair.zip("1  2").is_none());
    }

    #[test]
    fn test_parses_iis_log() {
        let input = "#Software: Microsoft Internet Information Services 10.0\r\n\
                     #Version: 1.0\r\n\
                     #Date: 2024-01-02 03:04:05\r\n\
                     #Fields: date time cs-method cs-uri-stem sc-status\r\n\
                     2024-01-02 03:04:05 GET /index.html 200\r\n\
                     2024-01-02 03:04:06 POST /login 302\r\n";
        let parsed = parse(input).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.stats.lines, 6);
        assert_eq!(parsed.stats.skipped, 0);

        let first = &parsed.records[0];
        assert_eq!(first.get(TIMESTAMP_FIELD), Some("2024-01-02T03:04:05Z"));
        assert_eq!(first.get("cs-method"), Some("GET"));
        assert_eq!(first.get("sc-status"), Some("200"));
        assert_eq!(first.get("date"), None);
        assert_eq!(first.get("time"), None);
    }

    #[test]
    fn test_skips_lines_before_schema_and_wrong_arity() {
        let input = "2024-01-02 03:04:05 GET\n\
                     #Fields: date time cs-method\n\
                     2024-01-02 03:04:05\n\
                     2024-01-02 03:04:05 GET extra\n\
                     \n\
                     2024-01-02 03:04:07 PUT\n";
        let parsed = parse(input).unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].get("cs-method"), Some("PUT"));
        assert_eq!(parsed.stats.skipped, 3);
    }

    #[test]
    fn test_schema_changes_mid_file() {
        let input = "#Fields: date time a\n\
                     2024-01-02 00:00:01 x\n\
                     #Fields: date time a b\n\
                     2024-01-02 00:00:02 y\n\
                     2024-01-02 00:00:03 y z\n";
        let parsed = parse(input).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].get("a"), Some("x"));
        assert_eq!(parsed.records[1].get("b"), Some("z"));
        assert_eq!(parsed.stats.skipped, 1);
    }

    #[test]
    fn test_missing_timestamp_field_aborts() {
        let input = "#Fields: day clock cs-method\n\
                     2024-01-02 03:04:05 GET\n";
        let err = parse(input).unwrap_err();

        assert!(err.is_missing_field());
        assert!(matches!(err, ParseError::Timestamp { line: 2, .. }));
    }

    #[test]
    fn test_schema_without_timestamp_after_valid_lines_aborts() {
        let input = "#Fields: date time a\n\
                     2024-01-02 00:00:01 x\n\
                     #Fields: a b\n\
                     x y\n";
        assert!(parse(input).unwrap_err().is_missing_field());
    }

    #[test]
    fn test_unparseable_time_aborts() {
        let input = "#Fields: date time a\n\
                     2024-01-02 noon x\n";
        let err = parse(input).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Timestamp {
                source: TimestampError::InvalidTime { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_enrichment_applied_per_record() {
        let input = "#Fields: date time s-sitename\n\
                     2024-01-02 00:00:01 W3SVC1\n";
        let parsed = parser(&[("s-sitename", "shop"), ("env", "prod")])
            .parse_reader(Cursor::new(input.as_bytes().to_vec()))
            .unwrap();

        let record = &parsed.records[0];
        assert_eq!(record.get("s-sitename"), Some("shop"));
        assert_eq!(record.get("env"), Some("prod"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut input = b"#Fields: date time a\n2024-01-02 00:00:01 ".to_vec();
        input.extend_from_slice(&[0xff, b'\n']);
        let parsed = parser(&[]).parse_reader(Cursor::new(input)).unwrap();
        assert_eq!(parsed.records[0].get("a"), Some("\u{fffd}"));
    }
}
