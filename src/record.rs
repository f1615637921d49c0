use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Key under which the derived event time is stored in every document.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// One parsed log entry: raw field values plus the event time derived from
/// the date and time columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    timestamp: DateTime<Utc>,
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(timestamp: DateTime<Utc>, fields: BTreeMap<String, String>) -> Self {
        Self { timestamp, fields }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Calendar day (UTC) the record is indexed under
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

// Documents are sent as a flat object of the fields only.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Merges static pairs into a record. A static value replaces a parsed
/// value stored under the same key.
pub fn enrich(record: Record, pairs: &BTreeMap<String, String>) -> Record {
    if pairs.is_empty() {
        return record;
    }

    let Record { timestamp, mut fields } = record;
    fields.extend(pairs.iter().map(|(k, v)| (k.clone(), v.clone())));
    Record { timestamp, fields }
}
