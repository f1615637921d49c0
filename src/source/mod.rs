pub mod claim;
pub mod discover;
pub mod reader;
pub mod timestamp;

pub use claim::{claim, ClaimError, ClaimedFile, CLAIM_SUFFIX};
pub use discover::{discover_log_files, is_log_file};
pub use reader::{FieldSchema, ParseError, ParsedFile, RecordParser};
pub use timestamp::{TimestampError, TimestampExtractor};
