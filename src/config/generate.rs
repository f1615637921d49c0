pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LUMBERJACK CONFIGURATION
# =============================================================================
# Lumberjack picks up finished W3C / IIS style *.log files, turns every data
# line into a JSON document and ships them to Elasticsearch through the bulk
# API, one index per day.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ./lumberjack.yml
#   3. ~/.config/lumberjack/config.yml
#   4. /etc/lumberjack/config.yml
#
# Values may reference environment variables, written as $env{...} with the
# variable name between the braces.

# Directory scanned for *.log files (defaults to the working directory).
# Files are renamed to <name>.log.lock while they are being processed.
source_directory: /var/log/iis

# Where finished files are moved. Files with at least one failed upload get
# an extra .error suffix.
processed_directory: /var/log/iis/processed

# -----------------------------------------------------------------------------
# Timestamp
# -----------------------------------------------------------------------------
# The date and time columns are combined into a single @timestamp field (UTC)
# and removed from the document.
date_field: date
time_field: time
# strptime ('%Y-%m-%d') or yyyy/MM/dd tokens ('yyyy-MM-dd')
date_format: yyyy-MM-dd

# -----------------------------------------------------------------------------
# Elasticsearch
# -----------------------------------------------------------------------------
elasticsearch_url: http://localhost
# Used when elasticsearch_url carries no explicit port
elasticsearch_port: 9200
# {date} is replaced by the entry's day as yyyy.MM.dd
index_format: "iis-{date}"
document_type: iis
# Documents per bulk request
chunk_size: 1000
request_timeout: 30s

# -----------------------------------------------------------------------------
# Processing
# -----------------------------------------------------------------------------
# Files processed at the same time (defaults to the number of CPUs)
# max_concurrent_files: 4

# Static fields added to every document. They overwrite parsed fields with
# the same name.
enrich_with:
  environment: production

# -----------------------------------------------------------------------------
# Logging
# -----------------------------------------------------------------------------
# Besides the console, write a daily rolling log file (lumberjack.log.YYYY-MM-DD)
# into this directory. Keep it outside source_directory.
# log_directory: /var/log/lumberjack
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::parse_config;

    #[test]
    fn test_starter_config_is_valid() {
        let config = parse_config(&generate_starter_config()).expect("starter config should be valid");
        assert_eq!(config.index_format, "iis-{date}");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(
            config.enrich_with.get("environment").map(String::as_str),
            Some("production")
        );
    }
}
