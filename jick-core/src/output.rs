use crate::error::{CoreError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use jick_scanner::sink::{EndpointSink, LineSink, flush_all};
use jick_scanner::{CrawlOutcome, Endpoint, ScanError};
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// `web_crawler_output_<Y>-<M>-<D>_<h>_<m>.txt`, fields unpadded.
pub fn default_output_path(now: NaiveDateTime) -> PathBuf {
    PathBuf::from(format!(
        "web_crawler_output_{}-{}-{}_{}_{}.txt",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute()
    ))
}

/// Text sink appending one `<METHOD> <URL>` line per endpoint to a file.
pub struct FileSink {
    path: PathBuf,
    lines: LineSink<BufWriter<File>>,
}

impl FileSink {
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CoreError::file(&path, e))?;
        Ok(Self {
            path,
            lines: LineSink::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EndpointSink for FileSink {
    fn write_endpoint(&mut self, endpoint: &Endpoint) -> jick_scanner::error::Result<()> {
        self.lines.write_endpoint(endpoint)
    }

    fn finish(&mut self) -> jick_scanner::error::Result<()> {
        self.lines.finish()
    }
}

/// `{reason, visited, endpoints:[{method, url}]}`
pub fn to_json(outcome: &CrawlOutcome) -> Result<String> {
    Ok(serde_json::to_string_pretty(outcome)?)
}

/// Persists an outcome. Text output appends; JSON replaces the file.
pub fn write_outcome(outcome: &CrawlOutcome, path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let mut sink = FileSink::append(path)?;
            flush_all(&outcome.endpoints, &mut sink).map_err(|e| match e {
                ScanError::Io(source) => CoreError::file(path, source),
                other => CoreError::Scan(other),
            })
        }
        OutputFormat::Json => {
            let json = to_json(outcome)?;
            std::fs::write(path, json).map_err(|e| CoreError::file(path, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_default_output_path_is_unpadded() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 0)
            .unwrap();
        assert_eq!(
            default_output_path(now),
            PathBuf::from("web_crawler_output_2024-3-9_7_5.txt")
        );
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("text"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("csv"), None);
    }
}
