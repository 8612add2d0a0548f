//! Investigation dataset reader.
//!
//! One record per line of a delimited file with a header row. Column names
//! follow the published investigations dataset (`investigation`,
//! `investigation-start`, ..., `president`); unknown columns are ignored.

use crate::annotation::is_missing;
use chrono::NaiveDate;
use csv::{Reader, ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Errors raised while reading the dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// The input file could not be opened.
    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The delimiter setting is not a single ASCII character.
    #[error("Invalid delimiter {0:?}: expected a single ASCII character")]
    InvalidDelimiter(String),

    /// The header row or a record could not be decoded.
    #[error("Line {line}: {message}")]
    Decode { line: u64, message: String },

    /// A record decoded but lacks a required value.
    #[error("Line {line}: {message}")]
    InvalidRow { line: u64, message: String },
}

impl DatasetError {
    /// True for errors confined to a single record.
    pub fn is_row_error(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::InvalidRow { .. })
    }
}

/// One investigation record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvestigationRow {
    pub investigation: String,
    #[serde(rename = "investigation-start", default)]
    pub investigation_start: Option<NaiveDate>,
    #[serde(rename = "investigation-end", default)]
    pub investigation_end: Option<NaiveDate>,
    #[serde(rename = "investigation-days", default, deserialize_with = "optional_int")]
    pub investigation_days: Option<i64>,
    /// Investigatee
    pub name: String,
    #[serde(rename = "indictment-days", default, deserialize_with = "optional_int")]
    pub indictment_days: Option<i64>,
    /// Outcome type (`indictment`, `guilty-plea`, `conviction`, ...)
    #[serde(rename = "type", default, deserialize_with = "optional_text")]
    pub result: Option<String>,
    #[serde(rename = "cp-date", default)]
    pub cp_date: Option<NaiveDate>,
    #[serde(rename = "cp-days", default, deserialize_with = "optional_int")]
    pub cp_days: Option<i64>,
    #[serde(default, deserialize_with = "flag")]
    pub overturned: bool,
    #[serde(default, deserialize_with = "flag")]
    pub pardoned: bool,
    #[serde(default, deserialize_with = "flag")]
    pub american: bool,
    #[serde(default, deserialize_with = "optional_text")]
    pub president: Option<String>,
}

impl InvestigationRow {
    /// Whether this row carries a conviction-like outcome (anything but a bare indictment).
    pub fn has_conviction(&self) -> bool {
        self.result
            .as_deref()
            .is_some_and(|r| !r.trim().eq_ignore_ascii_case("indictment"))
    }

    fn validate(&self) -> Result<(), String> {
        if is_missing(&self.investigation) {
            return Err("missing investigation name".to_string());
        }
        if is_missing(&self.name) {
            return Err("missing investigatee name".to_string());
        }
        Ok(())
    }
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !is_missing(v)))
}

fn optional_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = optional_text(deserializer)? else {
        return Ok(None);
    };
    let value = value.trim();
    // Spreadsheet exports sometimes write whole numbers as `151.0`.
    let whole = match value.split_once('.') {
        Some((whole, fraction)) if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') => {
            whole
        }
        Some(_) => {
            return Err(serde::de::Error::custom(format!(
                "invalid integer '{value}': not a whole number"
            )));
        }
        None => value,
    };
    whole
        .parse::<i64>()
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("invalid integer '{value}': {e}")))
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = optional_text(deserializer)? else {
        return Ok(false);
    };
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid flag '{other}'"))),
    }
}

/// Streaming reader over the dataset records.
#[derive(Debug)]
pub struct Dataset<R> {
    reader: Reader<R>,
    headers: StringRecord,
}

impl Dataset<File> {
    /// Open a delimited file. `delimiter` must be one ASCII character.
    pub fn open(path: impl AsRef<Path>, delimiter: &str) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = Self::from_reader(file, delimiter)?;
        info!(
            name: "dataset.opened",
            path = %path.display(),
            columns = dataset.headers.len(),
            "Dataset opened"
        );
        Ok(dataset)
    }
}

impl<R: std::io::Read> Dataset<R> {
    pub fn from_reader(reader: R, delimiter: &str) -> Result<Self, DatasetError> {
        let delimiter = parse_delimiter(delimiter)?;
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(Trim::All)
            .has_headers(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|e| DatasetError::Decode {
                line: 1,
                message: e.to_string(),
            })?
            .clone();
        Ok(Self { reader, headers })
    }

    /// Decode and validate every remaining record.
    pub fn rows(&mut self) -> impl Iterator<Item = Result<InvestigationRow, DatasetError>> + '_ {
        let headers = &self.headers;
        self.reader.records().map(move |record| {
            let record = record.map_err(|e| DatasetError::Decode {
                line: e.position().map_or(0, csv::Position::line),
                message: e.to_string(),
            })?;
            let line = record.position().map_or(0, csv::Position::line);
            let row: InvestigationRow =
                record
                    .deserialize(Some(headers))
                    .map_err(|e| DatasetError::Decode {
                        line,
                        message: e.to_string(),
                    })?;
            row.validate()
                .map_err(|message| DatasetError::InvalidRow { line, message })?;
            Ok(row)
        })
    }
}

fn parse_delimiter(delimiter: &str) -> Result<u8, DatasetError> {
    match delimiter.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ if delimiter == "\\t" => Ok(b'\t'),
        _ => Err(DatasetError::InvalidDelimiter(delimiter.to_string())),
    }
}
