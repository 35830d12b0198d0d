//! Output sinks
//!
//! A [`Sink`] renders records either as comma-delimited rows or as
//! self-describing JSON objects, one line per record. A set of static
//! fields, resolved from environment variables once at open time, is
//! appended to every record.

use crate::error::{Error, Result};
use crate::metrics::FieldValue;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

const SEPARATOR: char = ',';

/// Output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFormat {
    /// Comma-separated rows, optional header line. Values are written
    /// verbatim; fields must not contain the separator.
    Delimited,
    /// One JSON object per line. Self-describing, so no header line is
    /// ever written regardless of the header flag.
    Structured,
}

/// Configuration for [`Sink::open`].
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub path: PathBuf,
    pub fields: Vec<String>,
    pub static_fields: Vec<String>,
    pub format: SinkFormat,
    pub write_header: bool,
}

impl SinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fields: Vec::new(),
            static_fields: Vec::new(),
            format: SinkFormat::Delimited,
            write_header: true,
        }
    }

    /// Set the caller-visible field names (the base header).
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Name environment variables to resolve once and append to every record.
    pub fn with_static_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_fields = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_format(mut self, format: SinkFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_write_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }
}

/// A static field bound at open time; its value never changes for the
/// lifetime of the sink.
#[derive(Debug, Clone)]
struct StaticField {
    name: String,
    value: String,
}

/// One JSON record: effective header names zipped with values, serialized
/// in header order.
struct Record<'a> {
    names: &'a [&'a str],
    values: &'a [&'a FieldValue],
}

impl Serialize for Record<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.names.len()))?;
        for (name, value) in self.names.iter().zip(self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A persistent record sink over a file destination.
pub struct Sink {
    writer: Option<BufWriter<File>>,
    fields: Vec<String>,
    statics: Vec<StaticField>,
    format: SinkFormat,
    write_header: bool,
}

impl Sink {
    /// Open a sink, resolving static fields against the process environment.
    pub fn open(config: SinkConfig) -> Result<Self> {
        Self::open_with_lookup(config, |name| std::env::var(name).ok())
    }

    /// Open a sink with an explicit environment lookup.
    ///
    /// All static field names are resolved before the destination is
    /// created; a single unresolved name fails the whole construction and
    /// leaves no file behind.
    pub fn open_with_lookup<F>(config: SinkConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let statics = config
            .static_fields
            .iter()
            .map(|name| {
                lookup(name)
                    .map(|value| StaticField {
                        name: name.clone(),
                        value,
                    })
                    .ok_or_else(|| Error::MissingEnvVar(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        // The structured format is self-describing; the header flag is
        // forced off rather than rejected.
        let write_header = config.write_header && config.format == SinkFormat::Delimited;

        let file = File::create(&config.path)?;
        let writer = BufWriter::new(file);

        let mut sink = Self {
            writer: Some(writer),
            fields: config.fields,
            statics,
            format: config.format,
            write_header,
        };

        if write_header {
            let header = sink.header().join(&SEPARATOR.to_string());
            let w = sink.writer.as_mut().ok_or(Error::SinkClosed)?;
            writeln!(w, "{}", header)?;
            w.flush()?;
        }

        log::debug!(
            "opened {} sink with {} fields and {} static fields",
            match sink.format {
                SinkFormat::Delimited => "delimited",
                SinkFormat::Structured => "structured",
            },
            sink.fields.len(),
            sink.statics.len()
        );

        Ok(sink)
    }

    /// The effective header: caller fields followed by static field names.
    pub fn header(&self) -> Vec<&str> {
        self.fields
            .iter()
            .map(String::as_str)
            .chain(self.statics.iter().map(|s| s.name.as_str()))
            .collect()
    }

    /// Whether a header line was written at open time.
    pub fn writes_header(&self) -> bool {
        self.write_header
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Append one record; `values` must match the configured field names,
    /// static field values are appended automatically.
    pub fn write(&mut self, values: &[FieldValue]) -> Result<()> {
        if values.len() != self.fields.len() {
            return Err(Error::FieldCountMismatch {
                expected: self.fields.len(),
                got: values.len(),
            });
        }
        let writer = self.writer.as_mut().ok_or(Error::SinkClosed)?;

        let static_values: Vec<FieldValue> = self
            .statics
            .iter()
            .map(|s| FieldValue::Text(s.value.clone()))
            .collect();
        let all_values: Vec<&FieldValue> = values.iter().chain(static_values.iter()).collect();

        match self.format {
            SinkFormat::Delimited => {
                let row = all_values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(&SEPARATOR.to_string());
                writeln!(writer, "{}", row)?;
            }
            SinkFormat::Structured => {
                let names: Vec<&str> = self
                    .fields
                    .iter()
                    .map(String::as_str)
                    .chain(self.statics.iter().map(|s| s.name.as_str()))
                    .collect();
                let record = Record {
                    names: &names,
                    values: &all_values,
                };
                let line = serde_json::to_string(&record)
                    .map_err(|e| Error::Io(std::io::Error::other(e)))?;
                writeln!(writer, "{}", line)?;
            }
        }

        Ok(())
    }

    /// Flush and release the destination. Further writes fail with
    /// [`Error::SinkClosed`]; closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = SinkConfig::new("/tmp/out.csv")
            .with_fields(["a", "b"])
            .with_static_fields(["TAG"])
            .with_format(SinkFormat::Structured)
            .with_write_header(false);

        assert_eq!(config.fields, vec!["a", "b"]);
        assert_eq!(config.static_fields, vec!["TAG"]);
        assert_eq!(config.format, SinkFormat::Structured);
        assert!(!config.write_header);
    }

    #[test]
    fn test_record_serialization_preserves_order() {
        let zero = FieldValue::Count(0);
        let one = FieldValue::Count(1);
        let values = [&zero, &one];
        let record = Record {
            names: &["zzz", "aaa"],
            values: &values,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"zzz":0,"aaa":1}"#);
    }
}
