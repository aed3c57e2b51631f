//! Output file writers
//!
//! Writes records as newline-delimited JSON and schemas as pretty JSON, the
//! two files a BigQuery load job consumes.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::Result;

/// Extension appended for the records file
pub const NDJSON_EXTENSION: &str = ".ndjson";
/// Extension appended for the schema file
pub const SCHEMA_EXTENSION: &str = ".bqschema.json";

/// Streams values as newline-delimited JSON
pub struct NdjsonWriter<W: Write> {
    inner: W,
    lines: usize,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, lines: 0 }
    }

    /// Write one value as a single compact JSON line
    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.inner, value)?;
        self.inner.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Lines written so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flush and return the number of lines written
    pub fn finish(mut self) -> Result<usize> {
        self.inner.flush()?;
        Ok(self.lines)
    }
}

fn with_extension(outfile: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(outfile.as_os_str());
    path.push(extension);
    PathBuf::from(path)
}

/// Write `<outfile>.ndjson` with one record per line and
/// `<outfile>.bqschema.json` with the pretty-printed schema
///
/// Returns the paths of the two files.
pub fn write_to_file<T, S>(
    records: &[T],
    outfile: impl AsRef<Path>,
    schema: &S,
) -> Result<(PathBuf, PathBuf)>
where
    T: Serialize,
    S: Serialize + ?Sized,
{
    let outfile = outfile.as_ref();
    let data_path = with_extension(outfile, NDJSON_EXTENSION);
    let schema_path = with_extension(outfile, SCHEMA_EXTENSION);

    let mut writer = NdjsonWriter::new(BufWriter::new(File::create(&data_path)?));
    for record in records {
        writer.write(record)?;
    }
    let lines = writer.finish()?;

    let mut schema_writer = BufWriter::new(File::create(&schema_path)?);
    serde_json::to_writer_pretty(&mut schema_writer, schema)?;
    schema_writer.write_all(b"\n")?;
    schema_writer.flush()?;

    debug!(
        records = lines,
        data = %data_path.display(),
        schema = %schema_path.display(),
        "wrote output files"
    );
    Ok((data_path, schema_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;
    use serde_json::json;

    #[test]
    fn test_ndjson_writer_lines() {
        let mut writer = NdjsonWriter::new(Vec::new());
        writer.write(&json!({"b": 1, "a": [1, 2]})).unwrap();
        writer.write(&json!("text")).unwrap();
        assert_eq!(writer.lines(), 2);

        let mut buffer = Vec::new();
        {
            let mut writer = NdjsonWriter::new(&mut buffer);
            writer.write(&json!({"b": 1, "a": [1, 2]})).unwrap();
            writer.write(&json!("text")).unwrap();
            assert_eq!(writer.finish().unwrap(), 2);
        }
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "{\"b\":1,\"a\":[1,2]}\n\"text\"\n"
        );
    }

    #[test]
    fn test_ndjson_writer_accepts_records() {
        let mut buffer = Vec::new();
        {
            let mut writer = NdjsonWriter::new(&mut buffer);
            let ticket = Record::new()
                .with("id", 3)
                .with("via", Record::new().with("channel", "web"));
            writer.write(&ticket).unwrap();
            assert_eq!(writer.finish().unwrap(), 1);
        }
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "{\"id\":3,\"via\":{\"channel\":\"web\"}}\n"
        );
    }

    #[test]
    fn test_ndjson_writer_empty() {
        let writer = NdjsonWriter::new(Vec::new());
        assert_eq!(writer.finish().unwrap(), 0);
    }

    #[test]
    fn test_with_extension_appends() {
        assert_eq!(
            with_extension(Path::new("/tmp/tickets.2024"), NDJSON_EXTENSION),
            PathBuf::from("/tmp/tickets.2024.ndjson")
        );
        assert_eq!(
            with_extension(Path::new("out"), SCHEMA_EXTENSION),
            PathBuf::from("out.bqschema.json")
        );
    }
}
