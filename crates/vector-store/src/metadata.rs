use crate::error::{Result, VectorStoreError};
use crate::types::MetadataRecord;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Write records as line-delimited JSON, in order
pub fn write_metadata(path: impl AsRef<Path>, records: &[MetadataRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut writer = BufWriter::new(std::fs::File::create(&tmp)?);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read line-delimited metadata; blank lines are ignored
pub fn read_metadata(path: impl AsRef<Path>) -> Result<Vec<MetadataRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            VectorStoreError::corrupt(path, format!("line {}: {e}", line_no + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}
