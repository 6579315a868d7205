//! Replica record export
//!
//! Records go to the log as one JSON line each and, when an output directory
//! is given, to:
//! - `replicas.jsonl`: the full flattened record per line, appended as each
//!   replica finishes
//! - `summary.csv`: replica, seed, metric means and strategy modes, written
//!   once the run is over

use crate::error::Result;
use crate::replica::ReplicaRecord;
use crate::stats::Metric;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub const RECORDS_FILE: &str = "replicas.jsonl";
pub const SUMMARY_FILE: &str = "summary.csv";

/// Emit a record as a single structured log line
pub fn log_record(record: &ReplicaRecord) -> Result<()> {
    let json = serde_json::to_string(record)?;
    tracing::info!(replica = record.replica, record = %json, "replica record");
    Ok(())
}

/// Write one JSON object per line
pub fn write_records_jsonl<P: AsRef<Path>>(records: &[ReplicaRecord], path: P) -> Result<()> {
    let mut writer = JsonlWriter::create(path)?;
    for record in records {
        writer.append(record)?;
    }
    Ok(())
}

/// Appends records to a JSON-lines file as they arrive
///
/// Each record is flushed on write so finished replicas survive an
/// interrupted run.
pub struct JsonlWriter {
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(JsonlWriter {
            writer: BufWriter::new(File::create(path)?),
            written: 0,
        })
    }

    pub fn append(&mut self, record: &ReplicaRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

/// Per-record sink for `ReplicaRunner::on_record`
///
/// Logs each record and, given a directory, appends it to `replicas.jsonl`
/// there. A record that cannot be written is logged and the run goes on.
pub fn record_sink(dir: Option<&Path>) -> Result<impl Fn(&ReplicaRecord) + Send + Sync> {
    let writer = match dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            Some(Mutex::new(JsonlWriter::create(dir.join(RECORDS_FILE))?))
        }
        None => None,
    };
    Ok(move |record: &ReplicaRecord| {
        if let Err(err) = log_record(record) {
            tracing::error!(replica = record.replica, "failed to log record: {err}");
        }
        if let Some(writer) = &writer {
            let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = writer.append(record) {
                tracing::error!(replica = record.replica, "failed to append record: {err}");
            }
        }
    })
}

/// Write the per-replica summary table
pub fn write_summary_csv<P: AsRef<Path>>(records: &[ReplicaRecord], path: P) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let slots = records.iter().map(|r| r.modes.0.len()).max().unwrap_or(0);

    let mut header: Vec<String> = vec!["replica".to_string(), "seed".to_string()];
    header.extend(Metric::ALL.iter().map(|m| m.name().to_string()));
    for i in 0..slots {
        header.push(format!("strat{i}"));
        header.push(format!("prev{i}"));
    }
    wtr.write_record(&header)?;

    for record in records {
        let mut row = vec![record.replica.to_string(), record.seed.to_string()];
        for metric in Metric::ALL {
            row.push(
                record
                    .means
                    .get(metric)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        for i in 0..slots {
            match record.modes.0.get(i) {
                Some(mode) => {
                    row.push(mode.strategy.clone());
                    row.push(mode.frequency.to_string());
                }
                None => {
                    row.push(String::new());
                    row.push(String::new());
                }
            }
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write all outputs to a directory, creating it if needed
pub fn write_all<P: AsRef<Path>>(records: &[ReplicaRecord], dir: P) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    write_records_jsonl(records, dir.join(RECORDS_FILE))?;
    write_summary_csv(records, dir.join(SUMMARY_FILE))?;
    tracing::info!(dir = %dir.display(), records = records.len(), "wrote output");
    Ok(())
}
