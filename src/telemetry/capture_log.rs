//! JSONL capture log

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::protocol::capture::CaptureEvent;
use crate::session::CaptureSink;

/// One line of the capture log
#[derive(Debug, Serialize)]
struct CaptureRecord<'a> {
    timestamp: DateTime<Utc>,
    event: &'a CaptureEvent,
}

/// Writes one JSON object per capture event
///
/// ```text
/// {"timestamp":"2024-05-01T12:00:00.123Z","event":{"kind":"start","address":80,"direction":"write","acknowledged":true}}
/// ```
pub struct JsonlCaptureLog<W: Write> {
    writer: W,
    records: u64,
}

impl JsonlCaptureLog<BufWriter<File>> {
    /// Open `path` for appending, creating it if needed
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        debug!("Capture log opened at {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonlCaptureLog<W> {
    /// Log into an arbitrary writer
    pub fn new(writer: W) -> Self {
        Self { writer, records: 0 }
    }

    /// Append one event stamped with the current time
    pub fn record(&mut self, event: &CaptureEvent) -> io::Result<()> {
        self.record_at(Utc::now(), event)
    }

    /// Append one event with an explicit timestamp
    pub fn record_at(&mut self, timestamp: DateTime<Utc>, event: &CaptureEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, &CaptureRecord { timestamp, event })?;
        self.writer.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    /// Number of events written
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush buffered lines
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> CaptureSink for JsonlCaptureLog<W> {
    fn on_event(&mut self, event: CaptureEvent) -> io::Result<()> {
        self.record(&event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::Direction;
    use chrono::TimeZone;

    #[test]
    fn test_record_format() {
        let mut log = JsonlCaptureLog::new(Vec::new());
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        log.record_at(
            timestamp,
            &CaptureEvent::Start {
                address: 0x50,
                direction: Direction::Write,
                acknowledged: true,
            },
        )
        .unwrap();
        log.record_at(timestamp, &CaptureEvent::Stop).unwrap();
        assert_eq!(log.records(), 2);

        let text = String::from_utf8(log.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"timestamp":"2024-05-01T12:00:00Z","event":{"kind":"start","address":80,"direction":"write","acknowledged":true}}"#,
                r#"{"timestamp":"2024-05-01T12:00:00Z","event":{"kind":"stop"}}"#,
            ]
        );
    }

    #[test]
    fn test_sink_writes_parseable_lines() {
        let mut log = JsonlCaptureLog::new(Vec::new());
        log.on_event(CaptureEvent::Byte {
            value: 0xAB,
            acknowledged: false,
        })
        .unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["event"]["kind"], "byte");
        assert_eq!(value["event"]["value"], 0xAB);
        assert_eq!(value["event"]["acknowledged"], false);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_create_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jsonl");

        for _ in 0..2 {
            let mut log = JsonlCaptureLog::create(&path).unwrap();
            log.record(&CaptureEvent::Stop).unwrap();
            log.flush().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
