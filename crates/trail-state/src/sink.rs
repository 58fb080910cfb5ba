use crate::FrameRecord;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Receives per-frame results in strictly increasing frame-index order.
///
/// The analysis driver calls `record` once per analyzed frame and `flush`
/// when the run ends (cleanly or not); records written before a mid-run
/// failure stay valid and must not be retracted.
pub trait ResultSink {
    fn record(&mut self, record: &FrameRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Reference sink: one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    records: u64,
}

impl JsonLinesSink<std::io::BufWriter<std::fs::File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create record file {}", path.display()))?;
        Ok(Self::new(std::io::BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, records: 0 }
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn record(&mut self, record: &FrameRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record).context("Failed to serialize record")?;
        self.writer
            .write_all(b"\n")
            .context("Failed to write record")?;
        self.records += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush record sink")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FrameAnalysis, Position, VitalStats};

    #[test]
    fn test_jsonl_sink_writes_one_line_per_record() {
        let mut sink = JsonLinesSink::new(Vec::new());
        for i in 0..3u64 {
            let record = FrameRecord {
                frame_index: i,
                timestamp_secs: i as f64 * 0.04,
                analysis: FrameAnalysis {
                    player_coords: Some(Position { x: 100, y: 200, z: 7 }),
                    stats: VitalStats {
                        hp_percent: 88.5,
                        mana_percent: 42.0,
                    },
                    battle_list: vec![],
                },
            };
            sink.record(&record).unwrap();
        }
        sink.flush().unwrap();
        assert_eq!(sink.records_written(), 3);

        let text = String::from_utf8(sink.writer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let parsed: FrameRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.frame_index, 1);
        assert_eq!(parsed.analysis.player_coords.unwrap().z, 7);
    }

    #[test]
    fn test_record_round_trips_absent_position() {
        let record = FrameRecord {
            frame_index: 9,
            timestamp_secs: 0.36,
            analysis: FrameAnalysis::new(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: FrameRecord = serde_json::from_str(&json).unwrap();
        assert!(back.analysis.player_coords.is_none());
        assert!(back.analysis.battle_list.is_empty());
    }
}
