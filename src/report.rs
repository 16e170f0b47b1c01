//! Report series output.
//!
//! One JSON line per simulated step, preceded by a run header, so a chart
//! collaborator (or a later analysis pass) can replay the whole series.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::config::{Scenario, SimConfig};
use crate::simulator::ReportData;

#[derive(Serialize)]
struct RunHeader {
    scenario: Scenario,
    seed: u64,
    entities: usize,
    allow_deaths: bool,
    allow_age: bool,
    started_at: String,
}

pub struct ReportWriter {
    writer: BufWriter<File>,
}

impl ReportWriter {
    /// Creates the file and writes the run header line.
    pub fn create(path: impl AsRef<Path>, config: &SimConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let header = RunHeader {
            scenario: config.scenario,
            seed: config.seed,
            entities: config.entities,
            allow_deaths: config.allow_deaths,
            allow_age: config.allow_age,
            started_at: Local::now().to_rfc3339(),
        };
        serde_json::to_writer(&mut writer, &header)?;
        writer.write_all(b"\n")?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, report: &ReportData) -> Result<()> {
        serde_json::to_writer(&mut self.writer, report)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_writes_header_and_one_line_per_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let config = SimConfig::default();

        let mut writer = ReportWriter::create(&path, &config).unwrap();
        for day in 0..3 {
            writer
                .append(&ReportData {
                    susceptible: 199,
                    infected: 1,
                    recovered: 0,
                    dead: 0,
                    peak_infected_concurrent: 1,
                    day,
                })
                .unwrap();
        }
        writer.finish().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);

        let header: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(header["scenario"], "free-for-all");
        assert_eq!(header["entities"], 200);

        let report: ReportData = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(report.day, 1);
        assert_eq!(report.susceptible, 199);
    }
}
