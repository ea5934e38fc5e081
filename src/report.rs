//! Collaborators that receive training progress: per-epoch reports and the final loss history.

use crate::error::Result;
use crate::train::{EpochReport, TrainingHistory};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

pub trait TrainingObserver {
    fn on_epoch(&mut self, _report: &EpochReport) {}

    /// Receives the full loss history once training ends. An error here is logged by the training
    /// loop and otherwise ignored.
    fn on_finish(&mut self, _history: &TrainingHistory) -> Result<()> {
        Ok(())
    }
}

/// Ignores everything.
pub struct Silent;

impl TrainingObserver for Silent {}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct ReportCollector {
    pub reports: Vec<EpochReport>,
    pub finished: Option<TrainingHistory>,
}

impl TrainingObserver for ReportCollector {
    fn on_epoch(&mut self, report: &EpochReport) {
        self.reports.push(*report);
    }

    fn on_finish(&mut self, history: &TrainingHistory) -> Result<()> {
        self.finished = Some(history.clone());
        Ok(())
    }
}

/// Writes the loss history as JSON, ready to be plotted by an external tool.
#[derive(Debug, Clone)]
pub struct HistoryWriter {
    path: PathBuf,
}

impl HistoryWriter {
    pub fn new(path: impl Into<PathBuf>) -> HistoryWriter {
        HistoryWriter { path: path.into() }
    }
}

impl TrainingObserver for HistoryWriter {
    fn on_finish(&mut self, history: &TrainingHistory) -> Result<()> {
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(writer, history)?;
        info!("wrote loss history to {}", self.path.display());
        Ok(())
    }
}
