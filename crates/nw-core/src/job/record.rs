use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::phase::JobPhase;
use super::pipeline::TrainingConfig;

/// Number of trailing log lines a status snapshot carries.
pub const LOG_VIEW: usize = 50;

/// Mutable state of the current (or last) training job.
#[derive(Debug, Clone, Default)]
pub(crate) struct JobRecord {
    pub phase: JobPhase,
    pub is_training: bool,
    pub progress: f32,
    pub current_epoch: usize,
    pub total_epochs: usize,
    pub loss: f32,
    pub accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
    pub logs: Vec<String>,
    pub config: Option<TrainingConfig>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Point-in-time copy of the job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub is_training: bool,
    #[serde(rename = "status")]
    pub phase: JobPhase,
    pub progress: f32,
    pub current_epoch: usize,
    pub total_epochs: usize,
    pub loss: f32,
    pub accuracy: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_accuracy: Option<f32>,
    /// The last `LOG_VIEW` lines.
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<TrainingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Shared, lock-protected job record. One writer (the running job or the
/// supervisor), many readers.
#[derive(Debug, Default)]
pub(crate) struct StatusBoard {
    record: RwLock<JobRecord>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let r = self.record.read();
        let from = r.logs.len().saturating_sub(LOG_VIEW);
        JobSnapshot {
            is_training: r.is_training,
            phase: r.phase,
            progress: r.progress,
            current_epoch: r.current_epoch,
            total_epochs: r.total_epochs,
            loss: r.loss,
            accuracy: r.accuracy,
            val_loss: r.val_loss,
            val_accuracy: r.val_accuracy,
            logs: r.logs[from..].to_vec(),
            config: r.config.clone(),
            error: r.error.clone(),
            started_at: r.started_at,
            finished_at: r.finished_at,
        }
    }

    pub fn is_training(&self) -> bool {
        self.record.read().is_training
    }

    pub fn logs_since(&self, offset: usize) -> Vec<String> {
        let r = self.record.read();
        r.logs.get(offset..).map(<[String]>::to_vec).unwrap_or_default()
    }

    pub fn update<F: FnOnce(&mut JobRecord)>(&self, f: F) {
        f(&mut self.record.write());
    }

    /// Start a fresh record for an accepted job.
    pub fn reset(&self, config: &TrainingConfig) {
        *self.record.write() = JobRecord {
            phase: JobPhase::Starting,
            is_training: true,
            total_epochs: config.epochs,
            config: Some(config.clone()),
            started_at: Some(Utc::now()),
            ..JobRecord::default()
        };
    }

    pub fn log(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(target: "nw_core::job", "{line}");
        self.record.write().logs.push(line);
    }

    /// Enter `phase` and log `line`.
    pub fn enter(&self, phase: JobPhase, line: &str) {
        tracing::debug!(%phase, "job phase");
        let mut r = self.record.write();
        r.phase = phase;
        r.logs.push(line.to_string());
        drop(r);
        tracing::info!(target: "nw_core::job", "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_keeps_last_fifty_lines() {
        let board = StatusBoard::new();
        for i in 0..120 {
            board.log(format!("line {i}"));
        }
        let snap = board.snapshot();
        assert_eq!(snap.logs.len(), LOG_VIEW);
        assert_eq!(snap.logs.first().map(String::as_str), Some("line 70"));
        assert_eq!(snap.logs.last().map(String::as_str), Some("line 119"));
        assert_eq!(board.logs_since(118), vec!["line 118", "line 119"]);
        assert!(board.logs_since(500).is_empty());
    }

    #[test]
    fn test_reset_clears_previous_run() {
        let board = StatusBoard::new();
        board.update(|r| {
            r.phase = JobPhase::Failed;
            r.progress = 40.0;
            r.error = Some("boom".to_string());
        });
        board.log("Error: boom");

        let config = TrainingConfig {
            epochs: 7,
            ..TrainingConfig::default()
        };
        board.reset(&config);
        let snap = board.snapshot();
        assert_eq!(snap.phase, JobPhase::Starting);
        assert!(snap.is_training);
        assert_eq!(snap.progress, 0.0);
        assert_eq!(snap.total_epochs, 7);
        assert!(snap.logs.is_empty());
        assert!(snap.error.is_none());
        assert!(snap.started_at.is_some());
    }

    #[test]
    fn test_snapshot_serializes_phase_as_status() {
        let board = StatusBoard::new();
        let json = serde_json::to_value(board.snapshot()).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["is_training"], false);
        assert!(json.get("error").is_none());
    }
}
