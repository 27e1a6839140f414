use nw_model::{EpochControl, EpochMetrics, EpochObserver};

use super::cancel::CancelToken;
use super::record::StatusBoard;

/// Mirrors fitting progress onto the status board and turns a pending
/// stop request into `Halt`.
pub(crate) struct ProgressObserver<'a> {
    board: &'a StatusBoard,
    cancel: &'a CancelToken,
}

impl<'a> ProgressObserver<'a> {
    pub fn new(board: &'a StatusBoard, cancel: &'a CancelToken) -> Self {
        Self { board, cancel }
    }
}

impl EpochObserver for ProgressObserver<'_> {
    fn on_epoch_end(&mut self, epoch: usize, metrics: &EpochMetrics) -> EpochControl {
        let total = metrics.total_epochs.max(1);
        self.board.update(|r| {
            r.current_epoch = epoch;
            r.total_epochs = total;
            r.progress = epoch as f32 / total as f32 * 100.0;
            r.loss = metrics.loss;
            r.accuracy = metrics.accuracy;
            r.val_loss = metrics.val_loss;
            r.val_accuracy = metrics.val_accuracy;
        });
        self.board.log(format!(
            "Epoch {epoch}/{total} - loss: {:.4} - accuracy: {:.4}",
            metrics.loss, metrics.accuracy
        ));

        if self.cancel.is_requested() {
            EpochControl::Halt
        } else {
            EpochControl::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn metrics(epoch: usize, total: usize) -> EpochMetrics {
        EpochMetrics {
            epoch,
            total_epochs: total,
            loss: 2.345678,
            accuracy: 0.25,
            val_loss: None,
            val_accuracy: None,
            learning_rate: 0.001,
        }
    }

    #[test]
    fn test_records_epoch_and_logs() {
        let board = StatusBoard::new();
        let cancel = CancelToken::new();
        let mut observer = ProgressObserver::new(&board, &cancel);

        assert_eq!(observer.on_epoch_end(1, &metrics(1, 4)), EpochControl::Continue);
        let snap = board.snapshot();
        assert_eq!(snap.current_epoch, 1);
        assert_relative_eq!(snap.progress, 25.0);
        assert_relative_eq!(snap.loss, 2.345678);
        assert_eq!(snap.logs, vec!["Epoch 1/4 - loss: 2.3457 - accuracy: 0.2500"]);
    }

    #[test]
    fn test_halts_once_cancelled() {
        let board = StatusBoard::new();
        let cancel = CancelToken::new();
        let mut observer = ProgressObserver::new(&board, &cancel);
        observer.on_epoch_end(1, &metrics(1, 3));
        assert!(cancel.request());
        assert_eq!(observer.on_epoch_end(2, &metrics(2, 3)), EpochControl::Halt);
    }
}
