//! Running metrics and per-epoch training history.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metric name used for the composite loss.
pub const LOSS: &str = "loss";
/// Metric name used for pixel accuracy (percent).
pub const ACCURACY: &str = "accuracy";

/// Running sums of named metrics over the steps of one epoch.
///
/// Averages divide by the number of recorded steps, so a metric that is
/// added on every step yields its plain mean.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    sums: HashMap<String, f64>,
    steps: usize,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one step's values
    pub fn record(&mut self, values: &[(&str, f64)]) {
        for (name, value) in values {
            *self.sums.entry((*name).to_string()).or_insert(0.0) += value;
        }
        self.steps += 1;
    }

    /// Running sum of a metric, 0.0 if never recorded
    pub fn sum(&self, name: &str) -> f64 {
        self.sums.get(name).copied().unwrap_or(0.0)
    }

    /// Mean of a metric over the recorded steps
    pub fn mean(&self, name: &str) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.sum(name) / self.steps as f64
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Clear all sums; called at the start of every epoch
    pub fn reset(&mut self) {
        self.sums.clear();
        self.steps = 0;
    }
}

/// Summary of one finished epoch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpochRecord {
    /// 1-based epoch number
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    /// Held-out metrics, absent when the test split is empty
    pub test_loss: Option<f64>,
    pub test_accuracy: Option<f64>,
    /// Learning rate used during this epoch
    pub learning_rate: f64,
}

/// Training metrics tracked across epochs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.epochs.last()
    }

    /// Epoch with the highest held-out accuracy
    pub fn best_test_epoch(&self) -> Option<&EpochRecord> {
        self.epochs
            .iter()
            .filter(|r| r.test_accuracy.is_some())
            .max_by(|a, b| {
                a.test_accuracy
                    .unwrap_or(f64::MIN)
                    .total_cmp(&b.test_accuracy.unwrap_or(f64::MIN))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, test_accuracy: Option<f64>) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss: 1.0 / epoch as f64,
            train_accuracy: 50.0 + epoch as f64,
            test_loss: test_accuracy.map(|_| 0.5),
            test_accuracy,
            learning_rate: 1e-4,
        }
    }

    #[test]
    fn test_accumulator_running_mean() {
        let mut metrics = MetricsAccumulator::new();
        metrics.record(&[(LOSS, 0.9), (ACCURACY, 40.0)]);
        metrics.record(&[(LOSS, 0.7), (ACCURACY, 60.0)]);

        assert_eq!(metrics.steps(), 2);
        assert!((metrics.sum(LOSS) - 1.6).abs() < 1e-12);
        assert!((metrics.mean(LOSS) - 0.8).abs() < 1e-12);
        assert!((metrics.mean(ACCURACY) - 50.0).abs() < 1e-12);
        assert_eq!(metrics.mean("missing"), 0.0);
    }

    #[test]
    fn test_accumulator_reset() {
        let mut metrics = MetricsAccumulator::new();
        metrics.record(&[(LOSS, 2.0)]);
        metrics.reset();

        assert_eq!(metrics.steps(), 0);
        assert_eq!(metrics.sum(LOSS), 0.0);
        assert_eq!(metrics.mean(LOSS), 0.0);
    }

    #[test]
    fn test_best_test_epoch() {
        let mut history = TrainingHistory::new();
        history.push(record(1, Some(70.0)));
        history.push(record(2, Some(85.0)));
        history.push(record(3, Some(80.0)));

        assert_eq!(history.best_test_epoch().map(|r| r.epoch), Some(2));
        assert_eq!(history.last().map(|r| r.epoch), Some(3));
    }

    #[test]
    fn test_best_test_epoch_without_test_split() {
        let mut history = TrainingHistory::new();
        history.push(record(1, None));
        assert!(history.best_test_epoch().is_none());
    }
}
