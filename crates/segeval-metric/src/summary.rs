//! Human-readable metric summaries.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Snapshot of a metric: overall value plus an optional per-class breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub name: String,
    pub value: f64,
    pub sample_size: usize,
    /// Empty for metrics without a class breakdown.
    pub per_class: Vec<f64>,
}

impl MetricSummary {
    pub fn new(name: impl Into<String>, value: f64, sample_size: usize) -> Self {
        Self {
            name: name.into(),
            value,
            sample_size,
            per_class: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_per_class(mut self, per_class: Vec<f64>) -> Self {
        self.per_class = per_class;
        self
    }
}

impl fmt::Display for MetricSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.6}", self.name, self.value)?;
        for (class, value) in self.per_class.iter().enumerate() {
            write!(f, "\n\tClass {class:3}: {value:.6}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_the_console_report() {
        let summary = MetricSummary::new("Dice Score", 0.75, 4).with_per_class(vec![1.0, 0.5]);

        assert_eq!(
            summary.to_string(),
            "Dice Score: 0.750000\n\tClass   0: 1.000000\n\tClass   1: 0.500000"
        );
    }

    #[test]
    fn scalar_summary_has_single_line() {
        let summary = MetricSummary::new("Pixel Accuracy", 0.5, 2);
        assert_eq!(summary.to_string(), "Pixel Accuracy: 0.500000");
    }
}
