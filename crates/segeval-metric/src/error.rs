use thiserror::Error;

/// The error type for segmentation metric operations.
///
/// Every failure the engine can report is deterministic given its inputs:
/// invalid configuration, malformed tensors, or querying an accumulator that
/// has not seen any samples yet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Error for when a metric configuration is rejected at `init()`.
    #[error("Invalid metric configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when a value is requested before any sample was accumulated.
    #[error("{metric} has no accumulated samples (sample size is zero)")]
    EmptyAccumulator {
        /// The name of the metric that was queried.
        metric: String,
    },

    /// Error for when a label cannot be one-hot encoded with the class count.
    #[error("Label {label} is outside the class range [0, {nclasses})")]
    LabelOutOfRange {
        /// The offending label value.
        label: i64,
        /// The number of classes used for encoding.
        nclasses: usize,
    },

    /// Error for when an input tensor has an invalid shape.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// Error for when a batch statistic or accumulator disagrees on the class count.
    #[error("Class count mismatch: expected {expected}, got {actual}")]
    ClassCountMismatch {
        /// The class count of the receiving accumulator.
        expected: usize,
        /// The class count of the incoming statistic or accumulator.
        actual: usize,
    },

    /// Error for when a prediction mode cannot decode the given output.
    #[error("{metric} cannot decode this output: {reason}")]
    UnsupportedMode {
        /// The name of the metric.
        metric: String,
        /// Why the output cannot be decoded.
        reason: String,
    },

    /// Error for when a staged input carries no stage at all.
    #[error("Staged input contains no stages")]
    EmptyStages,

    /// Error for when a metric that scores a single pair receives staged input.
    #[error("{metric} does not accept staged input; use the modified mIoU metric")]
    StagedInputUnsupported {
        /// The name of the metric.
        metric: String,
    },
}

/// A specialized `Result` type for segmentation metric operations.
pub type MetricResult<T> = Result<T, MetricError>;
