//! Analysis module - before/after aggregation and the end-to-end pipeline

pub mod partition;
pub mod pipeline;

pub use partition::{AnalysisError, PairedSeries, Partition, Period, PeriodMeans};
pub use pipeline::{AnalysisReport, Inputs, Pipeline, PipelineError};
