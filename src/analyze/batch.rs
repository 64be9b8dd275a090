// src/analyze/batch.rs
//! Batch runner: independent per-item pipelines on the rayon pool.

use metrics::counter;
use rayon::prelude::*;
use tracing::debug;

use super::input::TextInput;
use super::Analyzer;
use crate::error::SentimentError;
use crate::sentiment::SentimentResult;

/// Index-aligned with the input; one failed item never affects the others.
pub type BatchResult = Vec<Result<SentimentResult, SentimentError>>;

pub fn run<T: TextInput + Sync>(analyzer: &Analyzer, inputs: &[T]) -> BatchResult {
    let out: BatchResult = inputs.par_iter().map(|item| analyzer.analyze(item)).collect();

    let failed = out.iter().filter(|r| r.is_err()).count();
    counter!("sentimetric_batch_items_total").increment(inputs.len() as u64);
    debug!(target: "sentimetric::batch", items = inputs.len(), failed, "batch analyzed");
    out
}
