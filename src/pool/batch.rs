//! Batch sizing and outcome types for the sink pool (§4.4 "DataSinkPool",
//! §9 "Batching memory control", §5 "Transaction discipline").

use crate::model::datasource::TransactionMode;

/// `clamp(min=1, max=maxBatchSize, value=currentBatchSize)`, further
/// reduced proportionally when observed memory exceeds
/// `memoryThresholdPercent` (§9).
pub fn effective_batch_size(
    current_batch_size: usize,
    max_batch_size: usize,
    memory_used_percent: u8,
    memory_threshold_percent: u8,
) -> usize {
    let clamped = current_batch_size.clamp(1, max_batch_size.max(1));
    if memory_used_percent <= memory_threshold_percent {
        return clamped;
    }
    let overrun = (memory_used_percent - memory_threshold_percent) as f64;
    let headroom = (100 - memory_threshold_percent).max(1) as f64;
    let reduction_factor = (1.0 - (overrun / headroom).min(0.9)).max(0.1);
    ((clamped as f64 * reduction_factor).floor() as usize).max(1)
}

#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// `per-batch` transaction committed all N rows.
    Successful { count: usize },
    /// `per-batch` transaction rolled back entirely.
    Failed { count: usize, error: String },
    /// Row-level API reported some rows succeeding and some failing.
    Partial {
        successful: usize,
        failed: usize,
        errors: Vec<String>,
    },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Successful { .. })
    }
}

pub fn applicable_transaction_mode(mode: TransactionMode) -> &'static str {
    match mode {
        TransactionMode::None => "none",
        TransactionMode::PerBatch => "per-batch",
        TransactionMode::PerRecord => "per-record",
        TransactionMode::Global => "global",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_within_bounds() {
        assert_eq!(effective_batch_size(1000, 500, 10, 80), 500);
        assert_eq!(effective_batch_size(0, 500, 10, 80), 1);
    }

    #[test]
    fn reduces_proportionally_over_memory_threshold() {
        let at_threshold = effective_batch_size(500, 500, 80, 80);
        let over_threshold = effective_batch_size(500, 500, 95, 80);
        assert!(over_threshold < at_threshold);
        assert!(over_threshold >= 1);
    }
}
