use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::rules::{violations, ThresholdTable, RULE_COUNT};
use super::side::CanonicalMeasurement;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub is_correct: bool,
    /// 大きいほど良いフォーム。スケールは実装依存
    pub score: f32,
}

/// Whole-frame form scorer, e.g. a trained density model behind an FFI or RPC boundary.
pub trait FormClassifier: Send {
    fn classify(&mut self, measurement: &CanonicalMeasurement) -> Result<Classification>;
}

/// Threshold-table scorer: correct when no rule fires, score is the share of rules passed.
pub struct RuleClassifier {
    table: ThresholdTable,
}

impl RuleClassifier {
    pub fn new(table: ThresholdTable) -> Self {
        Self { table }
    }
}

impl FormClassifier for RuleClassifier {
    fn classify(&mut self, measurement: &CanonicalMeasurement) -> Result<Classification> {
        let failed = violations(measurement, &self.table).len();
        Ok(Classification {
            is_correct: failed == 0,
            score: 1.0 - failed as f32 / RULE_COUNT as f32,
        })
    }
}
