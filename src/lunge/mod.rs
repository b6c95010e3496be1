//! Lunge form analysis: side normalization, rule checks, rep counting and session reporting.

pub mod analyzer;
pub mod classifier;
pub mod report;
pub mod reps;
pub mod rules;
pub mod session;
pub mod side;

pub use analyzer::{FrameStatus, FrameVerdict, LungeAnalyzer};
pub use classifier::{Classification, FormClassifier, RuleClassifier};
pub use reps::{Direction, RepCounter, RepEvent};
pub use rules::{FormError, Range, ThresholdTable};
pub use session::SessionReport;
pub use side::{CanonicalMeasurement, SideNormalizer};
