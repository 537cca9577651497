pub mod engine;
pub mod types;

pub use engine::{InferenceEngine, RawImage};
pub use types::{HistoryEntry, Label, PredictionRecord, Verdict, THRESHOLD};
