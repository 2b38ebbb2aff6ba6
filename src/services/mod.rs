pub mod correction_store;
pub mod features;
pub mod locator;

pub use correction_store::{apply_overlay, CorrectionStore};
pub use features::{aggregate_features, compute_features};
pub use locator::{LocateFailure, Located, LocatedRecording, RecordingLocator};
