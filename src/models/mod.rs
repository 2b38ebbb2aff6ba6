pub mod bundle;
pub mod correction;
pub mod key;
pub mod layout;
pub mod loaders;
pub mod recording;

pub use bundle::{DerivativeBundle, FeatureRow, FeatureTable, SignalTrack};
pub use correction::{BadSegment, CorrectionLog, CorrectionSet, SampleRange};
pub use key::{Modality, RecordingKey, SignalKind};
pub use layout::{BundlePaths, DatasetLayout};
pub use loaders::{load_bundle, load_recording};
pub use recording::{PhysioMetadata, Recording};
