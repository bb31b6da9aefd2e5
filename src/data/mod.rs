//! Dataset loading, target preparation and stratified splitting

pub mod dataset;
pub mod loader;
pub mod split;

pub use dataset::{
    class_incidence, column_to_array1, frame_to_array2, ClassFrequency, Dataset, TargetPreparer,
    DEFAULT_SOURCE_LABEL, TARGET_COLUMN,
};
pub use loader::{preview_lines, ColumnInfo, DataLoader, DatasetInfo};
pub use split::{SplitResult, StratifiedSplitter};
