// Data Models
pub mod operation;
pub mod settings;

pub use operation::{BatchSummary, ExtractProgress, ExtractState, OverwriteMethod, SourceResult};
pub use settings::{ExtractSettings, OpenMethod, RootDirectory, SaveLocation, Settings};
