pub mod compactor;
pub mod version_service;

pub use compactor::Compactor;
pub use version_service::{CreateVersionOutcome, VersionService};
