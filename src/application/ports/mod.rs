pub mod store;

pub use store::{NewVersion, Store, StoreError, StoreResult, StoreStats};
