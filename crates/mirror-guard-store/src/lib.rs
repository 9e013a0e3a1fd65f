pub mod schema;
pub mod store;

pub use store::{ActivityRecord, MirrorStore, NewRepository, StoreError};
