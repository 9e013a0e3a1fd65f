pub mod activity;
pub mod approve;
pub mod backups;
pub mod detect;
pub mod format;
pub mod repo;
pub mod sync;
