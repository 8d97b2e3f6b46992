pub mod database;
pub mod fs_model_store;

pub use database::*;
pub use fs_model_store::FsModelStore;
