pub mod sqlite;

pub use sqlite::{DatabaseManager, SqliteArtifactStore, SqliteModelCatalog};
