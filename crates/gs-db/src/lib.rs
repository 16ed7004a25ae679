pub mod credential_repo;
pub mod schema;

pub use crate::credential_repo::SqliteCredentialStore;
