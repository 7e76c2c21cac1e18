pub mod models;
pub mod repo;

pub use repo::SqliteRepository;
