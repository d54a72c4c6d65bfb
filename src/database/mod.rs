pub mod schema;
pub mod repo;
