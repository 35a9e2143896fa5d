mod schema;
mod store;

pub use schema::SCHEMA_VERSION;
pub use store::Store;
