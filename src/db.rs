pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::models::MessageLink;
pub use self::store::MessageLinkStore;

pub mod error;
pub mod manager;
pub mod models;
pub mod schema;
pub mod sqlite;
pub mod store;
