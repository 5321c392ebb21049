pub mod error;
pub mod sqlite;
pub mod supabase;

pub use error::DatabaseError;
