// Database module
// Holds the MongoDB session shared by the schema initializer and the query runner

pub mod mongo;

pub use mongo::*;
