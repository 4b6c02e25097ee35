//! Data module - CSV loading, validation and derivation

pub mod loader;
pub mod processor;
pub mod records;
pub mod schema;

pub use loader::{DataLoader, LoaderError, RawTable};
pub use processor::{DataProcessor, ProcessorError};
pub use schema::SchemaError;
