//! MongoDB Store Adapter
//!
//! [`MongoStore`] is the only code that talks to the driver. It opens change
//! streams for the supervisor and performs the primary reads the classifier
//! uses to resolve owners.

/// Change event decoding
pub mod decode;

/// Client handle and trait implementations
pub mod mongo;

pub use mongo::{classify_error, classify_open_error, MongoStore};
