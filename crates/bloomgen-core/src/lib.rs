//! # bloomgen core
//!
//! Request/response types and the generator abstraction shared by the
//! bloomgen crates.

pub mod cancel;
pub mod error;
pub mod generator;
pub mod params;
pub mod request;

pub use cancel::CancellationFlag;
pub use error::{CoreError, Result};
pub use generator::{Generator, GeneratorExt, GeneratorMetadata, SharedGenerator};
pub use params::GenerationParams;
pub use request::{CompletionSet, GenerationRequest, RequestId};
