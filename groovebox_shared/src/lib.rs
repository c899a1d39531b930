pub mod arrangement;
pub mod error;
pub mod gain;
pub mod position;

// Re-exports
pub use arrangement::{Arrangement, Instrument, Section, Track};
pub use error::EngineError;
pub use position::{LoopRegion, PlayheadPosition};
