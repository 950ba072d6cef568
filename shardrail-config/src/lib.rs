//! Configuration for the shardrail data-access layer.

pub mod core;
pub mod error;
pub mod general;
pub mod read_only;
pub mod scroll;

pub use crate::core::Config;
pub use error::Error;
pub use general::General;
pub use read_only::ReadOnly;
pub use scroll::Scroll;
