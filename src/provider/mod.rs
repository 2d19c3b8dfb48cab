#[cfg(feature = "google")]
pub mod google;
pub mod stub;
mod types;

pub use types::*;
