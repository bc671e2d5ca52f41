//! Rebound Core
//!
//! Primitives shared by the Rebound animation crates:
//!
//! - **Animatable data**: numbers, flat numeric arrays and nested numeric
//!   records, flattened into an ordered list of scalar components
//! - **Change observers**: a registry of callbacks addressed by stable ids
//! - **Errors**: the crate-wide [`AnimationError`]

pub mod error;
pub mod observer;
pub mod value;

pub use error::{AnimationError, Result};
pub use observer::{ObserverId, Observers, Subscription};
pub use value::{Animatable, Components, Shape};
