//! Runtime for executing research sessions

mod executor;
pub mod traits;


pub use executor::SessionRuntime;
pub use traits::*;
