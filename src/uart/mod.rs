pub use crate::common::uart::*;

#[cfg(any(test, feature = "std"))]
pub mod sim;
