#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod interrupt;
pub mod prelude;
pub mod uart;

mod common;

pub use common::{fifo, os};
pub use embedded_hal_nb;
pub use embedded_io;
pub use nb;

pub trait Steal {
    /// Steal an instance of this peripheral
    ///
    /// # Safety
    ///
    /// Ensure that the new instance of the peripheral cannot be used in a way
    /// that may race with any existing instances. The serial driver relies on
    /// the foreground half touching only the enable bits and the interrupt half
    /// touching the data register and clearing the transmit enable bit.
    unsafe fn steal(&self) -> Self;
}
