//! Glue between a hardware interrupt vector and the code it should run.

use alloc::boxed::Box;
use core::cell::{Cell, OnceCell};

/// A slot the interrupt vector calls into, typically holding an
/// [`InterruptBridge`](crate::uart::InterruptBridge).
///
/// ```ignore
/// static USART2_CB: Callback = Callback::new();
///
/// let (port, mut bridge) = SerialPort::init(uart, Config::default(), buffers)?;
/// USART2_CB.set(move || bridge.handler());
///
/// #[interrupt]
/// fn USART2() {
///     unsafe { USART2_CB.call() }
/// }
/// ```
pub struct Callback {
    callback: OnceCell<Cell<Box<dyn FnMut()>>>,
}

unsafe impl Sync for Callback {}

/// # Safety
///
/// Sharing it across multiple interrupt callbacks may lead to a data race.
impl Callback {
    pub const fn new() -> Self {
        Self {
            callback: OnceCell::new(),
        }
    }

    /// Register the callback. You can call it only once.
    ///
    /// Enable the interrupt line only after this returns.
    pub fn set(&self, callback: impl FnMut() + 'static) {
        let cb = Cell::new(Box::new(callback) as Box<dyn FnMut()>);
        let ok = critical_section::with(|_| self.callback.set(cb).is_ok());
        assert!(ok, "callback already registered");
    }

    pub fn is_set(&self) -> bool {
        self.callback.get().is_some()
    }

    /// Run the callback, if any.
    ///
    /// # Safety
    ///
    /// Only the interrupt vector that owns this slot may call it, and it must
    /// not re-enter itself.
    pub unsafe fn call(&self) {
        if let Some(cb) = self.callback.get() {
            unsafe { (*cb.as_ptr())() }
        }
    }
}

impl Default for Callback {
    fn default() -> Self {
        Self::new()
    }
}
