pub mod fifo;
pub mod os;
pub mod uart;

/// Place a [`SerialBuffers`](crate::uart::SerialBuffers) in a `static` and
/// return a `&'static mut` to it.
///
/// Every expansion owns its own storage. Evaluate it only once, e.g. during
/// start-up, a second evaluation would alias the first reference.
#[macro_export]
macro_rules! static_serial_buffers {
    ($rx:literal, $tx:literal) => {
        unsafe {
            static mut BUFFERS: $crate::uart::SerialBuffers<$rx, $tx> =
                $crate::uart::SerialBuffers::new();
            &mut *(&raw mut BUFFERS)
        }
    };
}
