pub use crate::os::Waiter as _serialio_hal_os_Waiter;
pub use crate::os::WaiterStatus as _serialio_hal_os_WaiterStatus;
pub use crate::uart::UartPeriph as _serialio_hal_uart_UartPeriph;
pub use embedded_io::Read as _;
pub use embedded_io::ReadReady as _;
pub use embedded_io::Write as _;
pub use embedded_io::WriteReady as _;
