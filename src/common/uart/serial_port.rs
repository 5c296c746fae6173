//! Foreground half of the interrupt driven serial port.

use super::*;
use crate::{
    Steal,
    fifo::{Consumer, Producer},
    os::{self, WaiterStatus},
};

/// State of the transmit-empty interrupt enable bit.
///
/// Enabled by every accepted write, disabled by the interrupt half once it
/// finds the transmit buffer drained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxInterruptState {
    Disabled,
    Enabled,
}

/// Foreground side of a serial port.
///
/// It is the only consumer of the receive buffer and the only producer of the
/// transmit buffer. The matching [`InterruptBridge`] holds the other ends.
pub struct SerialPort<'a, U, const RX: usize, const TX: usize> {
    uart: U,
    rx: Consumer<'a, RX>,
    tx: Producer<'a, TX>,
    stats: &'a SerialStats,
}

impl<'a, U, const RX: usize, const TX: usize> SerialPort<'a, U, RX, TX>
where
    U: UartPeriph + Steal,
{
    /// Configure the peripheral, arm the receive interrupt and enable the
    /// transmitter and receiver.
    ///
    /// The transmit interrupt stays disabled until the first byte is written.
    ///
    /// 9 data bits without parity is rejected with
    /// [`ConfigError::DataBits`], the byte oriented buffers cannot carry it.
    pub fn init(
        mut uart: U,
        config: Config,
        buffers: &'a mut SerialBuffers<RX, TX>,
    ) -> Result<(Self, InterruptBridge<'a, U, RX, TX>), Error> {
        let brr = match config.baud_divisor(uart.clock()) {
            Ok(brr) => brr,
            Err(e) => {
                log::warn!("serial config rejected: {e}");
                return Err(e.into());
            }
        };

        uart.set_interrupt(UartEvent::TxEmpty, false);
        uart.set_interrupt(UartEvent::RxNotEmpty, false);
        uart.set_baud_divisor(brr);
        uart.set_frame(config.word_length, config.parity, config.stop_bits);
        uart.set_interrupt(UartEvent::RxNotEmpty, true);
        uart.enable_comm(true, true);

        let SerialBuffers { rx, tx, stats } = buffers;
        let stats: &'a SerialStats = stats;
        let (rx_w, rx_r) = rx.split();
        let (tx_w, tx_r) = tx.split();

        log::info!(
            "serial up: {} baud, {:?}, {:?}, {:?}, rx {} / tx {} bytes",
            config.baudrate,
            config.word_length,
            config.parity,
            config.stop_bits,
            rx_r.capacity(),
            tx_w.capacity(),
        );

        let bridge = InterruptBridge::new(
            unsafe { uart.steal() },
            config.data_mask(),
            rx_w,
            tx_r,
            stats,
        );
        Ok((
            Self {
                uart,
                rx: rx_r,
                tx: tx_w,
                stats,
            },
            bridge,
        ))
    }
}

impl<'a, U, const RX: usize, const TX: usize> SerialPort<'a, U, RX, TX>
where
    U: UartPeriph,
{
    /// Queue one byte for transmission.
    ///
    /// Returns `false` if the transmit buffer is full. Nothing is queued in
    /// that case and the caller decides whether to retry or drop.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> bool {
        self.try_write_byte(byte).is_ok()
    }

    pub fn try_write_byte(&mut self, byte: u8) -> Result<(), Error> {
        if self.push_tx(byte) {
            Ok(())
        } else {
            self.stats.record_tx_rejected();
            log::trace!("tx full, rejected {byte:#04x}");
            Err(Error::BufferFull)
        }
    }

    /// Enqueue without counting a rejection, for callers that retry.
    pub(super) fn push_tx(&mut self, byte: u8) -> bool {
        if self.tx.enqueue(byte) {
            self.uart.set_interrupt(UartEvent::TxEmpty, true);
            true
        } else {
            // Full means non-empty, so the interrupt must be running.
            self.kick_tx();
            false
        }
    }

    /// Make sure a non-empty transmit buffer has the interrupt enabled.
    pub(super) fn kick_tx(&mut self) {
        if !self.tx.is_empty() && !self.uart.is_interrupt_enable(UartEvent::TxEmpty) {
            self.uart.set_interrupt(UartEvent::TxEmpty, true);
        }
    }

    /// Block until a byte arrives. Waits forever if none ever does, see
    /// [`read_byte_timeout`](Self::read_byte_timeout) for a bounded wait.
    pub fn read_byte(&mut self) -> u8 {
        loop {
            if let Some(byte) = self.rx.dequeue() {
                return byte;
            }
            os::yield_cpu();
        }
    }

    /// Block until a byte arrives or `timeout` expires.
    ///
    /// Pass a [`CancelToken`](crate::os::CancelToken) to abort the wait from
    /// another context.
    pub fn read_byte_timeout(&mut self, timeout: &mut impl WaiterStatus) -> Result<u8, Error> {
        loop {
            if let Some(byte) = self.rx.dequeue() {
                return Ok(byte);
            }
            if timeout.timeout() {
                return Err(Error::Timeout);
            }
            os::yield_cpu();
        }
    }

    pub fn try_read_byte(&mut self) -> Result<u8, Error> {
        self.rx.dequeue().ok_or(Error::BufferEmpty)
    }

    pub fn tx_interrupt_state(&self) -> TxInterruptState {
        if self.uart.is_interrupt_enable(UartEvent::TxEmpty) {
            TxInterruptState::Enabled
        } else {
            TxInterruptState::Disabled
        }
    }

    /// `true` once everything queued has left the data register.
    pub fn is_tx_idle(&self) -> bool {
        self.tx.is_empty() && self.uart.is_tx_empty()
    }

    /// Bytes waiting to be read.
    #[inline]
    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }

    /// Bytes waiting to be sent.
    #[inline]
    pub fn tx_len(&self) -> usize {
        self.tx.len()
    }

    #[inline]
    pub fn is_tx_full(&self) -> bool {
        self.tx.is_full()
    }

    #[inline]
    pub fn stats(&self) -> &SerialStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::{CancelToken, Counter, Waiter};
    use crate::uart::sim::SimUart;

    fn leak<const RX: usize, const TX: usize>() -> &'static mut SerialBuffers<RX, TX> {
        std::boxed::Box::leak(std::boxed::Box::new(SerialBuffers::new()))
    }

    #[test_log::test]
    fn init_applies_config() {
        let uart = SimUart::new(24_000_000);
        let (port, _bridge) =
            SerialPort::init(uart.clone(), Config::default(), leak::<16, 16>()).unwrap();

        assert_eq!(uart.baud_divisor(), 1250);
        assert_eq!(
            uart.frame(),
            (WordLength::Bits9, Parity::ParityOdd, StopBits::STOP1)
        );
        assert!(uart.tx_enabled());
        assert!(uart.rx_enabled());
        assert!(uart.is_interrupt_enable(UartEvent::RxNotEmpty));
        assert_eq!(port.tx_interrupt_state(), TxInterruptState::Disabled);
    }

    #[test_log::test]
    fn init_rejects_bad_config() {
        let uart = SimUart::new(24_000_000);
        let ret = SerialPort::init(
            uart.clone(),
            Config::default().word_length_9bits().parity_none(),
            leak::<16, 16>(),
        );
        assert!(matches!(ret, Err(Error::Config(ConfigError::DataBits(9)))));

        let ret = SerialPort::init(uart.clone(), Config::default().baudrate(0), leak::<16, 16>());
        assert!(matches!(ret, Err(Error::Config(ConfigError::BaudRate(0)))));

        // nothing was touched
        assert!(!uart.rx_enabled());
        assert!(!uart.is_interrupt_enable(UartEvent::RxNotEmpty));
    }

    #[test]
    fn transmit_interrupt_state_machine() {
        let uart = SimUart::new(24_000_000);
        let (mut port, mut bridge) =
            SerialPort::init(uart.clone(), Config::default(), leak::<8, 8>()).unwrap();

        assert_eq!(port.tx_interrupt_state(), TxInterruptState::Disabled);
        assert!(port.write_byte(b'x'));
        assert_eq!(port.tx_interrupt_state(), TxInterruptState::Enabled);

        bridge.on_transmit_ready();
        assert_eq!(uart.take_sent(), b"x");
        assert_eq!(port.tx_interrupt_state(), TxInterruptState::Enabled);

        bridge.on_transmit_ready();
        assert_eq!(port.tx_interrupt_state(), TxInterruptState::Disabled);
        assert!(uart.take_sent().is_empty());

        assert!(port.write_byte(b'y'));
        assert_eq!(port.tx_interrupt_state(), TxInterruptState::Enabled);
        uart.run_interrupts(&mut bridge);
        assert_eq!(uart.take_sent(), b"y");
        assert_eq!(port.tx_interrupt_state(), TxInterruptState::Disabled);
    }

    #[test]
    fn static_buffers() {
        let buffers = crate::static_serial_buffers!(32, 64);
        let uart = SimUart::new(48_000_000);
        let (mut port, mut bridge) =
            SerialPort::init(uart.clone(), Config::default().baudrate(115_200), buffers).unwrap();
        assert_eq!(uart.baud_divisor(), 416);

        uart.receive(&[0x55; 31]);
        uart.run_interrupts(&mut bridge);
        assert_eq!(port.rx_len(), 31);
        assert_eq!(port.stats().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn write_backpressure() {
        let uart = SimUart::new(24_000_000);
        let (mut port, mut bridge) =
            SerialPort::init(uart.clone(), Config::default(), leak::<8, 4>()).unwrap();

        assert!(port.write_byte(1));
        assert!(port.write_byte(2));
        assert!(port.write_byte(3));
        assert!(port.is_tx_full());
        assert!(!port.write_byte(4));
        assert_eq!(port.try_write_byte(5), Err(Error::BufferFull));
        assert_eq!(port.stats().tx_rejected(), 2);

        uart.run_interrupts(&mut bridge);
        assert_eq!(uart.take_sent(), [1, 2, 3]);
        assert!(port.is_tx_idle());
        assert!(port.write_byte(6));
    }

    #[test]
    fn read_timeout_and_cancel() {
        let uart = SimUart::new(24_000_000);
        let (mut port, mut bridge) =
            SerialPort::init(uart.clone(), Config::default(), leak::<8, 8>()).unwrap();

        assert_eq!(port.try_read_byte(), Err(Error::BufferEmpty));
        let c = Counter::new(10);
        assert_eq!(port.read_byte_timeout(&mut c.start()), Err(Error::Timeout));

        let token = CancelToken::new();
        token.cancel();
        assert_eq!(port.read_byte_timeout(&mut &token), Err(Error::Timeout));

        uart.receive(b"k");
        uart.run_interrupts(&mut bridge);
        assert_eq!(port.rx_len(), 1);
        assert_eq!(port.read_byte_timeout(&mut &token), Ok(b'k'));
    }

    #[test]
    fn read_times_out_on_wall_clock() {
        use crate::os::{StdInterval, StdWaiter};
        use std::time::{Duration, Instant};

        let uart = SimUart::new(24_000_000);
        let (mut port, _bridge) =
            SerialPort::init(uart, Config::default(), leak::<8, 8>()).unwrap();

        let w = StdWaiter::new(Duration::from_millis(20), StdInterval::new(Duration::ZERO));
        let t0 = Instant::now();
        assert_eq!(port.read_byte_timeout(&mut w.start()), Err(Error::Timeout));
        assert!(t0.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn blocking_read_wakes_on_interrupt() {
        let uart = SimUart::new(24_000_000);
        let (mut port, mut bridge) =
            SerialPort::init(uart.clone(), Config::default(), leak::<8, 8>()).unwrap();

        let line = uart.clone();
        let isr = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            line.receive(b"hi");
            line.run_interrupts(&mut bridge);
        });

        assert_eq!(port.read_byte(), b'h');
        assert_eq!(port.read_byte(), b'i');
        isr.join().unwrap();
    }

    #[test]
    fn cancel_from_other_thread() {
        let uart = SimUart::new(24_000_000);
        let (mut port, _bridge) =
            SerialPort::init(uart, Config::default(), leak::<8, 8>()).unwrap();

        let token: &'static CancelToken = std::boxed::Box::leak(std::boxed::Box::new(CancelToken::new()));
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            token.cancel();
        });

        assert_eq!(port.read_byte_timeout(&mut &*token), Err(Error::Timeout));
        canceller.join().unwrap();
    }
}
