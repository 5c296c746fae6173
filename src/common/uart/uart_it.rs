//! UART interrupt implementation

use super::*;
use crate::fifo::{Consumer, Producer};

/// Interrupt side of a serial port.
///
/// Runs in interrupt context: never blocks and never re-enters itself. It is
/// the only producer of the receive buffer and the only consumer of the
/// transmit buffer.
pub struct InterruptBridge<'a, U, const RX: usize, const TX: usize> {
    uart: U,
    data_mask: u8,
    rx: Producer<'a, RX>,
    tx: Consumer<'a, TX>,
    stats: &'a SerialStats,
}

impl<'a, U, const RX: usize, const TX: usize> InterruptBridge<'a, U, RX, TX>
where
    U: UartPeriph,
{
    pub(super) fn new(
        uart: U,
        data_mask: u8,
        rx: Producer<'a, RX>,
        tx: Consumer<'a, TX>,
        stats: &'a SerialStats,
    ) -> Self {
        Self {
            uart,
            data_mask,
            rx,
            tx,
            stats,
        }
    }

    /// Body of the UART interrupt vector.
    pub fn handler(&mut self) {
        if self.uart.is_rx_not_empty() {
            self.on_receive_ready();
        }

        if self.uart.is_interrupt_enable(UartEvent::TxEmpty) && self.uart.is_tx_empty() {
            self.on_transmit_ready();
        }
    }

    /// A byte is waiting in the data register.
    ///
    /// The register is read exactly once and the parity bit, if any, is
    /// masked off. If the receive buffer is full the byte is dropped and
    /// counted, the buffered bytes stay as they are.
    pub fn on_receive_ready(&mut self) {
        match self.uart.read() {
            Ok(word) => {
                let byte = word as u8 & self.data_mask;
                if !self.rx.enqueue(byte) {
                    self.stats.record_rx_overflow();
                    log::trace!("rx overflow, dropped {byte:#04x}");
                }
            }
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(e)) => {
                self.stats.record_rx_error();
                log::trace!("rx line error: {e:?}");
            }
        }
    }

    /// The data register can take a new byte.
    ///
    /// Sends the next queued byte, or disables the transmit interrupt when
    /// nothing is left so the line stays quiet until the next write.
    pub fn on_transmit_ready(&mut self) {
        if !self.uart.is_tx_empty() {
            return;
        }
        if let Some(byte) = self.tx.dequeue() {
            // cannot block, the data register was checked empty above
            self.uart.write(byte as u16).ok();
        } else {
            self.uart.set_interrupt(UartEvent::TxEmpty, false);
        }
    }

    #[inline]
    pub fn stats(&self) -> &SerialStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uart::{SerialPort, sim::SimUart};

    fn leak<const RX: usize, const TX: usize>() -> &'static mut SerialBuffers<RX, TX> {
        std::boxed::Box::leak(std::boxed::Box::new(SerialBuffers::new()))
    }

    #[test]
    fn receive_reads_data_register_once() {
        let uart = SimUart::new(24_000_000);
        let (mut port, mut bridge) =
            SerialPort::init(uart.clone(), Config::default(), leak::<8, 8>()).unwrap();

        uart.receive(b"ab");
        bridge.on_receive_ready();
        assert_eq!(uart.data_reads(), 1);
        assert_eq!(port.try_read_byte(), Ok(b'a'));
        assert_eq!(port.try_read_byte(), Err(Error::BufferEmpty));

        bridge.handler();
        assert_eq!(uart.data_reads(), 2);
        assert_eq!(port.try_read_byte(), Ok(b'b'));

        // flag clear: the vector runs but does not touch the register
        bridge.handler();
        assert_eq!(uart.data_reads(), 2);
    }

    #[test_log::test]
    fn receive_overflow_keeps_buffered_bytes() {
        let uart = SimUart::new(24_000_000);
        let (mut port, mut bridge) =
            SerialPort::init(uart.clone(), Config::default(), leak::<4, 8>()).unwrap();

        uart.receive(b"abcde");
        uart.run_interrupts(&mut bridge);
        assert_eq!(bridge.stats().rx_overflow(), 2);
        assert_eq!(port.rx_len(), 3);

        assert_eq!(port.read_byte(), b'a');
        assert_eq!(port.read_byte(), b'b');
        assert_eq!(port.read_byte(), b'c');
        assert_eq!(port.try_read_byte(), Err(Error::BufferEmpty));

        uart.receive(b"f");
        uart.run_interrupts(&mut bridge);
        assert_eq!(port.read_byte(), b'f');
        assert_eq!(port.stats().rx_overflow(), 2);
    }

    #[test_log::test]
    fn receive_line_error_is_counted() {
        let uart = SimUart::new(24_000_000);
        let (mut port, mut bridge) =
            SerialPort::init(uart.clone(), Config::default(), leak::<8, 8>()).unwrap();

        uart.receive(b"1");
        uart.inject_error(Error::Parity);
        uart.receive(b"2");
        uart.run_interrupts(&mut bridge);

        assert_eq!(port.stats().rx_errors(), 1);
        assert_eq!(port.read_byte(), b'1');
        assert_eq!(port.read_byte(), b'2');
    }

    #[test]
    fn receive_strips_parity_bit() {
        let uart = SimUart::new(24_000_000);
        let cfg = Config::default().word_length_8bits().parity_even();
        let (mut port, mut bridge) = SerialPort::init(uart.clone(), cfg, leak::<8, 8>()).unwrap();

        // 'A' with the parity bit set in bit 7
        uart.receive(&[0xC1, 0x41]);
        uart.run_interrupts(&mut bridge);
        assert_eq!(port.read_byte(), b'A');
        assert_eq!(port.read_byte(), b'A');

        let uart = SimUart::new(24_000_000);
        let cfg = Config::default().word_length_8bits().parity_none();
        let (mut port, mut bridge) = SerialPort::init(uart.clone(), cfg, leak::<8, 8>()).unwrap();
        uart.receive(&[0xC1]);
        uart.run_interrupts(&mut bridge);
        assert_eq!(port.read_byte(), 0xC1);
    }

    #[test]
    fn transmit_waits_for_data_register() {
        let uart = SimUart::new(24_000_000);
        let (mut port, mut bridge) =
            SerialPort::init(uart.clone(), Config::default(), leak::<8, 8>()).unwrap();

        uart.set_tx_ready(false);
        assert!(port.write_byte(b'z'));
        bridge.on_transmit_ready();
        bridge.handler();
        assert!(uart.take_sent().is_empty());
        assert_eq!(port.tx_len(), 1);

        uart.set_tx_ready(true);
        bridge.handler();
        assert_eq!(uart.take_sent(), b"z");
    }

    #[test]
    fn transmit_keeps_order() {
        let uart = SimUart::new(24_000_000);
        let (mut port, mut bridge) =
            SerialPort::init(uart.clone(), Config::default(), leak::<8, 16>()).unwrap();

        for &b in b"hello" {
            assert!(port.write_byte(b));
        }
        // one byte per interrupt
        bridge.handler();
        assert_eq!(uart.take_sent(), b"h");
        uart.run_interrupts(&mut bridge);
        assert_eq!(uart.take_sent(), b"ello");
        assert!(!uart.is_interrupt_enable(UartEvent::TxEmpty));
    }
}
