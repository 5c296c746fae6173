//! A UART that exists only in memory, for driving the serial port on a host.
//!
//! Clones share the same registers, the same way stolen handles of a real
//! peripheral do.

use super::*;
use crate::Steal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::vec::Vec;

#[derive(Clone)]
pub struct SimUart {
    clock: u32,
    regs: Arc<Mutex<Registers>>,
}

struct Registers {
    brr: u32,
    frame: (WordLength, Parity, StopBits),
    tx_enabled: bool,
    rx_enabled: bool,
    txeie: bool,
    rxneie: bool,
    /// Incoming words and line errors, oldest first.
    line: VecDeque<Result<u16, Error>>,
    data_reads: usize,
    tx_ready: bool,
    sent: Vec<u8>,
}

impl SimUart {
    pub fn new(clock: u32) -> Self {
        Self {
            clock,
            regs: Arc::new(Mutex::new(Registers {
                brr: 0,
                frame: (WordLength::Bits8, Parity::ParityNone, StopBits::STOP1),
                tx_enabled: false,
                rx_enabled: false,
                txeie: false,
                rxneie: false,
                line: VecDeque::new(),
                data_reads: 0,
                tx_ready: true,
                sent: Vec::new(),
            })),
        }
    }

    fn regs(&self) -> MutexGuard<'_, Registers> {
        // a panicking test thread must not hide the registers from the others
        self.regs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bytes arriving on the RX pin.
    pub fn receive(&self, data: &[u8]) {
        self.regs().line.extend(data.iter().map(|&b| Ok(b as u16)));
    }

    /// The next read of the data register fails with `err`.
    pub fn inject_error(&self, err: Error) {
        self.regs().line.push_back(Err(err));
    }

    /// Stall or release the transmitter.
    pub fn set_tx_ready(&self, ready: bool) {
        self.regs().tx_ready = ready;
    }

    /// Everything written to the data register since the last call.
    pub fn take_sent(&self) -> Vec<u8> {
        core::mem::take(&mut self.regs().sent)
    }

    /// How many times the data register was read.
    pub fn data_reads(&self) -> usize {
        self.regs().data_reads
    }

    pub fn baud_divisor(&self) -> u32 {
        self.regs().brr
    }

    pub fn frame(&self) -> (WordLength, Parity, StopBits) {
        self.regs().frame
    }

    pub fn tx_enabled(&self) -> bool {
        self.regs().tx_enabled
    }

    pub fn rx_enabled(&self) -> bool {
        self.regs().rx_enabled
    }

    /// An enabled event has its flag raised.
    pub fn is_irq_pending(&self) -> bool {
        let r = self.regs();
        (r.rxneie && !r.line.is_empty()) || (r.txeie && r.tx_ready)
    }

    /// Play the interrupt controller: call the vector until no enabled event
    /// is pending.
    pub fn run_interrupts<const RX: usize, const TX: usize>(
        &self,
        bridge: &mut InterruptBridge<'_, SimUart, RX, TX>,
    ) {
        while self.is_irq_pending() {
            bridge.handler();
        }
    }
}

impl Steal for SimUart {
    unsafe fn steal(&self) -> Self {
        self.clone()
    }
}

impl UartPeriph for SimUart {
    fn clock(&self) -> u32 {
        self.clock
    }

    fn set_baud_divisor(&mut self, brr: u32) {
        self.regs().brr = brr;
    }

    fn set_frame(&mut self, word_length: WordLength, parity: Parity, stop_bits: StopBits) {
        self.regs().frame = (word_length, parity, stop_bits);
    }

    fn enable_comm(&mut self, tx: bool, rx: bool) {
        let mut r = self.regs();
        r.tx_enabled = tx;
        r.rx_enabled = rx;
    }

    fn write(&mut self, word: u16) -> nb::Result<(), Infallible> {
        let mut r = self.regs();
        if r.tx_ready {
            r.sent.push(word as u8);
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn is_tx_empty(&self) -> bool {
        self.regs().tx_ready
    }

    fn read(&mut self) -> nb::Result<u16, Error> {
        let mut r = self.regs();
        match r.line.pop_front() {
            Some(ret) => {
                r.data_reads += 1;
                ret.map_err(nb::Error::Other)
            }
            None => Err(nb::Error::WouldBlock),
        }
    }

    fn is_rx_not_empty(&self) -> bool {
        !self.regs().line.is_empty()
    }

    fn set_interrupt(&mut self, event: UartEvent, enable: bool) {
        let mut r = self.regs();
        match event {
            UartEvent::TxEmpty => r.txeie = enable,
            UartEvent::RxNotEmpty => r.rxneie = enable,
        }
    }

    fn is_interrupt_enable(&self, event: UartEvent) -> bool {
        let r = self.regs();
        match event {
            UartEvent::TxEmpty => r.txeie,
            UartEvent::RxNotEmpty => r.rxneie,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_register() {
        let mut uart = SimUart::new(8_000_000);
        assert_eq!(uart.read(), Err(nb::Error::WouldBlock));

        uart.receive(b"a");
        uart.inject_error(Error::Noise);
        assert!(uart.is_rx_not_empty());
        assert_eq!(uart.read(), Ok(b'a' as u16));
        assert_eq!(uart.read(), Err(nb::Error::Other(Error::Noise)));
        assert!(!uart.is_rx_not_empty());
        assert_eq!(uart.data_reads(), 2);

        uart.set_tx_ready(false);
        assert_eq!(uart.write(1), Err(nb::Error::WouldBlock));
        uart.set_tx_ready(true);
        assert_eq!(uart.write(2), Ok(()));
        assert_eq!(uart.take_sent(), [2]);
    }

    #[test]
    fn stolen_handle_shares_registers() {
        let mut a = SimUart::new(8_000_000);
        let b = unsafe { a.steal() };
        a.set_interrupt(UartEvent::TxEmpty, true);
        assert!(b.is_interrupt_enable(UartEvent::TxEmpty));
        assert!(b.is_irq_pending());
    }
}
