//! Synchronous byte stream on top of a [`SerialPort`], with the `embedded-io`,
//! `embedded-hal-nb` and `core::fmt` shims for code that expects a console.

use super::*;
use crate::os::{self, Waiter, WaiterStatus};
use embedded_io::{ErrorType, Read, ReadReady, Write, WriteReady};

pub struct BlockingByteStream<'a, U, const RX: usize, const TX: usize> {
    port: SerialPort<'a, U, RX, TX>,
}

impl<'a, U, const RX: usize, const TX: usize> BlockingByteStream<'a, U, RX, TX>
where
    U: UartPeriph,
{
    pub fn new(port: SerialPort<'a, U, RX, TX>) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> SerialPort<'a, U, RX, TX> {
        self.port
    }

    pub fn port(&self) -> &SerialPort<'a, U, RX, TX> {
        &self.port
    }

    /// Same as [`SerialPort::write_byte`].
    #[inline]
    pub fn write(&mut self, byte: u8) -> bool {
        self.port.write_byte(byte)
    }

    /// Same as [`SerialPort::read_byte`].
    #[inline]
    pub fn read(&mut self) -> u8 {
        self.port.read_byte()
    }

    #[inline]
    pub fn read_timeout(&mut self, timeout: &mut impl WaiterStatus) -> Result<u8, Error> {
        self.port.read_byte_timeout(timeout)
    }

    /// Spin until the transmit buffer is drained and the last byte has left
    /// the data register.
    pub fn flush_timeout(&mut self, timeout: &mut impl WaiterStatus) -> Result<(), Error> {
        loop {
            if self.port.is_tx_idle() {
                return Ok(());
            }
            self.port.kick_tx();
            if timeout.timeout() {
                return Err(Error::Timeout);
            }
            os::yield_cpu();
        }
    }

    fn write_blocking(&mut self, byte: u8) {
        while !self.port.push_tx(byte) {
            os::yield_cpu();
        }
    }
}

// embedded-io ----------------------------------------------------------------

impl<U: UartPeriph, const RX: usize, const TX: usize> ErrorType
    for BlockingByteStream<'_, U, RX, TX>
{
    type Error = Error;
}

impl<U: UartPeriph, const RX: usize, const TX: usize> Read for BlockingByteStream<'_, U, RX, TX> {
    /// Blocks for the first byte, then takes whatever else is already buffered.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(0);
        };
        *first = self.port.read_byte();

        let mut n = 1;
        for slot in rest {
            match self.port.try_read_byte() {
                Ok(byte) => {
                    *slot = byte;
                    n += 1;
                }
                Err(_) => break,
            }
        }
        Ok(n)
    }
}

impl<U: UartPeriph, const RX: usize, const TX: usize> ReadReady
    for BlockingByteStream<'_, U, RX, TX>
{
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.port.rx_len() > 0)
    }
}

impl<U: UartPeriph, const RX: usize, const TX: usize> Write for BlockingByteStream<'_, U, RX, TX> {
    /// Blocks until the first byte is queued, then queues as many more as fit.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let Some((&first, rest)) = buf.split_first() else {
            return Ok(0);
        };
        self.write_blocking(first);

        let mut n = 1;
        for &byte in rest {
            if !self.port.push_tx(byte) {
                break;
            }
            n += 1;
        }
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let w = os::forever();
        self.flush_timeout(&mut w.start())
    }
}

impl<U: UartPeriph, const RX: usize, const TX: usize> WriteReady
    for BlockingByteStream<'_, U, RX, TX>
{
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.port.is_tx_full())
    }
}

// embedded-hal-nb ------------------------------------------------------------

impl<U: UartPeriph, const RX: usize, const TX: usize> e_nb::serial::ErrorType
    for BlockingByteStream<'_, U, RX, TX>
{
    type Error = Error;
}

impl<U: UartPeriph, const RX: usize, const TX: usize> e_nb::serial::Read<u8>
    for BlockingByteStream<'_, U, RX, TX>
{
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.port
            .try_read_byte()
            .map_err(|_| nb::Error::WouldBlock)
    }
}

impl<U: UartPeriph, const RX: usize, const TX: usize> e_nb::serial::Write<u8>
    for BlockingByteStream<'_, U, RX, TX>
{
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        if self.port.push_tx(word) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        if self.port.is_tx_idle() {
            Ok(())
        } else {
            self.port.kick_tx();
            Err(nb::Error::WouldBlock)
        }
    }
}

// fmt ------------------------------------------------------------------------

/// `printf`-style output. Blocks until every byte is queued.
impl<U: UartPeriph, const RX: usize, const TX: usize> core::fmt::Write
    for BlockingByteStream<'_, U, RX, TX>
{
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for &byte in s.as_bytes() {
            self.write_blocking(byte);
        }
        Ok(())
    }
}
