use crate::fifo::CircularByteBuffer;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use embedded_hal_nb as e_nb;
use embedded_io as e_io;

mod serial_port;
mod stream;
mod uart_it;

pub use core::convert::Infallible;
pub use serial_port::*;
pub use stream::*;
pub use uart_it::*;

/// Register-level access to one UART peripheral.
///
/// The serial driver keeps two handles to the same peripheral (see
/// [`Steal`](crate::Steal)): the foreground one only sets interrupt enable bits,
/// the interrupt one reads/writes the data register and clears the transmit
/// enable bit.
pub trait UartPeriph {
    /// Kernel clock of the peripheral in Hz.
    fn clock(&self) -> u32;
    /// Write the baud rate register, `clock / baudrate` at 16x oversampling.
    fn set_baud_divisor(&mut self, brr: u32);
    fn set_frame(&mut self, word_length: WordLength, parity: Parity, stop_bits: StopBits);
    fn enable_comm(&mut self, tx: bool, rx: bool);

    fn write(&mut self, word: u16) -> nb::Result<(), Infallible>;
    fn is_tx_empty(&self) -> bool;

    /// Read the data register once. Reading clears the receive flag.
    ///
    /// The raw word is returned, parity bit included. The driver strips it
    /// with [`Config::data_mask`].
    fn read(&mut self) -> nb::Result<u16, Error>;
    fn is_rx_not_empty(&self) -> bool;

    fn set_interrupt(&mut self, event: UartEvent, enable: bool);
    fn is_interrupt_enable(&self, event: UartEvent) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UartEvent {
    /// New data can be sent
    TxEmpty,
    /// New data has been received
    RxNotEmpty,
}

// Buffers --------------------------------------------------------------------

/// Storage for one serial port: the receive and transmit FIFOs plus the loss
/// counters. It must outlive both halves of the port, so on a target it
/// usually lives in a `static` (see [`static_serial_buffers`](crate::static_serial_buffers)).
pub struct SerialBuffers<const RX: usize, const TX: usize> {
    pub(crate) rx: CircularByteBuffer<RX>,
    pub(crate) tx: CircularByteBuffer<TX>,
    pub(crate) stats: SerialStats,
}

impl<const RX: usize, const TX: usize> SerialBuffers<RX, TX> {
    pub const fn new() -> Self {
        Self {
            rx: CircularByteBuffer::new(),
            tx: CircularByteBuffer::new(),
            stats: SerialStats::new(),
        }
    }
}

impl<const RX: usize, const TX: usize> Default for SerialBuffers<RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}

// Stats ----------------------------------------------------------------------

/// Counters of bytes the driver had to drop.
///
/// Every counter has a single writer, so it is bumped with a plain load/store
/// pair, which also works on cores without atomic read-modify-write.
#[derive(Debug, Default)]
pub struct SerialStats {
    /// Written by the interrupt half.
    rx_overflow: AtomicU32,
    /// Written by the interrupt half.
    rx_errors: AtomicU32,
    /// Written by the foreground half.
    tx_rejected: AtomicU32,
}

impl SerialStats {
    pub const fn new() -> Self {
        Self {
            rx_overflow: AtomicU32::new(0),
            rx_errors: AtomicU32::new(0),
            tx_rejected: AtomicU32::new(0),
        }
    }

    /// Received bytes dropped because the receive buffer was full.
    pub fn rx_overflow(&self) -> u32 {
        self.rx_overflow.load(Ordering::Relaxed)
    }

    /// Received bytes dropped because of a line error.
    pub fn rx_errors(&self) -> u32 {
        self.rx_errors.load(Ordering::Relaxed)
    }

    /// Bytes refused by `write_byte` because the transmit buffer was full.
    pub fn tx_rejected(&self) -> u32 {
        self.tx_rejected.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_overflow: self.rx_overflow(),
            rx_errors: self.rx_errors(),
            tx_rejected: self.tx_rejected(),
        }
    }

    #[inline]
    pub(crate) fn record_rx_overflow(&self) {
        bump(&self.rx_overflow);
    }

    #[inline]
    pub(crate) fn record_rx_error(&self) {
        bump(&self.rx_errors);
    }

    #[inline]
    pub(crate) fn record_tx_rejected(&self) {
        bump(&self.tx_rejected);
    }
}

#[inline(always)]
fn bump(counter: &AtomicU32) {
    let v = counter.load(Ordering::Relaxed);
    counter.store(v.wrapping_add(1), Ordering::Relaxed);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub rx_overflow: u32,
    pub rx_errors: u32,
    pub tx_rejected: u32,
}

// Error ----------------------------------------------------------------------

/// UART error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The peripheral receive buffer was overrun.
    Overrun,
    /// Received data does not conform to the peripheral configuration.
    /// Can be caused by a misconfigured device on either end of the serial line.
    FrameFormat,
    /// Parity check failed.
    Parity,
    /// UART line is too noisy to read valid data.
    Noise,
    /// The transmit buffer is full, the byte was not accepted.
    BufferFull,
    /// The receive buffer holds no data.
    BufferEmpty,
    /// A wait was cancelled or ran out of time.
    Timeout,
    /// Unsupported configuration.
    Config(ConfigError),
    /// A different error occurred. The original error may contain more information.
    Other,
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Overrun => f.write_str("receive overrun"),
            Error::FrameFormat => f.write_str("framing error"),
            Error::Parity => f.write_str("parity error"),
            Error::Noise => f.write_str("noise detected"),
            Error::BufferFull => f.write_str("transmit buffer full"),
            Error::BufferEmpty => f.write_str("receive buffer empty"),
            Error::Timeout => f.write_str("timed out"),
            Error::Config(e) => write!(f, "invalid configuration: {e}"),
            Error::Other => f.write_str("uart error"),
        }
    }
}

impl core::error::Error for Error {}

impl embedded_io::Error for Error {
    #[inline]
    fn kind(&self) -> e_io::ErrorKind {
        match self {
            Error::Overrun => e_io::ErrorKind::InvalidData,
            Error::FrameFormat => e_io::ErrorKind::InvalidData,
            Error::Parity => e_io::ErrorKind::InvalidData,
            Error::Noise => e_io::ErrorKind::InvalidData,
            Error::BufferFull => e_io::ErrorKind::Other,
            Error::BufferEmpty => e_io::ErrorKind::Other,
            Error::Timeout => e_io::ErrorKind::TimedOut,
            Error::Config(_) => e_io::ErrorKind::InvalidInput,
            Error::Other => e_io::ErrorKind::Other,
        }
    }
}

impl e_nb::serial::Error for Error {
    #[inline]
    fn kind(&self) -> e_nb::serial::ErrorKind {
        match self {
            Error::Overrun => e_nb::serial::ErrorKind::Overrun,
            Error::FrameFormat => e_nb::serial::ErrorKind::FrameFormat,
            Error::Parity => e_nb::serial::ErrorKind::Parity,
            Error::Noise => e_nb::serial::ErrorKind::Noise,
            _ => e_nb::serial::ErrorKind::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Zero, or not reachable from the peripheral clock.
    BaudRate(u32),
    DataBits(u8),
    Parity(char),
    StopBits(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BaudRate(b) => write!(f, "unsupported baud rate {b}"),
            ConfigError::DataBits(b) => write!(f, "unsupported data bits {b}"),
            ConfigError::Parity(p) => write!(f, "unsupported parity '{p}'"),
            ConfigError::StopBits(s) => write!(f, "unsupported stop bits {s}"),
        }
    }
}

// Config ---------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WordLength {
    /// When parity is enabled, a word has 7 data bits + 1 parity bit,
    /// otherwise 8 data bits.
    Bits8,
    /// When parity is enabled, a word has 8 data bits + 1 parity bit.
    ///
    /// 9 data bits without parity is refused by [`Config::baud_divisor`]:
    /// the driver moves `u8`s, so the 9th bit of every word would be lost
    /// without notice.
    Bits9,
}

impl TryFrom<u8> for WordLength {
    type Error = ConfigError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(WordLength::Bits8),
            9 => Ok(WordLength::Bits9),
            _ => Err(ConfigError::DataBits(bits)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    ParityNone,
    ParityEven,
    ParityOdd,
}

impl TryFrom<char> for Parity {
    type Error = ConfigError;

    /// `N`, `E` or `O`, either case.
    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c.to_ascii_uppercase() {
            'N' => Ok(Parity::ParityNone),
            'E' => Ok(Parity::ParityEven),
            'O' => Ok(Parity::ParityOdd),
            _ => Err(ConfigError::Parity(c)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopBits {
    /// 1 stop bit
    STOP1,
    /// 2 stop bits
    STOP2,
}

impl TryFrom<u8> for StopBits {
    type Error = ConfigError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            1 => Ok(StopBits::STOP1),
            2 => Ok(StopBits::STOP2),
            _ => Err(ConfigError::StopBits(bits)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub baudrate: u32,
    pub word_length: WordLength,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

/// 19200 baud, 8 data bits + odd parity, 1 stop bit
impl Default for Config {
    fn default() -> Config {
        Config {
            baudrate: 19_200,
            word_length: WordLength::Bits9,
            parity: Parity::ParityOdd,
            stop_bits: StopBits::STOP1,
        }
    }
}

impl Config {
    /// Build from raw values, e.g. `Config::from_raw(19200, 9, 'O', 1)`.
    pub fn from_raw(
        baudrate: u32,
        data_bits: u8,
        parity: char,
        stop_bits: u8,
    ) -> Result<Self, ConfigError> {
        Ok(Config {
            baudrate,
            word_length: WordLength::try_from(data_bits)?,
            parity: Parity::try_from(parity)?,
            stop_bits: StopBits::try_from(stop_bits)?,
        })
    }

    pub fn baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate = baudrate;
        self
    }

    pub fn word_length(mut self, wordlength: WordLength) -> Self {
        self.word_length = wordlength;
        self
    }

    pub fn word_length_8bits(mut self) -> Self {
        self.word_length = WordLength::Bits8;
        self
    }

    pub fn word_length_9bits(mut self) -> Self {
        self.word_length = WordLength::Bits9;
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn parity_none(mut self) -> Self {
        self.parity = Parity::ParityNone;
        self
    }

    pub fn parity_even(mut self) -> Self {
        self.parity = Parity::ParityEven;
        self
    }

    pub fn parity_odd(mut self) -> Self {
        self.parity = Parity::ParityOdd;
        self
    }

    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Data bits of a received word. With `Bits8` and parity enabled, bit 7
    /// of the data register holds the parity bit.
    pub fn data_mask(&self) -> u8 {
        match (self.word_length, self.parity) {
            (WordLength::Bits8, Parity::ParityEven | Parity::ParityOdd) => 0x7F,
            _ => 0xFF,
        }
    }

    /// Check the frame format and compute the baud rate register value for a
    /// peripheral running at `clock` Hz.
    pub fn baud_divisor(&self, clock: u32) -> Result<u32, ConfigError> {
        // The byte stream has no room for a 9th data bit.
        if matches!(
            (self.word_length, self.parity),
            (WordLength::Bits9, Parity::ParityNone)
        ) {
            return Err(ConfigError::DataBits(9));
        }

        if self.baudrate == 0 {
            return Err(ConfigError::BaudRate(self.baudrate));
        }
        let brr = clock / self.baudrate;
        if !(16..=0xFFFF).contains(&brr) {
            return Err(ConfigError::BaudRate(self.baudrate));
        }
        Ok(brr)
    }
}
