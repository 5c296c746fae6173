//! Line echo over the simulated UART.
//!
//! A second thread plays the hardware: it feeds bytes onto the RX line and
//! calls the interrupt vector, the main thread is the foreground loop.
//!
//! cargo run --example echo --features std

use serialio_hal::{
    interrupt::Callback,
    os::{StdInterval, StdWaiter, Waiter},
    static_serial_buffers,
    uart::{BlockingByteStream, Config, SerialPort, UartPeriph, sim::SimUart},
};
use std::{thread, time::Duration};

static USART2_CB: Callback = Callback::new();

fn main() {
    env_logger::init();

    let uart = SimUart::new(24_000_000);
    let buffers = static_serial_buffers!(128, 128);
    let (port, mut bridge) = match SerialPort::init(uart.clone(), Config::default(), buffers) {
        Ok(v) => v,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    USART2_CB.set(move || bridge.handler());

    let line = uart.clone();
    thread::spawn(move || {
        line.receive(b"LED ON\r\nled off\r\n");
        loop {
            if line.is_irq_pending() {
                unsafe { USART2_CB.call() };
            } else {
                thread::sleep(Duration::from_micros(50));
            }
        }
    });

    let mut stream = BlockingByteStream::new(port);
    let to = StdWaiter::new(Duration::from_millis(200), StdInterval::new(Duration::ZERO));
    let mut buf = [0u8; 32];
    let mut len = 0;
    loop {
        let byte = match stream.read_timeout(&mut to.start()) {
            Ok(b) => b,
            Err(_) => break,
        };
        match byte {
            b'\r' => {}
            b'\n' => {
                let text = core::str::from_utf8(&buf[..len]).unwrap_or("?");
                if core::fmt::Write::write_fmt(&mut stream, format_args!("echo: {text}\r\n")).is_err() {
                    break;
                }
                len = 0;
            }
            b if len < buf.len() => {
                buf[len] = b;
                len += 1;
            }
            _ => {}
        }
    }

    let _ = stream.flush_timeout(&mut to.start());
    let sent = uart.take_sent();
    print!("{}", String::from_utf8_lossy(&sent));
    log::info!(
        "stats: {:?}, tx interrupt {}",
        stream.port().stats().snapshot(),
        if uart.is_interrupt_enable(serialio_hal::uart::UartEvent::TxEmpty) {
            "enabled"
        } else {
            "disabled"
        }
    );
}
