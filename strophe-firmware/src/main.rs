//! Strophe - ASCOM Alpaca rotator firmware
//!
//! Main firmware binary for RP2040-based rotator controllers. Drives an
//! ST3215 serial-bus servo in continuous motor mode and exposes it as an
//! astronomical field rotator.
//!
//! Named after the Greek "strophe" meaning "a turning" - the turn of the
//! chorus across the stage, and of the field of view across the sky.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::UART1;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_time::{Delay, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use strophe_core::config::MotionConfig;
use strophe_core::motion::MotionController;
use strophe_drivers::servo::bringup;
use strophe_drivers::servo::st3215::{St3215Driver, FALLBACK_ID};

use crate::link::{UartBus, UartServoLink};

mod channels;
mod link;
mod tasks;

bind_interrupts!(struct Irqs {
    UART1_IRQ => BufferedInterruptHandler<UART1>;
});

/// Servo bus baud rate (ST3215 factory default)
const SERVO_BAUD: u32 = 1_000_000;

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Strophe firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Servo bus on UART1 (GPIO4 TX, GPIO5 RX, half-duplex adapter)
    let uart_config = {
        let mut cfg = UartConfig::default();
        cfg.baudrate = SERVO_BAUD;
        cfg
    };

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart = Uart::new_blocking(p.UART1, p.PIN_4, p.PIN_5, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);

    info!("Servo bus UART initialized at {} baud", SERVO_BAUD);

    // Give the servo time to boot before the first exchange
    Timer::after_millis(200).await;

    let mut bus = UartBus::new(uart);
    let mut driver = St3215Driver::new(FALLBACK_ID);
    let mut degraded = false;

    // Bus discovery: each candidate ID is asked for a telemetry block
    match bringup::scan(&mut bus, &mut driver).await {
        Some(sample) => info!(
            "Servo at bus ID {}: mode={} voltage={}dV",
            driver.id(),
            sample.mode,
            sample.voltage_dv
        ),
        None => {
            // Not fatal: the servo may appear once cabling is fixed
            warn!("No servo answered the scan, assuming ID {}", driver.id());
            degraded = true;
        }
    }

    // Travel limits + motor mode, then verify the mode stuck
    if let Err(e) = bringup::configure(&mut bus, &mut driver).await {
        error!("Servo configuration failed: {:?}", e);
        degraded = true;
    } else if let Err(e) = bringup::verify_motor_mode(&mut bus, &mut driver).await {
        error!("Could not pin motor mode: {:?}", e);
        degraded = true;
    }

    let link = UartServoLink::new(bus, driver);
    let mut controller = MotionController::new(link, MotionConfig::default());

    // Initial feedback read establishes last-known telemetry
    match controller.poll(&mut Delay).await {
        Ok(sample) => info!(
            "Servo online: mode={} voltage={}dV temp={}C",
            sample.mode, sample.voltage_dv, sample.temperature_c
        ),
        Err(e) => {
            error!("Initial feedback read failed: {:?}", e);
            degraded = true;
        }
    }

    if degraded {
        warn!("Bring-up completed degraded; motion commands may fail");
    }

    spawner.spawn(tasks::motion_task(controller)).unwrap();
    spawner.spawn(tasks::status_task()).unwrap();

    info!("All tasks spawned, firmware running");

    // Main task has nothing else to do - all work happens in spawned tasks
    loop {
        Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
