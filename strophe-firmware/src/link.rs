//! Servo bus link over the RP2040 UART
//!
//! [`UartBus`] is one request/response exchange at a time on the
//! half-duplex servo bus: instruction frame out, status frame back
//! within a bounded timeout. [`UartServoLink`] binds the bus to the
//! discovered servo and implements the motion core's [`ServoLink`] seam.
//! Transactions never overlap because each type is the sole owner of its
//! UART.

use embassy_rp::uart::BufferedUart;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{Read, ReadReady, Write};

use strophe_core::traits::{FeedbackSample, LinkError, ServoLink};
use strophe_drivers::servo::bringup::ServoBus;
use strophe_drivers::servo::st3215::{St3215Driver, St3215Error};
use strophe_protocol::{FrameError, InstructionFrame, StatusFrame, StatusParser};

/// Per-transaction reply timeout
///
/// The servo answers within a couple of milliseconds on a healthy bus;
/// anything slower is treated as no response.
const TRANSACTION_TIMEOUT: Duration = Duration::from_millis(20);

fn driver_error(e: St3215Error) -> LinkError {
    match e {
        St3215Error::WrongResponder => LinkError::WrongResponder,
        St3215Error::ShortResponse => LinkError::Frame(FrameError::InvalidLength),
        St3215Error::UnexpectedReply => LinkError::UnexpectedReply,
    }
}

/// Exclusive owner of the servo-bus UART
pub struct UartBus {
    uart: BufferedUart,
    parser: StatusParser,
}

impl UartBus {
    pub fn new(uart: BufferedUart) -> Self {
        Self {
            uart,
            parser: StatusParser::new(),
        }
    }

    /// Discard whatever is sitting in the RX buffer
    ///
    /// A reply that arrives after its transaction timed out stays queued
    /// in the buffered UART; left there, it would be parsed as the answer
    /// to the next request. Reads here never block: only bytes already
    /// buffered are consumed.
    async fn drain_rx(&mut self) {
        let mut scratch = [0u8; 16];
        while self.uart.read_ready().unwrap_or(false) {
            if self.uart.read(&mut scratch).await.is_err() {
                break;
            }
        }
    }

    async fn read_status(&mut self) -> Result<StatusFrame, LinkError> {
        let mut buf = [0u8; 16];
        loop {
            let n = self
                .uart
                .read(&mut buf)
                .await
                .map_err(|_| LinkError::Timeout)?;
            for &byte in &buf[..n] {
                if let Some(frame) = self.parser.feed(byte)? {
                    return Ok(frame);
                }
            }
        }
    }
}

impl ServoBus for UartBus {
    async fn transact(&mut self, frame: &InstructionFrame) -> Result<StatusFrame, LinkError> {
        let encoded = frame.encode_to_vec().map_err(LinkError::Frame)?;

        // Clear leftovers from an aborted previous exchange, both the
        // queued bytes and any partial frame in the parser
        self.drain_rx().await;
        self.parser.reset();

        self.uart
            .write_all(&encoded)
            .await
            .map_err(|_| LinkError::Timeout)?;
        self.uart.flush().await.map_err(|_| LinkError::Timeout)?;

        with_timeout(TRANSACTION_TIMEOUT, self.read_status())
            .await
            .map_err(|_| LinkError::Timeout)?
    }
}

/// The servo bus bound to one discovered servo
pub struct UartServoLink {
    bus: UartBus,
    driver: St3215Driver,
}

impl UartServoLink {
    /// Bind a bus to the driver left configured by bring-up
    pub fn new(bus: UartBus, driver: St3215Driver) -> Self {
        Self { bus, driver }
    }

    /// Bus address currently in use
    pub fn servo_id(&self) -> u8 {
        self.driver.id()
    }

    /// Exchange expecting a bare acknowledgement
    async fn transact_ack(&mut self, frame: &InstructionFrame) -> Result<(), LinkError> {
        let status = self.bus.transact(frame).await?;
        self.driver.check_ack(&status).map_err(driver_error)
    }
}

impl ServoLink for UartServoLink {
    async fn feedback(&mut self) -> Result<FeedbackSample, LinkError> {
        let request = self.driver.feedback_request();
        let status = self.bus.transact(&request).await?;
        self.driver.parse_feedback(&status).map_err(driver_error)
    }

    async fn move_relative(
        &mut self,
        delta_steps: i16,
        speed: u16,
        accel: u8,
    ) -> Result<(), LinkError> {
        let frame = self.driver.move_frame(delta_steps, speed, accel);
        self.transact_ack(&frame).await
    }

    async fn set_torque(&mut self, enabled: bool) -> Result<(), LinkError> {
        let frame = self.driver.torque_frame(enabled);
        self.transact_ack(&frame).await
    }
}
