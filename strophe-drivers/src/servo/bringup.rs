//! Boot-time bring-up sequences
//!
//! Discovery and EPROM configuration are ordinary bus transactions, so
//! they live here behind a minimal transport seam rather than in the
//! firmware. The firmware supplies a [`ServoBus`] over the UART; tests
//! supply a scripted one.

use strophe_core::traits::{FeedbackSample, LinkError};
use strophe_protocol::{InstructionFrame, StatusFrame};

use super::st3215::{
    St3215Driver, St3215Error, FALLBACK_ID, MOTOR_MODE, SCAN_ID_MAX, SCAN_ID_MIN,
};

/// Configuration attempts before giving up on pinning motor mode
pub const MODE_PIN_ATTEMPTS: u8 = 3;

/// One request/response exchange on the servo bus
///
/// The implementation owns framing, the per-transaction timeout, and
/// discarding anything left over from a previous exchange.
#[allow(async_fn_in_trait)]
pub trait ServoBus {
    async fn transact(&mut self, frame: &InstructionFrame) -> Result<StatusFrame, LinkError>;
}

/// Failure during boot-time configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringupError {
    /// A bus transaction failed outright
    Link(LinkError),
    /// The servo answered, but the reply did not validate
    BadReply(St3215Error),
    /// The travel limits read back nonzero after being programmed
    LimitsNotCleared { min: u16, max: u16 },
    /// The operating mode refused to stick after repeated configuration
    ModeNotPinned { mode: u8 },
}

impl From<LinkError> for BringupError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<St3215Error> for BringupError {
    fn from(e: St3215Error) -> Self {
        Self::BadReply(e)
    }
}

/// Find the servo by walking the candidate bus addresses
///
/// Each candidate is asked for a full telemetry block, so a hit both
/// proves the device is there and yields a first sample. On a miss the
/// driver is left bound to [`FALLBACK_ID`].
pub async fn scan<B: ServoBus>(
    bus: &mut B,
    driver: &mut St3215Driver,
) -> Option<FeedbackSample> {
    for id in SCAN_ID_MIN..=SCAN_ID_MAX {
        driver.set_id(id);
        let request = driver.feedback_request();
        if let Ok(status) = bus.transact(&request).await {
            if let Ok(sample) = driver.parse_feedback(&status) {
                return Some(sample);
            }
        }
    }
    driver.set_id(FALLBACK_ID);
    None
}

/// Program the EPROM for continuous rotation and verify the result
///
/// Travel limits are pinned to zero and the operating mode forced to
/// motor mode inside an unlock/lock bracket. The lock frame is delivered
/// even when a write in the bracket fails, so the gate never stays open.
/// After locking, the limits are read back; anything nonzero means the
/// writes did not take.
pub async fn configure<B: ServoBus>(
    bus: &mut B,
    driver: &mut St3215Driver,
) -> Result<(), BringupError> {
    let [unlock, limits, mode, lock] = driver.bringup_frames();

    ack(bus, driver, &unlock).await?;
    let mut writes = ack(bus, driver, &limits).await;
    if writes.is_ok() {
        writes = ack(bus, driver, &mode).await;
    }
    let locked = ack(bus, driver, &lock).await;
    writes?;
    locked?;

    let status = bus.transact(&driver.limits_request()).await?;
    let (min, max) = driver.parse_limits(&status)?;
    if min != 0 || max != 0 {
        return Err(BringupError::LimitsNotCleared { min, max });
    }
    Ok(())
}

/// Confirm the servo runs in motor mode, reconfiguring if it does not
///
/// Some units come up reporting their previous mode; re-running the
/// EPROM sequence usually clears that. After [`MODE_PIN_ATTEMPTS`]
/// rounds the mode is considered stuck.
pub async fn verify_motor_mode<B: ServoBus>(
    bus: &mut B,
    driver: &mut St3215Driver,
) -> Result<(), BringupError> {
    let mut mode = MOTOR_MODE;
    for _ in 0..MODE_PIN_ATTEMPTS {
        let status = bus.transact(&driver.mode_request()).await?;
        mode = driver.parse_mode(&status)?;
        if mode == MOTOR_MODE {
            return Ok(());
        }
        configure(bus, driver).await?;
    }
    Err(BringupError::ModeNotPinned { mode })
}

async fn ack<B: ServoBus>(
    bus: &mut B,
    driver: &St3215Driver,
    frame: &InstructionFrame,
) -> Result<(), BringupError> {
    let status = bus.transact(frame).await?;
    driver.check_ack(&status)?;
    Ok(())
}
