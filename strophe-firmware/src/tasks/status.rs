//! Status reporting task
//!
//! Consumes the snapshots published by the motion task. This is the seam
//! the display and network status endpoints read from; for now the
//! snapshot goes to the debug log.

use defmt::*;

use crate::channels::STATUS;

/// Status task - logs each published rotator snapshot
#[embassy_executor::task]
pub async fn status_task() {
    info!("Status task started");

    loop {
        let status = STATUS.wait().await;
        debug!(
            "angle={} target={} moving={} blocked={} speed={} steps={}",
            status.angle,
            status.target_angle,
            status.moving,
            status.blocked,
            status.speed,
            status.accumulated_steps
        );
        if status.blocked {
            warn!("Rotator reports blocked");
        }
    }
}
