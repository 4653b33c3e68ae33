//! Motion control task
//!
//! Single owner of the servo bus. Interleaves the fixed-cadence feedback
//! poll with on-demand commands from the network layer; both paths run
//! through the one [`MotionController`], so bus transactions never
//! overlap.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_time::{Delay, Duration, Ticker};

use strophe_core::command::RotatorCommand;
use strophe_core::motion::MotionController;

use crate::channels::{COMMAND_CHANNEL, STATUS};
use crate::link::UartServoLink;

/// Feedback poll cadence
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The concrete controller type this firmware runs
pub type RotatorController = MotionController<UartServoLink>;

/// Motion control task
#[embassy_executor::task]
pub async fn motion_task(mut controller: RotatorController) {
    info!("Motion task started");

    let mut ticker = Ticker::every(POLL_INTERVAL);
    let mut delay = Delay;

    loop {
        match select(COMMAND_CHANNEL.receive(), ticker.next()).await {
            Either::First(command) => {
                handle_command(&mut controller, command, &mut delay).await;
                STATUS.signal(controller.status());
            }
            Either::Second(()) => {
                match controller.poll(&mut delay).await {
                    Ok(sample) => {
                        if controller.load_warning() {
                            warn!("High servo load {}, possible blockage", sample.load);
                        }
                        if sample.fault.any() {
                            warn!("Servo fault flags set: {:?}", sample.fault);
                        }
                    }
                    Err(e) => {
                        // Rate-limited so a dead bus does not flood the log
                        if controller.health().should_log_failure() {
                            error!(
                                "Feedback failing ({} consecutive): {:?}",
                                controller.health().consecutive_failures(),
                                e
                            );
                        }
                    }
                }
                STATUS.signal(controller.status());
            }
        }
    }
}

async fn handle_command(
    controller: &mut RotatorController,
    command: RotatorCommand,
    delay: &mut Delay,
) {
    match command {
        RotatorCommand::MoveToAngle(deg) => {
            debug!("Move to angle {}", deg);
            if let Err(e) = controller.move_to_angle(deg, delay).await {
                error!("Move to {} failed: {:?}", deg, e);
            }
        }
        RotatorCommand::MoveByAngle(deg) => {
            debug!("Move by angle {}", deg);
            if let Err(e) = controller.move_by_angle(deg, delay).await {
                error!("Move by {} failed: {:?}", deg, e);
            }
        }
        RotatorCommand::Halt => {
            if let Err(e) = controller.halt(delay).await {
                error!("Halt failed: {:?}", e);
            }
        }
        RotatorCommand::AdjustSpeed(delta) => {
            controller.adjust_speed(delta);
            info!("Active speed now {}", controller.active_speed());
        }
        RotatorCommand::SetZero => {
            controller.set_zero();
            info!("Position zeroed");
        }
        RotatorCommand::SetMiddle => {
            controller.set_middle();
            info!("Position set to mid-point");
        }
        RotatorCommand::SetReverse(reverse) => {
            controller.set_reverse(reverse);
            info!("Reverse = {}", reverse);
        }
        RotatorCommand::SetTorque(enabled) => {
            if let Err(e) = controller.set_torque(enabled).await {
                error!("Torque command failed: {:?}", e);
            }
        }
    }
}
