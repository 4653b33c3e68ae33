//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks.
//! Uses embassy-sync primitives for safe async communication.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use strophe_core::command::{RotatorCommand, RotatorStatus};

/// Channel capacity for rotator commands from the network layer
const COMMAND_CHANNEL_SIZE: usize = 8;

/// Rotator commands from the network layer to the motion task
pub static COMMAND_CHANNEL: Channel<
    CriticalSectionRawMutex,
    RotatorCommand,
    COMMAND_CHANNEL_SIZE,
> = Channel::new();

/// Latest rotator status snapshot (updated by the motion task)
pub static STATUS: Signal<CriticalSectionRawMutex, RotatorStatus> = Signal::new();
