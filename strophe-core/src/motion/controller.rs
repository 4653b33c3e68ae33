//! Motion controller
//!
//! Owns the authoritative position model for the rotator. The servo can
//! only execute relative step deltas and report remaining distance to its
//! last target, so absolute position exists nowhere but here: the
//! controller accumulates every delta it successfully issues and recovers
//! the live position as `accumulated - remaining`.
//!
//! Position bookkeeping is kept in the logical (unreversed) frame. The
//! `reverse` flag negates only the motor-facing delta, so toggling it
//! never changes the reported angle.

use embedded_hal_async::delay::DelayNs;

use crate::config::{clamp_speed, MotionConfig, MOVING_THRESHOLD};
use crate::health::{HealthMonitor, RetryAction};
use crate::motion::angle::{
    angle_to_steps, normalize_angle, shortest_delta, steps_to_angle, DEGREES_PER_REVOLUTION,
    STEPS_PER_REVOLUTION,
};
use crate::traits::{FeedbackSample, LinkError, ServoLink};

/// Motion controller error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionError {
    /// The bus transaction for the move failed; position state unchanged
    Link(LinkError),
    /// The computed step delta does not fit a single move command
    DeltaOutOfRange,
}

impl From<LinkError> for MotionError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

/// Authoritative rotator position model and move issuer
///
/// Every bus operation at runtime funnels through the owned link, so a
/// single instance also serializes access to the half-duplex bus.
pub struct MotionController<L> {
    link: L,
    config: MotionConfig,
    /// Logical (unreversed) target step count; authoritative for angle
    accumulated_steps: i32,
    /// Motor-facing commanded target step count
    target_steps: i32,
    active_speed: u16,
    last_feedback: Option<FeedbackSample>,
    health: HealthMonitor,
    /// High-load verdict from the monitor on the last good poll
    high_load: bool,
}

impl<L: ServoLink> MotionController<L> {
    /// Create a controller at position zero
    ///
    /// There is no absolute encoder read-back, so every start defines the
    /// current physical orientation as zero.
    pub fn new(link: L, config: MotionConfig) -> Self {
        let active_speed = clamp_speed(config.initial_speed as i32);
        Self {
            link,
            config,
            accumulated_steps: 0,
            target_steps: 0,
            active_speed,
            last_feedback: None,
            health: HealthMonitor::new(),
            high_load: false,
        }
    }

    /// Poll feedback with bounded retries
    ///
    /// Returns the fresh sample, or the last link error once the health
    /// monitor gives up. Either way the monitor state is updated, so a
    /// failed poll is observable through [`Self::is_blocked`].
    pub async fn poll<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<FeedbackSample, LinkError> {
        loop {
            match self.link.feedback().await {
                Ok(sample) => {
                    self.high_load = self.health.record_success(sample.load);
                    self.last_feedback = Some(sample);
                    return Ok(sample);
                }
                Err(e) => match self.health.record_failure() {
                    RetryAction::Retry { backoff_ms } => delay.delay_ms(backoff_ms).await,
                    RetryAction::GiveUp => return Err(e),
                },
            }
        }
    }

    /// Remaining distance in the logical frame
    ///
    /// The device reports remaining steps in the motor frame, so the
    /// reversal flag flips its sign before it enters position math.
    fn logical_remaining(&self) -> i32 {
        let raw = self
            .last_feedback
            .map(|f| f.position_remaining as i32)
            .unwrap_or(0);
        if self.config.reverse {
            -raw
        } else {
            raw
        }
    }

    /// Live position estimate in logical steps
    fn current_steps(&self) -> i32 {
        self.accumulated_steps - self.logical_remaining()
    }

    /// Gear angle from the current position model, without a bus poll
    pub fn current_angle(&self) -> f64 {
        steps_to_angle(self.current_steps(), self.config.gear_ratio)
    }

    /// Gear angle of the last commanded target
    pub fn target_angle(&self) -> f64 {
        steps_to_angle(self.accumulated_steps, self.config.gear_ratio)
    }

    /// Refresh feedback and return the gear angle in `[0, 360)`
    ///
    /// Under transport failure this degrades to the last commanded
    /// position (remaining assumed zero) instead of erroring; callers
    /// needing freshness check [`Self::is_blocked`].
    pub async fn angle<D: DelayNs>(&mut self, delay: &mut D) -> f64 {
        match self.poll(delay).await {
            Ok(_) => self.current_angle(),
            Err(_) => steps_to_angle(self.accumulated_steps, self.config.gear_ratio),
        }
    }

    /// Move to an absolute gear angle via the shortest path
    ///
    /// The commanded delta never exceeds half a gear revolution. On a
    /// link failure no position state changes and the caller may retry.
    pub async fn move_to_angle<D: DelayNs>(
        &mut self,
        target_deg: f64,
        delay: &mut D,
    ) -> Result<(), MotionError> {
        let target = normalize_angle(self.config.mapping.map_target(target_deg));
        let current = self.angle(delay).await;

        let delta_deg = shortest_delta(current, target);
        let logical_delta = angle_to_steps(delta_deg, self.config.gear_ratio);
        let motor_delta = if self.config.reverse {
            -logical_delta
        } else {
            logical_delta
        };
        let motor_delta =
            i16::try_from(motor_delta).map_err(|_| MotionError::DeltaOutOfRange)?;

        self.link
            .move_relative(motor_delta, self.active_speed, self.config.accel)
            .await?;

        // Commit only after the device acknowledged the command
        self.target_steps += motor_delta as i32;
        self.accumulated_steps += logical_delta;
        Ok(())
    }

    /// Move by a relative gear angle
    ///
    /// Defined in terms of [`Self::move_to_angle`] so both entry points
    /// always agree on the step math.
    pub async fn move_by_angle<D: DelayNs>(
        &mut self,
        delta_deg: f64,
        delay: &mut D,
    ) -> Result<(), MotionError> {
        let current = self.angle(delay).await;
        self.move_to_angle(current + delta_deg, delay).await
    }

    /// Stop motion and re-sync the position model
    ///
    /// The accumulated count is pulled back by the distance the motor
    /// never covered, so future relative moves start from where the shaft
    /// actually is rather than from the unreached target. Torque is then
    /// cycled off and on to discard the device's stale target.
    pub async fn halt<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), MotionError> {
        // Best effort: a fresh remaining value makes the re-sync exact
        let _ = self.poll(delay).await;

        let raw_remaining = self
            .last_feedback
            .map(|f| f.position_remaining as i32)
            .unwrap_or(0);
        self.accumulated_steps -= self.logical_remaining();
        self.target_steps -= raw_remaining;
        if let Some(f) = &mut self.last_feedback {
            f.position_remaining = 0;
        }

        self.link.set_torque(false).await?;
        self.link.set_torque(true).await?;
        Ok(())
    }

    /// Enable or disable holding torque without touching the position model
    pub async fn set_torque(&mut self, enabled: bool) -> Result<(), MotionError> {
        self.link.set_torque(enabled).await.map_err(MotionError::Link)
    }

    /// Define the current physical orientation as angle zero
    ///
    /// No physical motion is commanded.
    pub fn set_zero(&mut self) {
        self.accumulated_steps = 0;
        self.target_steps = 0;
        if let Some(f) = &mut self.last_feedback {
            f.position_remaining = 0;
        }
    }

    /// Define the current physical orientation as the gear mid-point
    ///
    /// Sets the position model to 90 gear degrees without motion.
    pub fn set_middle(&mut self) {
        let steps = libm::round(
            STEPS_PER_REVOLUTION as f64 * self.config.gear_ratio / 4.0,
        ) as i32;
        self.accumulated_steps = steps;
        self.target_steps = if self.config.reverse { -steps } else { steps };
        if let Some(f) = &mut self.last_feedback {
            f.position_remaining = 0;
        }
    }

    /// Adjust the active speed by a signed amount, clamping the result
    pub fn adjust_speed(&mut self, delta: i32) {
        self.active_speed = clamp_speed(self.active_speed as i32 + delta);
    }

    /// Set the active speed directly, clamping into range
    pub fn set_speed(&mut self, speed: u16) {
        self.active_speed = clamp_speed(speed as i32);
    }

    /// Set the motor-facing direction reversal flag
    ///
    /// Affects only future motor-facing deltas; the reported angle is
    /// independent of this flag.
    pub fn set_reverse(&mut self, reverse: bool) {
        self.config.reverse = reverse;
    }

    /// Refresh feedback and report whether the motor is moving
    ///
    /// Falls back to the last known sample when the poll fails.
    pub async fn is_moving<D: DelayNs>(&mut self, delay: &mut D) -> bool {
        let _ = self.poll(delay).await;
        self.last_feedback
            .map(|f| f.speed.unsigned_abs() > MOVING_THRESHOLD as u16)
            .unwrap_or(false)
    }

    /// Whether the health monitor currently flags the motor blocked
    pub fn is_blocked(&self) -> bool {
        self.health.is_blocked()
    }

    /// Whether the last good poll tripped the monitor's load threshold
    pub fn load_warning(&self) -> bool {
        self.high_load
    }

    /// Health monitor state, for diagnostics
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Active commanded speed
    pub fn active_speed(&self) -> u16 {
        self.active_speed
    }

    /// Authoritative accumulated step count (logical frame)
    pub fn accumulated_steps(&self) -> i32 {
        self.accumulated_steps
    }

    /// Last good telemetry sample, if any poll has ever succeeded
    pub fn last_feedback(&self) -> Option<&FeedbackSample> {
        self.last_feedback.as_ref()
    }

    /// Snapshot for status consumers, from the current model (no poll)
    pub fn status(&self) -> crate::command::RotatorStatus {
        crate::command::RotatorStatus {
            angle: self.current_angle(),
            target_angle: self.target_angle(),
            moving: self
                .last_feedback
                .map(|f| f.speed.unsigned_abs() > MOVING_THRESHOLD as u16)
                .unwrap_or(false),
            blocked: self.health.is_blocked(),
            speed: self.active_speed,
            accumulated_steps: self.accumulated_steps,
            voltage_dv: self.last_feedback.map(|f| f.voltage_dv),
            temperature_c: self.last_feedback.map(|f| f.temperature_c),
            load: self.last_feedback.map(|f| f.load),
            mode: self.last_feedback.map(|f| f.mode),
        }
    }

    /// Angular size of one motor step on the gear, in degrees
    pub fn step_size(&self) -> f64 {
        DEGREES_PER_REVOLUTION / STEPS_PER_REVOLUTION as f64 / self.config.gear_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::MAX_FEEDBACK_RETRIES;
    use crate::motion::AngleMapping;
    use embassy_futures::block_on;
    use std::vec;
    use std::vec::Vec;
    use strophe_protocol::ServoFault;

    /// Delay that completes immediately, for retry loops under test
    struct NoopDelay;

    impl DelayNs for NoopDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    /// Simulated servo: configurable telemetry plus a command log
    struct MockLink {
        remaining: i16,
        speed: i16,
        load: i16,
        fail_polls: u32,
        fail_moves: bool,
        moves: Vec<(i16, u16, u8)>,
        torque: Vec<bool>,
    }

    impl MockLink {
        fn new() -> Self {
            Self {
                remaining: 0,
                speed: 0,
                load: 0,
                fail_polls: 0,
                fail_moves: false,
                moves: Vec::new(),
                torque: Vec::new(),
            }
        }

        fn sample(&self) -> FeedbackSample {
            FeedbackSample {
                position_remaining: self.remaining,
                speed: self.speed,
                load: self.load,
                voltage_dv: 121,
                temperature_c: 32,
                current_raw: 0,
                moving: self.speed != 0,
                mode: 3,
                fault: ServoFault::from_bits(0),
            }
        }
    }

    impl ServoLink for MockLink {
        async fn feedback(&mut self) -> Result<FeedbackSample, LinkError> {
            if self.fail_polls > 0 {
                self.fail_polls -= 1;
                return Err(LinkError::Timeout);
            }
            Ok(self.sample())
        }

        async fn move_relative(
            &mut self,
            delta_steps: i16,
            speed: u16,
            accel: u8,
        ) -> Result<(), LinkError> {
            if self.fail_moves {
                return Err(LinkError::Timeout);
            }
            self.moves.push((delta_steps, speed, accel));
            Ok(())
        }

        async fn set_torque(&mut self, enabled: bool) -> Result<(), LinkError> {
            self.torque.push(enabled);
            Ok(())
        }
    }

    fn controller() -> MotionController<MockLink> {
        MotionController::new(MockLink::new(), MotionConfig::default())
    }

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        libm::fabs(a - b) < tol
    }

    #[test]
    fn test_move_to_angle_commands_expected_delta() {
        let mut ctl = controller();
        block_on(ctl.move_to_angle(90.0, &mut NoopDelay)).unwrap();

        // 90 gear degrees at 2:1 is half a motor revolution
        assert_eq!(ctl.link.moves, vec![(2048, 400, 100)]);
        assert_eq!(ctl.accumulated_steps(), 2048);
        assert_eq!(ctl.current_angle(), 90.0);
    }

    #[test]
    fn test_sequential_absolute_moves_land_on_target() {
        let mut ctl = controller();
        let tol = ctl.step_size();

        for &(a, b) in &[(30.0, 210.0), (350.0, 10.0), (123.4, 300.0)] {
            block_on(ctl.move_to_angle(a, &mut NoopDelay)).unwrap();
            assert!(approx_eq(ctl.current_angle(), a, tol));
            block_on(ctl.move_to_angle(b, &mut NoopDelay)).unwrap();
            assert!(approx_eq(ctl.current_angle(), b, tol));
        }
    }

    #[test]
    fn test_shortest_path_across_zero() {
        let mut ctl = controller();
        block_on(ctl.move_to_angle(350.0, &mut NoopDelay)).unwrap();
        ctl.link.moves.clear();

        block_on(ctl.move_to_angle(10.0, &mut NoopDelay)).unwrap();

        // Roughly 20 degrees forward, never 340 backward
        let (delta, _, _) = ctl.link.moves[0];
        assert!(delta > 0);
        assert!(delta <= angle_to_steps(21.0, 2.0) as i16);
        assert!(approx_eq(ctl.current_angle(), 10.0, ctl.step_size()));
    }

    #[test]
    fn test_move_by_matches_move_to() {
        let mut a = controller();
        let mut b = controller();

        block_on(a.move_to_angle(90.0, &mut NoopDelay)).unwrap();
        block_on(b.move_to_angle(90.0, &mut NoopDelay)).unwrap();

        block_on(a.move_by_angle(45.0, &mut NoopDelay)).unwrap();
        block_on(b.move_to_angle(normalize_angle(90.0 + 45.0), &mut NoopDelay)).unwrap();

        assert_eq!(a.accumulated_steps(), b.accumulated_steps());
        assert_eq!(a.current_angle(), b.current_angle());
    }

    #[test]
    fn test_reverse_negates_motor_delta_only() {
        let mut ctl = controller();
        ctl.set_reverse(true);

        block_on(ctl.move_to_angle(90.0, &mut NoopDelay)).unwrap();

        // Motor sees the negated delta, the model does not
        assert_eq!(ctl.link.moves, vec![(-2048, 400, 100)]);
        assert_eq!(ctl.accumulated_steps(), 2048);
        assert_eq!(ctl.current_angle(), 90.0);
    }

    #[test]
    fn test_reverse_toggle_keeps_angle() {
        let mut ctl = controller();
        block_on(ctl.move_to_angle(123.0, &mut NoopDelay)).unwrap();
        let before = ctl.current_angle();

        ctl.set_reverse(true);
        ctl.set_reverse(false);
        ctl.set_reverse(true);

        assert_eq!(ctl.current_angle(), before);
    }

    #[test]
    fn test_failed_move_leaves_state_untouched() {
        let mut ctl = controller();
        block_on(ctl.move_to_angle(45.0, &mut NoopDelay)).unwrap();
        let steps = ctl.accumulated_steps();

        ctl.link.fail_moves = true;
        let result = block_on(ctl.move_to_angle(200.0, &mut NoopDelay));

        assert_eq!(result, Err(MotionError::Link(LinkError::Timeout)));
        assert_eq!(ctl.accumulated_steps(), steps);
        assert!(approx_eq(ctl.current_angle(), 45.0, ctl.step_size()));
    }

    #[test]
    fn test_speed_clamp() {
        let mut ctl = controller();

        ctl.adjust_speed(999_999);
        assert_eq!(ctl.active_speed(), 4000);

        ctl.adjust_speed(-999_999);
        assert_eq!(ctl.active_speed(), 100);

        ctl.adjust_speed(300);
        assert_eq!(ctl.active_speed(), 400);

        ctl.set_speed(50);
        assert_eq!(ctl.active_speed(), 100);
    }

    #[test]
    fn test_set_zero_then_angle_is_zero() {
        let mut ctl = controller();
        block_on(ctl.move_to_angle(271.5, &mut NoopDelay)).unwrap();

        ctl.set_zero();

        assert_eq!(ctl.current_angle(), 0.0);
        assert_eq!(ctl.accumulated_steps(), 0);
    }

    #[test]
    fn test_set_middle() {
        let mut ctl = controller();
        ctl.set_middle();

        assert_eq!(ctl.accumulated_steps(), 2048);
        assert_eq!(ctl.current_angle(), 90.0);
    }

    #[test]
    fn test_halt_resyncs_to_actual_position() {
        let mut ctl = controller();
        // Command 1000 logical steps
        let target = steps_to_angle(1000, 2.0);
        block_on(ctl.move_to_angle(target, &mut NoopDelay)).unwrap();
        let target_before = ctl.accumulated_steps();
        assert_eq!(target_before, 1000);

        // Mid-flight: 400 steps still to go
        ctl.link.remaining = 400;
        block_on(ctl.halt(&mut NoopDelay)).unwrap();

        assert_eq!(ctl.accumulated_steps(), target_before - 400);
        assert_eq!(ctl.link.torque, vec![false, true]);
        // Remaining was consumed by the re-sync, not double counted
        assert_eq!(ctl.current_steps(), target_before - 400);
    }

    #[test]
    fn test_blocked_after_retries_and_cleared_by_success() {
        let mut ctl = controller();
        ctl.link.fail_polls = MAX_FEEDBACK_RETRIES as u32;

        let result = block_on(ctl.poll(&mut NoopDelay));
        assert_eq!(result, Err(LinkError::Timeout));
        assert!(ctl.is_blocked());

        // Link recovers; one good poll clears the flag
        let result = block_on(ctl.poll(&mut NoopDelay));
        assert!(result.is_ok());
        assert!(!ctl.is_blocked());
    }

    #[test]
    fn test_poll_retries_through_transient_failures() {
        let mut ctl = controller();
        ctl.link.fail_polls = 3;

        let result = block_on(ctl.poll(&mut NoopDelay));
        assert!(result.is_ok());
        assert!(!ctl.is_blocked());
    }

    #[test]
    fn test_angle_degrades_to_last_commanded() {
        let mut ctl = controller();
        block_on(ctl.move_to_angle(90.0, &mut NoopDelay)).unwrap();

        ctl.link.fail_polls = u32::MAX;
        let angle = block_on(ctl.angle(&mut NoopDelay));

        assert_eq!(angle, 90.0);
        assert!(ctl.is_blocked());
    }

    #[test]
    fn test_is_moving_threshold() {
        let mut ctl = controller();

        ctl.link.speed = 10;
        assert!(!block_on(ctl.is_moving(&mut NoopDelay)));

        ctl.link.speed = 11;
        assert!(block_on(ctl.is_moving(&mut NoopDelay)));

        ctl.link.speed = -11;
        assert!(block_on(ctl.is_moving(&mut NoopDelay)));
    }

    #[test]
    fn test_folded_mapping_targets() {
        let config = MotionConfig {
            mapping: AngleMapping::FoldedHalf,
            ..MotionConfig::default()
        };
        let mut ctl = MotionController::new(MockLink::new(), config);

        block_on(ctl.move_to_angle(270.0, &mut NoopDelay)).unwrap();

        // 270 folds to |180 - 270| = 90
        assert_eq!(ctl.current_angle(), 90.0);
    }

    #[test]
    fn test_status_snapshot() {
        let mut ctl = controller();
        block_on(ctl.move_to_angle(90.0, &mut NoopDelay)).unwrap();

        let status = ctl.status();
        assert_eq!(status.angle, 90.0);
        assert_eq!(status.target_angle, 90.0);
        assert!(!status.blocked);
        assert_eq!(status.speed, 400);
        assert_eq!(status.accumulated_steps, 2048);
        assert_eq!(status.voltage_dv, Some(121));
    }

    #[test]
    fn test_status_reports_target_while_in_flight() {
        let mut ctl = controller();
        block_on(ctl.move_to_angle(90.0, &mut NoopDelay)).unwrap();

        // Mid-flight: 1024 motor steps still outstanding
        ctl.link.remaining = 1024;
        block_on(ctl.poll(&mut NoopDelay)).unwrap();

        let status = ctl.status();
        assert_eq!(status.target_angle, 90.0);
        assert_eq!(status.angle, 45.0);

        // Once the remaining distance drains, the two agree again
        ctl.link.remaining = 0;
        block_on(ctl.poll(&mut NoopDelay)).unwrap();
        let status = ctl.status();
        assert_eq!(status.angle, status.target_angle);
    }

    #[test]
    fn test_load_warning_follows_monitor_verdict() {
        let mut ctl = controller();

        ctl.link.load = 801;
        block_on(ctl.poll(&mut NoopDelay)).unwrap();
        assert!(ctl.load_warning());

        ctl.link.load = -801;
        block_on(ctl.poll(&mut NoopDelay)).unwrap();
        assert!(ctl.load_warning());

        ctl.link.load = 100;
        block_on(ctl.poll(&mut NoopDelay)).unwrap();
        assert!(!ctl.load_warning());
    }
}
