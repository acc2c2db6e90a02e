//! Local control-loop state, updated once per minor cycle and
//! published to the bridge. Mirrors the setpoints the Non-RT side
//! writes into the hot-key cache: commanded velocity ceiling and PID
//! gains.

/// High-level operating mode, published as `robot_mode` on the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RobotMode {
    Idle = 0,
    Auto = 1,
    Emergency = 2,
}

/// Mutable control state carried across minor cycles by the control
/// loop action. Not `Copy`: owned by the single closure that runs it.
#[derive(Debug, Clone)]
pub struct ControlState {
    pub mode: RobotMode,
    pub position: f32,
    pub velocity: f32,
    pub target_position: f32,
    pub estop: bool,
}

impl ControlState {
    pub fn new() -> Self {
        Self {
            mode: RobotMode::Idle,
            position: 0.0,
            velocity: 0.0,
            target_position: 0.0,
            estop: false,
        }
    }

    /// Run one proportional step, clamped to `max_velocity`.
    pub fn step(&mut self, dt_s: f32, max_velocity: f32, pid_kp: f32) {
        if self.estop {
            self.mode = RobotMode::Emergency;
            self.velocity = 0.0;
            return;
        }
        self.mode = RobotMode::Auto;
        let error = self.target_position - self.position;
        let commanded = (error * pid_kp).clamp(-max_velocity, max_velocity);
        self.velocity = commanded;
        self.position += self.velocity * dt_s;
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_moves_toward_target() {
        let mut state = ControlState::new();
        state.target_position = 10.0;
        for _ in 0..2000 {
            state.step(0.001, 5.0, 2.0);
        }
        assert!(state.position > 0.0);
        assert!(state.position <= 10.1);
    }

    #[test]
    fn estop_forces_emergency_and_zero_velocity() {
        let mut state = ControlState::new();
        state.target_position = 10.0;
        state.estop = true;
        state.step(0.001, 5.0, 2.0);
        assert_eq!(state.mode, RobotMode::Emergency);
        assert_eq!(state.velocity, 0.0);
    }

    #[test]
    fn velocity_is_clamped_to_max() {
        let mut state = ControlState::new();
        state.target_position = 1000.0;
        state.step(0.001, 3.0, 10.0);
        assert!(state.velocity <= 3.0);
    }
}
