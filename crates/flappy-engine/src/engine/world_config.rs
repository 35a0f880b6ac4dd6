use serde::{Deserialize, Serialize};

/// Fixed world constants.
///
/// Loaded once at startup (every field falls back to its default when missing
/// from the settings file) and never changed while a simulator is running.
/// Distances are world units, times are ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    /// Velocity added to every falling agent per tick
    pub gravity: f32,
    /// Velocity an agent takes on for the tick it jumps (negative is upward)
    pub jump_impulse: f32,
    /// Upper bound of the (downward) velocity
    pub max_fall_speed: f32,
    /// Leftward distance every obstacle pair moves per tick
    pub obstacle_speed: f32,
    pub obstacle_width: f32,
    /// Vertical opening between the top and bottom obstacle, same for every pair
    pub gap_height: f32,
    /// Minimum ticks between two spawns
    pub spawn_interval_ticks: u32,
    /// New pairs enter at `width + spawn_offset`
    pub spawn_offset: f32,
    pub agent_width: f32,
    pub agent_height: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            gravity: 0.5,
            jump_impulse: -8.0,
            max_fall_speed: 10.0,
            obstacle_speed: 3.0,
            obstacle_width: 70.0,
            gap_height: 170.0,
            spawn_interval_ticks: 120,
            spawn_offset: 10.0,
            agent_width: 50.0,
            agent_height: 35.0,
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("invalid world config: {field} {reason}")]
pub struct WorldConfigError {
    field: &'static str,
    reason: &'static str,
}

impl WorldConfig {
    /// Position every agent of a generation starts from.
    #[must_use]
    pub fn agent_start(&self) -> (f32, f32) {
        (self.width / 4.0, self.height / 2.0)
    }

    /// Horizontal position new obstacle pairs are spawned at.
    #[must_use]
    pub fn spawn_x(&self) -> f32 {
        self.width + self.spawn_offset
    }

    /// Checks the constants describe a playable world.
    ///
    /// NaN values are rejected along with non-positive ones.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn validate(&self) -> Result<(), WorldConfigError> {
        let err = |field, reason| Err(WorldConfigError { field, reason });
        if !(self.width > 0.0) {
            return err("width", "must be positive");
        }
        if !(self.height > 0.0) {
            return err("height", "must be positive");
        }
        if !(self.gap_height > 0.0 && self.gap_height < self.height) {
            return err("gap_height", "must be positive and smaller than height");
        }
        if !(self.obstacle_speed > 0.0) {
            return err("obstacle_speed", "must be positive");
        }
        if !(self.obstacle_width > 0.0) {
            return err("obstacle_width", "must be positive");
        }
        if !(self.max_fall_speed > 0.0) {
            return err("max_fall_speed", "must be positive");
        }
        if !(self.agent_width > 0.0 && self.agent_height > 0.0) {
            return err("agent_width/agent_height", "must be positive");
        }
        Ok(())
    }
}
