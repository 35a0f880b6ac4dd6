use crate::core::rect::Rect;

/// Stable handle to an agent spawned into a [`Simulator`](crate::Simulator).
///
/// Handles stay valid until the next [`Simulator::reset`](crate::Simulator::reset);
/// dead agents keep their handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("agent#{_0}")]
pub struct AgentHandle(pub(crate) usize);

impl AgentHandle {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A controller-driven body falling through the world.
///
/// Agents never move horizontally; obstacles scroll past them instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    x: f32,
    y: f32,
    velocity: f32,
    width: f32,
    height: f32,
    alive: bool,
    jump_requested: bool,
}

impl Agent {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            velocity: 0.0,
            width,
            height,
            alive: true,
            jump_requested: false,
        }
    }

    /// Same agent with an initial vertical velocity.
    #[must_use]
    pub const fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity;
        self
    }

    /// Horizontal position of the leading (left) edge.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical position of the top edge.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Vertical velocity in world units per tick (positive is downward).
    #[must_use]
    pub const fn velocity(&self) -> f32 {
        self.velocity
    }

    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    #[must_use]
    pub const fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub(crate) fn request_jump(&mut self) {
        self.jump_requested = true;
    }

    /// Advances the vertical motion by one tick.
    ///
    /// A pending jump replaces gravity for this tick. The resulting velocity is
    /// clamped to `max_fall_speed` in both cases.
    pub(crate) fn apply_physics(&mut self, gravity: f32, jump_impulse: f32, max_fall_speed: f32) {
        let velocity = if self.jump_requested {
            jump_impulse
        } else {
            self.velocity + gravity
        };
        self.jump_requested = false;
        self.velocity = velocity.min(max_fall_speed);
        self.y += self.velocity;
    }

    pub(crate) fn kill(&mut self) {
        self.alive = false;
        self.jump_requested = false;
    }
}
