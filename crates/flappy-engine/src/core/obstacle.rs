use crate::core::rect::Rect;

/// A top/bottom obstacle sharing one horizontal position and one gap.
///
/// The top obstacle spans from the ceiling down to the gap, the bottom one from
/// the gap down to the floor. Pairs only ever move left.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstaclePair {
    id: u64,
    x: f32,
    width: f32,
    gap_center: f32,
    gap_height: f32,
    world_height: f32,
    scored: bool,
}

impl ObstaclePair {
    #[must_use]
    pub const fn new(
        id: u64,
        x: f32,
        width: f32,
        gap_center: f32,
        gap_height: f32,
        world_height: f32,
    ) -> Self {
        Self {
            id,
            x,
            width,
            gap_center,
            gap_height,
            world_height,
            scored: false,
        }
    }

    /// Spawn sequence number, unique within one simulator run.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Horizontal position of the leading (left) edge.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    #[must_use]
    pub const fn width(&self) -> f32 {
        self.width
    }

    /// Horizontal position of the trailing (right) edge.
    #[must_use]
    pub const fn right(&self) -> f32 {
        self.x + self.width
    }

    #[must_use]
    pub const fn gap_center(&self) -> f32 {
        self.gap_center
    }

    #[must_use]
    pub const fn gap_height(&self) -> f32 {
        self.gap_height
    }

    /// Bottom edge of the top obstacle.
    #[must_use]
    pub fn gap_top(&self) -> f32 {
        self.gap_center - self.gap_height / 2.0
    }

    /// Top edge of the bottom obstacle.
    #[must_use]
    pub fn gap_bottom(&self) -> f32 {
        self.gap_center + self.gap_height / 2.0
    }

    #[must_use]
    pub fn top_rect(&self) -> Rect {
        Rect::new(self.x, 0.0, self.width, self.gap_top().max(0.0))
    }

    #[must_use]
    pub fn bottom_rect(&self) -> Rect {
        let top = self.gap_bottom().min(self.world_height);
        Rect::new(self.x, top, self.width, self.world_height - top)
    }

    #[must_use]
    pub fn collides_with(&self, rect: &Rect) -> bool {
        self.top_rect().intersects(rect) || self.bottom_rect().intersects(rect)
    }

    /// Whether the pair has already been counted toward the shared score.
    #[must_use]
    pub const fn is_scored(&self) -> bool {
        self.scored
    }

    pub(crate) fn advance(&mut self, speed: f32) {
        self.x -= speed;
    }

    pub(crate) fn mark_scored(&mut self) {
        self.scored = true;
    }
}
