use crate::domain::Rgb;

/// Latest motion of one pointer, in surface pixels (y down).
/// `moved` marks a record the driver has not consumed yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pointer {
    pub id: i32,
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub color: Rgb,
    pub moved: bool,
}

impl Pointer {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            dx: 0.0,
            dy: 0.0,
            color: Rgb::new(30.0, 0.0, 300.0),
            moved: false,
        }
    }

    /// Record a move to (`x`, `y`). The delta is scaled by 10 like a
    /// mouse drag: a few pixels of motion make a visible push.
    pub fn move_to(&mut self, x: f32, y: f32) {
        self.dx = (x - self.x) * 10.0;
        self.dy = (y - self.y) * 10.0;
        self.x = x;
        self.y = y;
        self.moved = true;
    }
}
