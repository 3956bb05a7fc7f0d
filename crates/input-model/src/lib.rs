use serde::{Deserialize, Serialize};

/// Pointer position and button state for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub primary_down: bool,
    pub secondary_down: bool,
}

impl PointerState {
    pub fn at(x: f32, y: f32) -> Self {
        Self { x, y, primary_down: false, secondary_down: false }
    }

    pub fn with_primary_down(mut self, down: bool) -> Self {
        self.primary_down = down;
        self
    }

    pub fn with_secondary_down(mut self, down: bool) -> Self {
        self.secondary_down = down;
        self
    }
}

/// Transient input state as sampled by the UI layer: the current pointer,
/// whether it is over the canvas, and the values it held on the previous
/// frame.
///
/// The UI calls [`InputState::rollover`] once per frame so the previous-frame
/// fields always lag the current ones by exactly one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputState {
    pub pointer: PointerState,
    pub in_canvas: bool,
    pub prev_pointer: PointerState,
    pub prev_in_canvas: bool,
}

impl InputState {
    /// Shift the current values into the previous-frame fields and install
    /// the newly sampled ones.
    pub fn rollover(&mut self, pointer: PointerState, in_canvas: bool) {
        self.prev_pointer = self.pointer;
        self.prev_in_canvas = self.in_canvas;
        self.pointer = pointer;
        self.in_canvas = in_canvas;
    }

    /// True if the primary button went down this frame.
    pub fn primary_pressed(&self) -> bool {
        self.pointer.primary_down && !self.prev_pointer.primary_down
    }

    /// True if the primary button went up this frame.
    pub fn primary_released(&self) -> bool {
        !self.pointer.primary_down && self.prev_pointer.primary_down
    }
}
