//! Gesture-to-intent translation.
//!
//! Consumes a typed pointer-event stream and emits discrete
//! [`LayoutIntent`]s. Drag and resize updates stay local until the commit;
//! a whole gesture costs exactly one remote call no matter how fast the
//! pointer samples.

use shared::domain::{LayerId, Position, Size};

pub const DEFAULT_MIN_LAYER_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Move,
    Resize,
}

/// Pointer-down carries the grabbed layer's current geometry and lock
/// state; the translator never looks layers up itself.
#[derive(Debug, Clone, Copy)]
pub struct PointerDown {
    pub layer: LayerId,
    pub kind: GestureKind,
    pub pointer_x: i32,
    pub pointer_y: i32,
    pub origin: Position,
    pub size: Size,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum PointerEvent {
    Down(PointerDown),
    Moved { x: i32, y: i32 },
    Up,
}

/// Discrete intents handed to the session. `DragTo`/`ResizeTo` mutate the
/// local view only; `CommitGesture` triggers the single remote update.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutIntent {
    BeginGesture { layer: LayerId },
    DragTo { layer: LayerId, position: Position },
    ResizeTo { layer: LayerId, size: Size },
    CommitGesture { layer: LayerId },
    /// Keyboard nudge: a discrete move relative to the layer's current
    /// position, clamped by the reconciler.
    NudgeBy { layer: LayerId, dx: i32, dy: i32 },
}

pub fn clamp_position(position: Position) -> Position {
    Position::new(position.x.max(0), position.y.max(0))
}

pub fn clamp_size(size: Size, min: u32) -> Size {
    let min = min.max(1);
    Size::new(size.width.max(min), size.height.max(min))
}

#[derive(Debug, Clone, Copy)]
struct ActiveGesture {
    layer: LayerId,
    kind: GestureKind,
    start_x: i32,
    start_y: i32,
    origin: Position,
    size: Size,
}

/// State machine guaranteeing exactly one begin/end pair per continuous
/// gesture, with coordinates clamped before they reach the reconciler.
pub struct GestureTranslator {
    min_size: u32,
    active: Option<ActiveGesture>,
}

impl GestureTranslator {
    pub fn new(min_size: u32) -> Self {
        Self {
            min_size: min_size.max(1),
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn handle(&mut self, event: PointerEvent) -> Vec<LayoutIntent> {
        match event {
            PointerEvent::Down(down) => {
                // A second press mid-gesture would break the one-pair
                // guarantee; a locked layer never starts one.
                if self.active.is_some() || down.locked {
                    return Vec::new();
                }
                self.active = Some(ActiveGesture {
                    layer: down.layer,
                    kind: down.kind,
                    start_x: down.pointer_x,
                    start_y: down.pointer_y,
                    origin: down.origin,
                    size: down.size,
                });
                vec![LayoutIntent::BeginGesture { layer: down.layer }]
            }
            PointerEvent::Moved { x, y } => {
                let Some(gesture) = self.active else {
                    return Vec::new();
                };
                let dx = x - gesture.start_x;
                let dy = y - gesture.start_y;
                match gesture.kind {
                    GestureKind::Move => vec![LayoutIntent::DragTo {
                        layer: gesture.layer,
                        position: clamp_position(Position::new(
                            gesture.origin.x + dx,
                            gesture.origin.y + dy,
                        )),
                    }],
                    GestureKind::Resize => {
                        let width =
                            (i64::from(gesture.size.width) + i64::from(dx)).clamp(0, u32::MAX as i64);
                        let height =
                            (i64::from(gesture.size.height) + i64::from(dy)).clamp(0, u32::MAX as i64);
                        vec![LayoutIntent::ResizeTo {
                            layer: gesture.layer,
                            size: clamp_size(Size::new(width as u32, height as u32), self.min_size),
                        }]
                    }
                }
            }
            PointerEvent::Up => match self.active.take() {
                Some(gesture) => vec![LayoutIntent::CommitGesture {
                    layer: gesture.layer,
                }],
                None => Vec::new(),
            },
        }
    }

    /// Arrow-key nudges bypass the gesture bracket: each one is a
    /// discrete, clamped move with its own remote call.
    pub fn nudge(layer: LayerId, dx: i32, dy: i32) -> LayoutIntent {
        LayoutIntent::NudgeBy { layer, dx, dy }
    }
}

#[cfg(test)]
#[path = "tests/gesture_tests.rs"]
mod tests;
