//! Pointer-drag lifecycle on the score canvas.
//!
//! Two states per drag cycle: `Idle` and `Dragging`. Positions are
//! canvas-local pixels. While a drag is active the machine keeps accepting
//! moves from anywhere on the document, so a fast drag that leaves the canvas
//! is still tracked.

use serde::{Deserialize, Serialize};

use super::{
    confidence::Confidence,
    geometry::{PixelRect, Point},
};

/// Drags at or below this size in either dimension are treated as clicks.
pub const DEFAULT_MIN_SELECTION_PX: f64 = 2.0;

/// Size of the overlay shown on pointer-down, before any movement.
const INITIAL_OVERLAY_PX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionConfig {
    pub min_size_px: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_size_px: DEFAULT_MIN_SELECTION_PX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionState {
    Idle,
    Dragging { anchor: Point, current: Point },
}

/// Why a finished drag did not become a highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscardReason {
    TooSmall,
    NoActiveConfidence,
    NoActiveScore,
    InvalidCoordinates,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Finalized {
    Candidate {
        rect: PixelRect,
        confidence: Confidence,
    },
    Discarded {
        rect: PixelRect,
        reason: DiscardReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEffect {
    Ignored,
    Started { overlay: PixelRect },
    Resized { overlay: PixelRect },
    Finished(Finalized),
}

#[derive(Debug, Clone)]
pub struct SelectionMachine {
    state: SelectionState,
    config: SelectionConfig,
}

impl SelectionMachine {
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            state: SelectionState::Idle,
            config,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn config(&self) -> SelectionConfig {
        self.config
    }

    pub fn set_config(&mut self, config: SelectionConfig) {
        self.config = config;
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, SelectionState::Dragging { .. })
    }

    /// Current overlay rectangle, if dragging.
    pub fn overlay(&self) -> Option<PixelRect> {
        match self.state {
            SelectionState::Idle => None,
            SelectionState::Dragging { anchor, current } if anchor == current => Some(
                PixelRect::new(anchor.x, anchor.y, INITIAL_OVERLAY_PX, INITIAL_OVERLAY_PX),
            ),
            SelectionState::Dragging { anchor, current } => {
                Some(PixelRect::from_corners(anchor, current))
            }
        }
    }

    /// Starts a drag. Ignored when highlighting is off or a drag is running.
    pub fn pointer_down(&mut self, at: Point, highlighting_enabled: bool) -> PointerEffect {
        if !highlighting_enabled || self.is_dragging() {
            return PointerEffect::Ignored;
        }

        self.state = SelectionState::Dragging {
            anchor: at,
            current: at,
        };
        match self.overlay() {
            Some(overlay) => PointerEffect::Started { overlay },
            None => PointerEffect::Ignored,
        }
    }

    pub fn pointer_move(&mut self, to: Point) -> PointerEffect {
        let SelectionState::Dragging { current, .. } = &mut self.state else {
            return PointerEffect::Ignored;
        };
        *current = to;

        match self.overlay() {
            Some(overlay) => PointerEffect::Resized { overlay },
            None => PointerEffect::Ignored,
        }
    }

    pub fn pointer_up(&mut self, at: Point, confidence: Option<Confidence>) -> PointerEffect {
        if !self.is_dragging() {
            return PointerEffect::Ignored;
        }
        self.pointer_move(at);
        self.finish(confidence)
    }

    /// Leaving the canvas mid-drag finishes at the last known position.
    pub fn pointer_leave(&mut self, confidence: Option<Confidence>) -> PointerEffect {
        self.finish(confidence)
    }

    /// Drops an active drag without producing anything. Returns whether a drag
    /// was running.
    pub fn cancel(&mut self) -> bool {
        let was_dragging = self.is_dragging();
        self.state = SelectionState::Idle;
        was_dragging
    }

    fn finish(&mut self, confidence: Option<Confidence>) -> PointerEffect {
        let SelectionState::Dragging { anchor, current } = self.state else {
            return PointerEffect::Ignored;
        };
        self.state = SelectionState::Idle;

        let rect = PixelRect::from_corners(anchor, current);
        let finalized = if !rect.exceeds(self.config.min_size_px) {
            Finalized::Discarded {
                rect,
                reason: DiscardReason::TooSmall,
            }
        } else {
            match confidence {
                Some(confidence) => Finalized::Candidate { rect, confidence },
                None => Finalized::Discarded {
                    rect,
                    reason: DiscardReason::NoActiveConfidence,
                },
            }
        };

        PointerEffect::Finished(finalized)
    }
}

impl Default for SelectionMachine {
    fn default() -> Self {
        Self::new(SelectionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn pointer_down_shows_minimal_overlay_at_anchor() {
        let mut machine = SelectionMachine::default();
        let effect = machine.pointer_down(p(50.0, 60.0), true);
        assert_eq!(
            effect,
            PointerEffect::Started {
                overlay: PixelRect::new(50.0, 60.0, 1.0, 1.0)
            }
        );
        assert!(machine.is_dragging());
    }

    #[test]
    fn pointer_down_requires_highlighting_mode() {
        let mut machine = SelectionMachine::default();
        assert_eq!(machine.pointer_down(p(1.0, 1.0), false), PointerEffect::Ignored);
        assert_eq!(machine.state(), SelectionState::Idle);
    }

    #[test]
    fn second_pointer_down_does_not_restart_drag() {
        let mut machine = SelectionMachine::default();
        machine.pointer_down(p(10.0, 10.0), true);
        assert_eq!(machine.pointer_down(p(90.0, 90.0), true), PointerEffect::Ignored);
        assert_eq!(
            machine.state(),
            SelectionState::Dragging {
                anchor: p(10.0, 10.0),
                current: p(10.0, 10.0)
            }
        );
    }

    #[test]
    fn moves_track_bounding_box_in_any_direction() {
        let mut machine = SelectionMachine::default();
        machine.pointer_down(p(150.0, 150.0), true);
        let effect = machine.pointer_move(p(50.0, 50.0));
        assert_eq!(
            effect,
            PointerEffect::Resized {
                overlay: PixelRect::new(50.0, 50.0, 100.0, 100.0)
            }
        );
    }

    #[test]
    fn moves_outside_canvas_are_still_tracked() {
        let mut machine = SelectionMachine::default();
        machine.pointer_down(p(280.0, 280.0), true);
        machine.pointer_move(p(340.0, 320.0));
        assert_eq!(
            machine.overlay(),
            Some(PixelRect::new(280.0, 280.0, 60.0, 40.0))
        );
    }

    #[test]
    fn move_while_idle_is_ignored() {
        let mut machine = SelectionMachine::default();
        assert_eq!(machine.pointer_move(p(5.0, 5.0)), PointerEffect::Ignored);
        assert_eq!(machine.pointer_up(p(5.0, 5.0), Some(Confidence::High)), PointerEffect::Ignored);
    }

    #[test]
    fn large_drag_with_confidence_becomes_candidate() {
        let mut machine = SelectionMachine::default();
        machine.pointer_down(p(50.0, 50.0), true);
        let effect = machine.pointer_up(p(150.0, 150.0), Some(Confidence::High));
        assert_eq!(
            effect,
            PointerEffect::Finished(Finalized::Candidate {
                rect: PixelRect::new(50.0, 50.0, 100.0, 100.0),
                confidence: Confidence::High,
            })
        );
        assert!(!machine.is_dragging());
    }

    #[test]
    fn small_drags_are_discarded_even_with_confidence() {
        for end in [p(52.0, 51.0), p(52.0, 52.0), p(48.0, 49.0), p(150.0, 52.0)] {
            let mut machine = SelectionMachine::default();
            machine.pointer_down(p(50.0, 50.0), true);
            match machine.pointer_up(end, Some(Confidence::Low)) {
                PointerEffect::Finished(Finalized::Discarded { reason, .. }) => {
                    assert_eq!(reason, DiscardReason::TooSmall)
                }
                other => panic!("unexpected effect {other:?}"),
            }
        }
    }

    #[test]
    fn missing_confidence_discards_large_drag() {
        let mut machine = SelectionMachine::default();
        machine.pointer_down(p(50.0, 50.0), true);
        match machine.pointer_up(p(150.0, 150.0), None) {
            PointerEffect::Finished(Finalized::Discarded { reason, .. }) => {
                assert_eq!(reason, DiscardReason::NoActiveConfidence)
            }
            other => panic!("unexpected effect {other:?}"),
        }
        assert!(!machine.is_dragging());
    }

    #[test]
    fn leave_finishes_at_last_known_position() {
        let mut machine = SelectionMachine::default();
        machine.pointer_down(p(10.0, 10.0), true);
        machine.pointer_move(p(60.0, 40.0));
        assert_eq!(
            machine.pointer_leave(Some(Confidence::Medium)),
            PointerEffect::Finished(Finalized::Candidate {
                rect: PixelRect::new(10.0, 10.0, 50.0, 30.0),
                confidence: Confidence::Medium,
            })
        );
        assert_eq!(machine.pointer_leave(Some(Confidence::Medium)), PointerEffect::Ignored);
    }

    #[test]
    fn threshold_is_configurable() {
        let mut machine = SelectionMachine::new(SelectionConfig { min_size_px: 20.0 });
        machine.pointer_down(p(0.0, 0.0), true);
        assert!(matches!(
            machine.pointer_up(p(15.0, 15.0), Some(Confidence::High)),
            PointerEffect::Finished(Finalized::Discarded {
                reason: DiscardReason::TooSmall,
                ..
            })
        ));
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut machine = SelectionMachine::default();
        assert!(!machine.cancel());
        machine.pointer_down(p(1.0, 1.0), true);
        assert!(machine.cancel());
        assert_eq!(machine.overlay(), None);
    }
}
