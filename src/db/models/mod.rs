pub mod highlight;
pub mod score;

pub use highlight::{Highlight, HighlightId, HighlightPatch, NewHighlight, ScoreId};
pub use score::{ScoreInput, ScoreRecord};
