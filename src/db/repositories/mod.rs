pub mod highlights;
pub mod scores;
