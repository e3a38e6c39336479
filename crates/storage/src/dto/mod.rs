pub mod common;
pub mod score;
