pub mod color;
pub mod pattern;
pub mod render;
