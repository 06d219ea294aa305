pub mod braille;
pub mod canvas;
pub mod font;
pub mod halfblock;

pub use canvas::{Canvas, ColorMode, RenderMode, Rgb8};
