mod image;
mod lyrics;

pub use image::ImageGenerator;
pub use lyrics::{AnthropicWriter, LyricsGenerator, LyricsWriter};
