mod macros;
#[cfg(feature = "tokio_helpers")]
mod tokio_helpers;

#[cfg(feature = "tokio_helpers")]
pub use tokio_helpers::*;

#[cfg(feature = "log")]
pub mod log;
#[cfg(feature = "log")]
pub use slog;

use std::thread::Builder;

pub fn thread_named(name: &str) -> Builder {
    Builder::new().name(name.to_string())
}

pub use ansi_term::Colour;

/// Bold, colored rendition of `text` for terminal output
pub fn paint(colour: Colour, text: String) -> String {
    colour.bold().paint(text).to_string()
}
