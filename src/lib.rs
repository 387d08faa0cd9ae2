pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod grid;
pub mod note;
pub mod params;
pub mod processor;
pub mod render;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use document::DocumentReference;
pub use error::{EmbedError, GridField};
pub use fetch::{ByteSource, HttpByteSource};
pub use grid::AnchorRect;
pub use params::{resolve, RenderPlan};
pub use processor::{BlockKind, BlockOutput, BlockProcessor, Element};
pub use render::{Canvas, RegionRenderer};
