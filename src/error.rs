use thiserror::Error;

/// Everything that can stop a block from rendering.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Block JSON is malformed, a field has the wrong shape, or no identity
    /// field was given.
    #[error("{0}")]
    Config(String),

    /// A note or PDF URL did not split into an id/name pair.
    #[error("{0}")]
    Reference(String),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to open document: {0}")]
    DocumentOpen(String),

    #[error("Failed to render page {page}: {reason}")]
    PageRender { page: u32, reason: String },

    /// Anchor-grid value outside [1, 20].
    #[error("Invalid {field}")]
    Validation { field: GridField },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridField {
    Anchor,
    Width,
    Height,
}

impl std::fmt::Display for GridField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GridField::Anchor => "Anchor",
            GridField::Width => "Width",
            GridField::Height => "Height",
        };
        f.write_str(name)
    }
}

impl From<serde_json::Error> for EmbedError {
    fn from(e: serde_json::Error) -> Self {
        EmbedError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EmbedError>;
