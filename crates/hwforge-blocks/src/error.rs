use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Failed to read block catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid block catalog: {0}")]
    Parse(String),

    #[error("Duplicate block slug '{0}' in catalog")]
    DuplicateSlug(String),

    #[error("Unknown block '{0}'")]
    UnknownBlock(String),

    #[error("Invalid definition for block '{slug}': {reason}")]
    InvalidDefinition { slug: String, reason: String },
}
