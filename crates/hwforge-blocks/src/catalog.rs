use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::error::BlockError;
use crate::model::BlockDefinition;

const BUILTIN_CATALOG: &str = include_str!("../catalog/default_blocks.json");

/// Accepted on disk: a bare array of blocks or `{"blocks": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<BlockDefinition>),
    Wrapped { blocks: Vec<BlockDefinition> },
}

/// An ordered, slug-unique set of block definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockCatalog {
    blocks: Vec<BlockDefinition>,
}

impl BlockCatalog {
    /// # Errors
    ///
    /// Returns `BlockError::DuplicateSlug` or `BlockError::InvalidDefinition`
    /// when a definition is unusable.
    pub fn new(blocks: Vec<BlockDefinition>) -> Result<Self, BlockError> {
        let mut seen = HashSet::new();
        for block in &blocks {
            if !seen.insert(block.slug.as_str()) {
                return Err(BlockError::DuplicateSlug(block.slug.clone()));
            }
            if block.slug.trim().is_empty() {
                return Err(BlockError::InvalidDefinition {
                    slug: block.slug.clone(),
                    reason: "slug is empty".to_string(),
                });
            }
            if block.width_units == 0 || block.height_units == 0 {
                return Err(BlockError::InvalidDefinition {
                    slug: block.slug.clone(),
                    reason: "footprint must be at least 1x1 grid units".to_string(),
                });
            }
        }
        Ok(Self { blocks })
    }

    /// The catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded catalog is malformed.
    pub fn builtin() -> Result<Self, BlockError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    /// # Errors
    ///
    /// `BlockError::Parse` for malformed JSON, plus the checks of [`Self::new`].
    pub fn from_json_str(raw: &str) -> Result<Self, BlockError> {
        let file: CatalogFile =
            serde_json::from_str(raw).map_err(|e| BlockError::Parse(e.to_string()))?;
        let blocks = match file {
            CatalogFile::List(blocks) | CatalogFile::Wrapped { blocks } => blocks,
        };
        Self::new(blocks)
    }

    /// # Errors
    ///
    /// `BlockError::Io` if the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn from_path(path: &Path) -> Result<Self, BlockError> {
        let raw = std::fs::read_to_string(path).map_err(|source| BlockError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), blocks = catalog.len(), "Loaded block catalog");
        Ok(catalog)
    }

    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&BlockDefinition> {
        self.blocks.iter().find(|b| b.slug == slug)
    }

    /// Look up every slug, failing on the first unknown one.
    ///
    /// # Errors
    ///
    /// `BlockError::UnknownBlock` naming the missing slug.
    pub fn resolve<S: AsRef<str>>(&self, slugs: &[S]) -> Result<Vec<&BlockDefinition>, BlockError> {
        slugs
            .iter()
            .map(|slug| {
                let slug = slug.as_ref();
                self.get(slug)
                    .ok_or_else(|| BlockError::UnknownBlock(slug.to_string()))
            })
            .collect()
    }

    #[must_use]
    pub fn blocks(&self) -> &[BlockDefinition] {
        &self.blocks
    }

    #[must_use]
    pub fn into_blocks(self) -> Vec<BlockDefinition> {
        self.blocks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
