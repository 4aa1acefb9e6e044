//! Reference companies every uploaded text is compared against.
//!
//! The catalog is fixed for the life of the process: it is embedded once by
//! [`initialize`] before the server starts and only read afterwards.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::embedding::{Embedder, EmbeddingError};
use crate::named_texts::NamedTexts;

const BUILTIN: [(&str, &str); 3] = [
    (
        "american_family_insurance",
        "American Family Insurance, commonly known as AmFam, is a leading mutual insurance company headquartered in Madison, Wisconsin...",
    ),
    (
        "verizon",
        "Verizon Communications Inc. is a leading global provider of telecommunications, technology, and media services...",
    ),
    (
        "rockwell",
        "Rockwell Automation is a leading global provider of industrial automation and digital transformation solutions...",
    ),
];

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read reference companies from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("reference companies file is not a JSON object of name to description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reference company catalog is empty")]
    Empty,
    #[error("failed to embed reference company {name}: {source}")]
    Embedding {
        name: String,
        #[source]
        source: EmbeddingError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceCompany {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceCatalog {
    companies: Vec<ReferenceCompany>,
}

impl ReferenceCatalog {
    pub fn builtin() -> Self {
        Self {
            companies: BUILTIN
                .iter()
                .map(|(name, description)| ReferenceCompany {
                    name: name.to_string(),
                    description: description.to_string(),
                })
                .collect(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ReferenceError> {
        let texts: NamedTexts = serde_json::from_str(raw)?;
        if texts.is_empty() {
            return Err(ReferenceError::Empty);
        }

        Ok(Self {
            companies: texts
                .iter()
                .map(|(name, description)| ReferenceCompany {
                    name: name.to_string(),
                    description: description.to_string(),
                })
                .collect(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ReferenceError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn companies(&self) -> &[ReferenceCompany] {
        &self.companies
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEmbedding {
    pub name: String,
    pub vector: Vec<f32>,
}

/// Embedded catalog, in catalog order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceEmbeddings(Vec<ReferenceEmbedding>);

impl ReferenceEmbeddings {
    pub fn new(embeddings: Vec<ReferenceEmbedding>) -> Self {
        Self(embeddings)
    }

    pub fn as_slice(&self) -> &[ReferenceEmbedding] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Embed every catalog entry. Any failure aborts; there is no partial table.
pub async fn initialize(
    catalog: &ReferenceCatalog,
    embedder: &dyn Embedder,
) -> Result<ReferenceEmbeddings, ReferenceError> {
    let mut embeddings = Vec::with_capacity(catalog.companies().len());
    for company in catalog.companies() {
        let vector = embedder
            .embed(&company.description)
            .await
            .map_err(|source| ReferenceError::Embedding {
                name: company.name.clone(),
                source,
            })?;
        embeddings.push(ReferenceEmbedding {
            name: company.name.clone(),
            vector,
        });
    }

    info!(count = embeddings.len(), "reference embeddings ready");
    Ok(ReferenceEmbeddings(embeddings))
}
