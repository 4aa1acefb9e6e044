use axum::{
    Json,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use cs_common::COMPANY_NAME_COLUMN;
use cs_common::extraction::extract_column;
use cs_common::files::ExpectedFile;
use cs_common::named_texts::NamedTexts;
use cs_common::similarity::{SimilarityResult, cosine, rank};

use crate::SharedState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct FileTextsRequest {
    #[serde(default)]
    pub file_texts: NamedTexts,
}

#[derive(Debug, Serialize)]
pub struct FileComparison {
    pub file1: &'static str,
    pub file2: &'static str,
    pub companies_in_file1: Vec<String>,
    pub companies_in_file2: Vec<String>,
    pub similarity_score: f64,
}

/// `POST /calculate_similarity`.
///
/// An empty body compares the two uploaded spreadsheets; a JSON body with
/// `file_texts` ranks each text against the reference companies.
pub async fn calculate_similarity(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        let comparison = compare_uploaded_files(&state).await?;
        return Ok(Json(comparison).into_response());
    }

    let request: FileTextsRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::Validation(format!("Invalid JSON body: {err}")))?;
    let ranked = rank_file_texts(&state, &request.file_texts).await?;
    Ok(Json(ranked).into_response())
}

async fn fetch(state: &SharedState, file: ExpectedFile) -> Result<Vec<u8>, ApiError> {
    let container = file.container(&state.config.containers);
    state
        .blob_store
        .get(container, file.file_name())
        .await
        .map_err(|err| {
            ApiError::Storage(format!(
                "Error fetching file {} from {container}: {err}",
                file.file_name()
            ))
        })
}

pub async fn compare_uploaded_files(state: &SharedState) -> Result<FileComparison, ApiError> {
    let first = ExpectedFile::CompaniesInMilwaukee;
    let second = ExpectedFile::AffiliatedPrograms;

    let (first_bytes, second_bytes) = tokio::try_join!(fetch(state, first), fetch(state, second))?;

    let companies_in_file1 = extract_column(&first_bytes, COMPANY_NAME_COLUMN)?;
    let companies_in_file2 = extract_column(&second_bytes, COMPANY_NAME_COLUMN)?;
    if companies_in_file1.is_empty() || companies_in_file2.is_empty() {
        return Err(ApiError::Validation(
            "No company names found in one or both files".into(),
        ));
    }

    let first_vector = state.embedder.embed(&companies_in_file1.join(", ")).await?;
    let second_vector = state.embedder.embed(&companies_in_file2.join(", ")).await?;
    let similarity_score = cosine(&first_vector, &second_vector)?;

    info!(
        companies_in_file1 = companies_in_file1.len(),
        companies_in_file2 = companies_in_file2.len(),
        similarity_score,
        "compared uploaded files"
    );

    Ok(FileComparison {
        file1: first.file_name(),
        file2: second.file_name(),
        companies_in_file1,
        companies_in_file2,
        similarity_score,
    })
}

pub async fn rank_file_texts(
    state: &SharedState,
    file_texts: &NamedTexts,
) -> Result<Vec<SimilarityResult>, ApiError> {
    if file_texts.is_empty() {
        return Err(ApiError::Validation("No file texts provided".into()));
    }

    let mut subjects = Vec::with_capacity(file_texts.len());
    for (name, text) in file_texts.iter() {
        let vector = state.embedder.embed(text).await?;
        subjects.push((name.to_string(), vector));
    }

    let ranked = rank(&subjects, state.references.as_slice())?;
    info!(files = ranked.len(), "ranked file texts against reference companies");
    Ok(ranked)
}
