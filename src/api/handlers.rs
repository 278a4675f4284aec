use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{
        ExplanationLogEntry, FeedbackLogEntry, ModelVersion, MovieId, Recommendation,
        RecommendationLogEntry, UserId,
    },
    services::{analytics, explanations, onboarding, recommendations},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub user_id: UserId,
    pub model_version: ModelVersion,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub user_id: UserId,
    pub movie_id: MovieId,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub explanation: String,
}

#[derive(Debug, Deserialize)]
pub struct OnboardRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct OnboardResponse {
    pub input_text: String,
    pub interests: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub user_id: UserId,
    pub movie_id: MovieId,
    /// Free-form label, e.g. "like", "dislike", "neutral", "clicked"
    pub feedback: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// Comma-separated model versions, e.g. `v1,v2`
    pub model_version: Option<String>,
    /// Comma-separated user ids
    pub user_id: Option<String>,
}

// Handlers

/// Liveness marker
pub async fn root() -> Json<Value> {
    Json(json!({ "status": "API is working" }))
}

/// Picks a model variant, selects movies and logs the result
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<RecommendQuery>,
) -> AppResult<Json<RecommendResponse>> {
    let user_id = params.user_id;
    let model_version = state.variant_assignment.assign(user_id);
    let recommendations = recommendations::recommend(&state.catalog, user_id, model_version);

    state
        .logs
        .recommendations
        .append(RecommendationLogEntry::new(user_id, model_version, &recommendations))
        .await?;

    tracing::info!(
        request_id = %request_id,
        user_id,
        model_version = %model_version,
        count = recommendations.len(),
        "Served recommendations"
    );

    Ok(Json(RecommendResponse {
        user_id,
        model_version,
        recommendations,
    }))
}

/// Generates a natural-language explanation and logs it
pub async fn explain(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<ExplainQuery>,
) -> AppResult<Json<ExplainResponse>> {
    let ExplainQuery { user_id, movie_id } = params;

    let explanation =
        explanations::explain(&state.catalog, state.llm.as_ref(), user_id, movie_id).await?;

    state
        .logs
        .explanations
        .append(ExplanationLogEntry::new(user_id, movie_id, explanation.clone()))
        .await?;

    tracing::info!(
        request_id = %request_id,
        user_id,
        movie_id,
        "Served explanation"
    );

    Ok(Json(ExplainResponse {
        user_id,
        movie_id,
        explanation,
    }))
}

/// Extracts interest tags from a new user's description
pub async fn onboard(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<OnboardRequest>,
) -> Json<OnboardResponse> {
    let interests = onboarding::extract_interests(state.llm.as_ref(), &request.text).await;

    tracing::info!(
        request_id = %request_id,
        interests = interests.len(),
        "Extracted onboarding interests"
    );

    Json(OnboardResponse {
        input_text: request.text,
        interests,
    })
}

/// Records a feedback label
pub async fn feedback(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<Json<FeedbackResponse>> {
    tracing::info!(
        request_id = %request_id,
        user_id = request.user_id,
        movie_id = request.movie_id,
        feedback = %request.feedback,
        "Recording feedback"
    );

    state
        .logs
        .feedback
        .append(FeedbackLogEntry::new(
            request.user_id,
            request.movie_id,
            request.feedback,
        ))
        .await?;

    Ok(Json(FeedbackResponse {
        status: "feedback recorded",
    }))
}

/// Aggregates over the recommendation and explanation logs
pub async fn analytics_summary(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsQuery>,
) -> AppResult<Json<analytics::AnalyticsSummary>> {
    let filter = analytics::AnalyticsFilter::parse(
        params.model_version.as_deref(),
        params.user_id.as_deref(),
    )?;

    let summary = analytics::load_summary(&state.catalog, &state.logs, &filter).await?;
    Ok(Json(summary))
}
