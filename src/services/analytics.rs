use std::collections::{BTreeMap, HashMap};

use chrono::Timelike;
use serde::Serialize;

use crate::{
    db::{Catalog, InteractionLogs},
    error::{AppError, AppResult},
    models::{ExplanationLogEntry, ModelVersion, MovieId, RecommendationLogEntry, UserId},
};

const TOP_MOVIES_LIMIT: usize = 10;
const RECENT_EXPLANATIONS_LIMIT: usize = 10;
const SAMPLE_RECOMMENDATIONS_LIMIT: usize = 10;
const UNKNOWN_TITLE: &str = "Unknown Title";

/// Restricts which recommendation log rows are aggregated. Empty lists match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsFilter {
    pub model_versions: Vec<ModelVersion>,
    pub user_ids: Vec<UserId>,
}

impl AnalyticsFilter {
    /// Builds a filter from comma-separated query values such as `v1,v2` and `1,2,3`
    pub fn parse(model_versions: Option<&str>, user_ids: Option<&str>) -> AppResult<Self> {
        let model_versions = split_list(model_versions)
            .map(|v| v.parse::<ModelVersion>().map_err(AppError::InvalidInput))
            .collect::<AppResult<Vec<_>>>()?;

        let user_ids = split_list(user_ids)
            .map(|v| {
                v.parse::<UserId>()
                    .map_err(|e| AppError::InvalidInput(format!("invalid user id '{}': {}", v, e)))
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            model_versions,
            user_ids,
        })
    }

    fn matches(&self, entry: &RecommendationLogEntry) -> bool {
        (self.model_versions.is_empty() || self.model_versions.contains(&entry.model_version))
            && (self.user_ids.is_empty() || self.user_ids.contains(&entry.user_id))
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieCount {
    pub movie_id: MovieId,
    pub title: String,
    pub count: usize,
}

/// Aggregates over the interaction logs
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalyticsSummary {
    pub total_requests: usize,
    pub model_version_counts: BTreeMap<ModelVersion, usize>,
    pub top_movies: Vec<MovieCount>,
    /// Hour of day (0-23) → number of recommendation requests
    pub requests_by_hour: BTreeMap<u32, usize>,
    /// First matching recommendation rows, in log order
    pub sample_recommendations: Vec<RecommendationLogEntry>,
    pub recent_explanations: Vec<ExplanationLogEntry>,
}

/// Reads the logs and summarises them
pub async fn load_summary(
    catalog: &Catalog,
    logs: &InteractionLogs,
    filter: &AnalyticsFilter,
) -> AppResult<AnalyticsSummary> {
    let recommendations = logs.recommendations.load().await?;
    let explanations = logs.explanations.load().await?;
    Ok(summarize(catalog, &recommendations, &explanations, filter))
}

pub fn summarize(
    catalog: &Catalog,
    recommendations: &[RecommendationLogEntry],
    explanations: &[ExplanationLogEntry],
    filter: &AnalyticsFilter,
) -> AnalyticsSummary {
    let rows: Vec<&RecommendationLogEntry> =
        recommendations.iter().filter(|e| filter.matches(e)).collect();

    let mut model_version_counts = BTreeMap::new();
    let mut requests_by_hour = BTreeMap::new();
    let mut movie_counts: HashMap<MovieId, usize> = HashMap::new();

    for row in &rows {
        *model_version_counts.entry(row.model_version).or_insert(0) += 1;
        *requests_by_hour.entry(row.timestamp.hour()).or_insert(0) += 1;
        for movie_id in &row.recommendations {
            *movie_counts.entry(*movie_id).or_insert(0) += 1;
        }
    }

    let mut top_movies: Vec<MovieCount> = movie_counts
        .into_iter()
        .map(|(movie_id, count)| MovieCount {
            movie_id,
            title: catalog
                .movie(movie_id)
                .map(|m| m.title.clone())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            count,
        })
        .collect();
    top_movies.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.movie_id.cmp(&b.movie_id)));
    top_movies.truncate(TOP_MOVIES_LIMIT);

    let sample_recommendations = rows
        .iter()
        .take(SAMPLE_RECOMMENDATIONS_LIMIT)
        .map(|&row| row.clone())
        .collect();

    let skip = explanations.len().saturating_sub(RECENT_EXPLANATIONS_LIMIT);
    let recent_explanations = explanations[skip..].to_vec();

    AnalyticsSummary {
        total_requests: rows.len(),
        model_version_counts,
        top_movies,
        requests_by_hour,
        sample_recommendations,
        recent_explanations,
    }
}
