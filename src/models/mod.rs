use serde::{Deserialize, Serialize};
use std::fmt::Display;

mod catalog;
mod interaction;

pub use catalog::{Movie, Rating, User};
pub use interaction::{ExplanationLogEntry, FeedbackLogEntry, RecommendationLogEntry};

/// MovieLens user identifier
pub type UserId = u32;

/// MovieLens item identifier
pub type MovieId = u32;

/// Recommendation heuristic served for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVersion {
    /// Candidates ranked by mean historical rating
    V1,
    /// Seeded random sample of candidates
    V2,
}

impl ModelVersion {
    pub const ALL: [ModelVersion; 2] = [ModelVersion::V1, ModelVersion::V2];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVersion::V1 => "v1",
            ModelVersion::V2 => "v2",
        }
    }
}

impl Display for ModelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModelVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "v1" => Ok(ModelVersion::V1),
            "v2" => Ok(ModelVersion::V2),
            other => Err(format!("unknown model version '{}'", other)),
        }
    }
}

/// A single recommended movie returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub movie_id: MovieId,
    pub title: String,
}

impl From<&Movie> for Recommendation {
    fn from(movie: &Movie) -> Self {
        Self {
            movie_id: movie.id,
            title: movie.title.clone(),
        }
    }
}
