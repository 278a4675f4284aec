use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{ModelVersion, MovieId, Recommendation, UserId};

/// Row of `ab_log.csv`: which variant served which movies to whom
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationLogEntry {
    pub timestamp: NaiveDateTime,
    pub user_id: UserId,
    pub model_version: ModelVersion,
    /// Movie ids in served order, stored as a `;`-joined column
    #[serde(with = "semicolon_list")]
    pub recommendations: Vec<MovieId>,
}

impl RecommendationLogEntry {
    pub fn new(user_id: UserId, model_version: ModelVersion, recs: &[Recommendation]) -> Self {
        Self {
            timestamp: now(),
            user_id,
            model_version,
            recommendations: recs.iter().map(|r| r.movie_id).collect(),
        }
    }
}

/// Row of `explanation_log.csv`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExplanationLogEntry {
    pub timestamp: NaiveDateTime,
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub explanation: String,
}

impl ExplanationLogEntry {
    pub fn new(user_id: UserId, movie_id: MovieId, explanation: String) -> Self {
        Self {
            timestamp: now(),
            user_id,
            movie_id,
            explanation,
        }
    }
}

/// Row of `feedback_log.csv`. The label is free-form ("like", "clicked", ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackLogEntry {
    pub timestamp: NaiveDateTime,
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub feedback: String,
}

impl FeedbackLogEntry {
    pub fn new(user_id: UserId, movie_id: MovieId, feedback: String) -> Self {
        Self {
            timestamp: now(),
            user_id,
            movie_id,
            feedback,
        }
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

mod semicolon_list {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::models::MovieId;

    pub fn serialize<S: Serializer>(ids: &[MovieId], serializer: S) -> Result<S::Ok, S::Error> {
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(";");
        serializer.serialize_str(&joined)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<MovieId>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<MovieId>().map_err(D::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_entry_csv_row() {
        let recs = vec![
            Recommendation {
                movie_id: 1,
                title: "Toy Story (1995)".to_string(),
            },
            Recommendation {
                movie_id: 50,
                title: "Star Wars (1977)".to_string(),
            },
        ];
        let mut entry = RecommendationLogEntry::new(7, ModelVersion::V2, &recs);
        entry.timestamp = NaiveDateTime::parse_from_str("2024-03-01T09:15:00", "%Y-%m-%dT%H:%M:%S").unwrap();

        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(&entry).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        assert_eq!(
            text,
            "timestamp,user_id,model_version,recommendations\n2024-03-01T09:15:00,7,v2,1;50\n"
        );
    }

    #[test]
    fn test_recommendation_entry_reads_empty_list() {
        let data = "timestamp,user_id,model_version,recommendations\n2024-03-01T09:15:00.250,3,v1,\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let entry: RecommendationLogEntry = reader.deserialize().next().unwrap().unwrap();

        assert_eq!(entry.user_id, 3);
        assert_eq!(entry.model_version, ModelVersion::V1);
        assert!(entry.recommendations.is_empty());
    }

    #[test]
    fn test_explanation_with_commas_and_newlines_is_quoted() {
        let entry = ExplanationLogEntry::new(1, 2, "Gritty, tense,\nand clever".to_string());

        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(&entry).unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let back: ExplanationLogEntry = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(back.explanation, "Gritty, tense,\nand clever");
    }
}
