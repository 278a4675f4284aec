use serde::{Deserialize, Serialize};

use super::{MovieId, UserId};

/// A MovieLens user with demographic fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub age: u8,
    pub gender: String,
    pub occupation: String,
    pub zip_code: String,
}

/// A movie in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
}

/// One historical rating event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    /// 1 to 5 stars
    pub rating: u8,
    /// Unix seconds
    pub timestamp: i64,
}
