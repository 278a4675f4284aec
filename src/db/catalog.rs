use std::collections::{HashMap, HashSet};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{Movie, MovieId, Rating, User, UserId},
};

const USERS_FILE: &str = "u.user";
const ITEMS_FILE: &str = "u.item";
const RATINGS_FILE: &str = "u.data";

/// Read-only snapshot of the MovieLens dataset
///
/// Loaded once at startup and never mutated afterwards, so it is shared
/// between requests behind an `Arc` without any locking.
#[derive(Debug)]
pub struct Catalog {
    users: HashMap<UserId, User>,
    /// Movies in file order
    movies: Vec<Movie>,
    movie_index: HashMap<MovieId, usize>,
    ratings: Vec<Rating>,
    ratings_by_user: HashMap<UserId, Vec<usize>>,
    mean_ratings: HashMap<MovieId, f64>,
}

#[derive(Debug, Deserialize)]
struct RatingRow(UserId, MovieId, u8, i64);

#[derive(Debug, Deserialize)]
struct UserRow(UserId, u8, String, String, String);

impl Catalog {
    /// Builds a catalog from already-parsed tables
    pub fn new(users: Vec<User>, movies: Vec<Movie>, ratings: Vec<Rating>) -> Self {
        let users = users.into_iter().map(|u| (u.id, u)).collect();

        let movie_index = movies
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.id, idx))
            .collect();

        let mut ratings_by_user: HashMap<UserId, Vec<usize>> = HashMap::new();
        let mut totals: HashMap<MovieId, (u64, u64)> = HashMap::new();
        for (idx, rating) in ratings.iter().enumerate() {
            ratings_by_user.entry(rating.user_id).or_default().push(idx);
            let entry = totals.entry(rating.movie_id).or_insert((0, 0));
            entry.0 += rating.rating as u64;
            entry.1 += 1;
        }

        let mean_ratings = totals
            .into_iter()
            .map(|(movie_id, (sum, count))| (movie_id, sum as f64 / count as f64))
            .collect();

        Self {
            users,
            movies,
            movie_index,
            ratings,
            ratings_by_user,
            mean_ratings,
        }
    }

    /// Loads `u.user`, `u.item` and `u.data` from `data_dir`
    ///
    /// Any missing or malformed file aborts the load; there is no partial catalog.
    pub fn load(data_dir: &Path) -> AppResult<Self> {
        let users = load_users(&data_dir.join(USERS_FILE))?;
        let movies = load_movies(&data_dir.join(ITEMS_FILE))?;
        let ratings = load_ratings(&data_dir.join(RATINGS_FILE))?;

        let catalog = Self::new(users, movies, ratings);

        tracing::info!(
            data_dir = %data_dir.display(),
            users = catalog.users.len(),
            movies = catalog.movies.len(),
            ratings = catalog.ratings.len(),
            "Catalog loaded"
        );

        Ok(catalog)
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn movie(&self, movie_id: MovieId) -> Option<&Movie> {
        self.movie_index.get(&movie_id).map(|&idx| &self.movies[idx])
    }

    pub fn user(&self, user_id: UserId) -> Option<&User> {
        self.users.get(&user_id)
    }

    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    /// Ratings given by one user, in file order
    pub fn ratings_for_user(&self, user_id: UserId) -> impl Iterator<Item = &Rating> {
        self.ratings_by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.ratings[idx])
    }

    /// Set of movie ids the user has rated; empty for unknown users
    pub fn rated_by(&self, user_id: UserId) -> HashSet<MovieId> {
        self.ratings_for_user(user_id).map(|r| r.movie_id).collect()
    }

    /// Mean rating across all users, `None` if nobody rated the movie
    pub fn mean_rating(&self, movie_id: MovieId) -> Option<f64> {
        self.mean_ratings.get(&movie_id).copied()
    }

    /// Titles of movies the user rated at least `threshold`, in catalog order
    pub fn liked_titles(&self, user_id: UserId, threshold: u8, limit: usize) -> Vec<String> {
        let liked: HashSet<MovieId> = self
            .ratings_for_user(user_id)
            .filter(|r| r.rating >= threshold)
            .map(|r| r.movie_id)
            .collect();

        self.movies
            .iter()
            .filter(|m| liked.contains(&m.id))
            .take(limit)
            .map(|m| m.title.clone())
            .collect()
    }
}

fn catalog_error(path: &Path, err: impl std::fmt::Display) -> AppError {
    AppError::Catalog(format!("{}: {}", path.display(), err))
}

fn load_ratings(path: &Path) -> AppResult<Vec<Rating>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)
        .map_err(|e| catalog_error(path, e))?;

    reader
        .deserialize::<RatingRow>()
        .map(|row| {
            let RatingRow(user_id, movie_id, rating, timestamp) =
                row.map_err(|e| catalog_error(path, e))?;
            Ok(Rating {
                user_id,
                movie_id,
                rating,
                timestamp,
            })
        })
        .collect()
}

fn load_users(path: &Path) -> AppResult<Vec<User>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .from_path(path)
        .map_err(|e| catalog_error(path, e))?;

    reader
        .deserialize::<UserRow>()
        .map(|row| {
            let UserRow(id, age, gender, occupation, zip_code) =
                row.map_err(|e| catalog_error(path, e))?;
            Ok(User {
                id,
                age,
                gender,
                occupation,
                zip_code,
            })
        })
        .collect()
}

/// `u.item` is Latin-1 with 24 columns; only id and title are kept
fn load_movies(path: &Path) -> AppResult<Vec<Movie>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)
        .map_err(|e| catalog_error(path, e))?;

    let mut movies = Vec::new();
    let mut record = ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .map_err(|e| catalog_error(path, e))?
    {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let (Some(id), Some(title)) = (record.get(0), record.get(1)) else {
            return Err(catalog_error(path, format!("line {}: expected id and title", line)));
        };

        let id = decode_latin1(id)
            .trim()
            .parse::<MovieId>()
            .map_err(|e| catalog_error(path, format!("line {}: {}", line, e)))?;

        movies.push(Movie {
            id,
            title: decode_latin1(title),
        });
    }

    Ok(movies)
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
