use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Deserialize;

use crate::{
    db::Catalog,
    models::{ModelVersion, Movie, Recommendation, UserId},
};

/// Number of movies returned per request
pub const RECOMMENDATION_COUNT: usize = 5;

/// Seed shared by every sampled list, so sampling is reproducible across calls
const SAMPLE_SEED: u64 = 42;

/// How a request is mapped onto a model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantAssignment {
    /// Fair coin flip on every request
    #[default]
    Random,
    /// Deterministic bucket derived from the user id
    Sticky,
}

impl VariantAssignment {
    pub fn assign(&self, user_id: UserId) -> ModelVersion {
        match self {
            VariantAssignment::Random => coin_flip(&mut rand::thread_rng()),
            VariantAssignment::Sticky => sticky_bucket(user_id),
        }
    }
}

/// Fixed splitmix64 finalizer, independent of the `rand` release in use
fn sticky_bucket(user_id: UserId) -> ModelVersion {
    let mut z = u64::from(user_id).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;

    if z & 1 == 0 {
        ModelVersion::V1
    } else {
        ModelVersion::V2
    }
}

fn coin_flip<R: Rng>(rng: &mut R) -> ModelVersion {
    if rng.gen_bool(0.5) {
        ModelVersion::V1
    } else {
        ModelVersion::V2
    }
}

/// Produces recommendations for `user_id` with the given variant
///
/// Candidates are the movies the user has not rated. When the user has rated
/// everything, a fixed seeded sample of the whole catalog is returned instead,
/// regardless of variant. Unknown users simply have no ratings.
pub fn recommend(catalog: &Catalog, user_id: UserId, version: ModelVersion) -> Vec<Recommendation> {
    let rated = catalog.rated_by(user_id);
    let candidates: Vec<&Movie> = catalog
        .movies()
        .iter()
        .filter(|m| !rated.contains(&m.id))
        .collect();

    let picked = if candidates.is_empty() {
        let everything: Vec<&Movie> = catalog.movies().iter().collect();
        seeded_sample(&everything, RECOMMENDATION_COUNT)
    } else {
        match version {
            ModelVersion::V1 => top_rated(catalog, &candidates, RECOMMENDATION_COUNT),
            ModelVersion::V2 => seeded_sample(&candidates, RECOMMENDATION_COUNT),
        }
    };

    tracing::debug!(
        user_id,
        model_version = %version,
        rated = rated.len(),
        candidates = candidates.len(),
        picked = picked.len(),
        "Selected recommendations"
    );

    picked.into_iter().map(Recommendation::from).collect()
}

/// Highest mean rating first. Movies nobody rated are left out; ties go to the lower id.
fn top_rated<'a>(catalog: &Catalog, candidates: &[&'a Movie], limit: usize) -> Vec<&'a Movie> {
    let mut scored: Vec<(&'a Movie, f64)> = candidates
        .iter()
        .filter_map(|&movie| catalog.mean_rating(movie.id).map(|mean| (movie, mean)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));

    scored.into_iter().take(limit).map(|(movie, _)| movie).collect()
}

fn seeded_sample<'a>(pool: &[&'a Movie], size: usize) -> Vec<&'a Movie> {
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    pool.choose_multiple(&mut rng, size.min(pool.len()))
        .copied()
        .collect()
}
