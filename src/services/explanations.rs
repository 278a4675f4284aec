use crate::{
    db::Catalog,
    error::{AppError, AppResult},
    models::{MovieId, UserId},
    services::providers::LlmProvider,
};

/// Ratings at or above this count as "liked"
const LIKED_THRESHOLD: u8 = 4;

/// Maximum number of liked titles put into the prompt
const LIKED_TITLES_LIMIT: usize = 5;

/// Canned explanation used whenever the remote call fails
pub fn fallback_sentence(err: &AppError) -> String {
    format!(
        "Because you enjoyed movies like ... we think you'll love this one! (LLM fallback: {})",
        err
    )
}

/// Asks the provider for a completion, substituting the fallback sentence on failure
///
/// This never fails: transport errors, bad statuses and malformed replies
/// all become text.
pub async fn complete_or_fallback(llm: &dyn LlmProvider, prompt: &str) -> String {
    match llm.complete(prompt).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(provider = llm.name(), error = %e, "Using fallback text");
            fallback_sentence(&e)
        }
    }
}

pub fn build_prompt(liked_titles: &[String], movie_title: &str) -> String {
    format!(
        "User recently liked: {}.\nRecommended movie: {}.\n\
         Write a one-line, human explanation for why this recommendation makes sense.",
        liked_titles.join(", "),
        movie_title
    )
}

/// Explains why `movie_id` suits `user_id`
///
/// Only an unknown movie id is an error; provider failures yield the fallback sentence.
pub async fn explain(
    catalog: &Catalog,
    llm: &dyn LlmProvider,
    user_id: UserId,
    movie_id: MovieId,
) -> AppResult<String> {
    let movie = catalog
        .movie(movie_id)
        .ok_or_else(|| AppError::NotFound(format!("Movie {} is not in the catalog", movie_id)))?;

    let liked = catalog.liked_titles(user_id, LIKED_THRESHOLD, LIKED_TITLES_LIMIT);
    let prompt = build_prompt(&liked, &movie.title);

    tracing::debug!(user_id, movie_id, liked = liked.len(), "Built explanation prompt");

    Ok(complete_or_fallback(llm, &prompt).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Movie, Rating};
    use crate::services::providers::MockLlmProvider;
    use mockall::predicate::*;

    fn catalog() -> Catalog {
        let movies = vec![
            Movie { id: 1, title: "Toy Story (1995)".to_string() },
            Movie { id: 2, title: "Heat (1995)".to_string() },
            Movie { id: 3, title: "Twelve Monkeys (1995)".to_string() },
        ];
        let ratings = vec![
            Rating { user_id: 9, movie_id: 3, rating: 5, timestamp: 0 },
            Rating { user_id: 9, movie_id: 1, rating: 4, timestamp: 0 },
            Rating { user_id: 9, movie_id: 2, rating: 2, timestamp: 0 },
        ];
        Catalog::new(vec![], movies, ratings)
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt(
            &["Toy Story (1995)".to_string(), "Twelve Monkeys (1995)".to_string()],
            "Heat (1995)",
        );
        assert_eq!(
            prompt,
            "User recently liked: Toy Story (1995), Twelve Monkeys (1995).\n\
             Recommended movie: Heat (1995).\n\
             Write a one-line, human explanation for why this recommendation makes sense."
        );
    }

    #[tokio::test]
    async fn test_explain_passes_model_text_through() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .with(eq(build_prompt(
                &["Toy Story (1995)".to_string(), "Twelve Monkeys (1995)".to_string()],
                "Heat (1995)",
            )))
            .times(1)
            .returning(|_| Ok("You like tense stories; Heat delivers.".to_string()));

        let text = explain(&catalog(), &llm, 9, 2).await.unwrap();
        assert_eq!(text, "You like tense stories; Heat delivers.");
    }

    #[tokio::test]
    async fn test_explain_falls_back_on_provider_error() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .returning(|_| Err(AppError::ExternalApi("Groq API returned status 401".to_string())));
        llm.expect_name().return_const("mock");

        let text = explain(&catalog(), &llm, 9, 2).await.unwrap();
        assert!(text.starts_with("Because you enjoyed movies like ... we think you'll love this one!"));
        assert!(text.contains("Groq API returned status 401"));
    }

    #[tokio::test]
    async fn test_explain_unknown_movie_is_not_found() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().never();

        let result = explain(&catalog(), &llm, 9, 404).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_explain_user_without_history_gets_empty_liked_list() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .withf(|prompt: &str| prompt.starts_with("User recently liked: .\n"))
            .returning(|_| Ok("ok".to_string()));

        assert_eq!(explain(&catalog(), &llm, 12345, 1).await.unwrap(), "ok");
    }
}
