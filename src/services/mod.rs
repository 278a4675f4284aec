pub mod analytics;
pub mod explanations;
pub mod onboarding;
pub mod providers;
pub mod recommendations;

pub use providers::{GroqProvider, LlmProvider};
pub use recommendations::VariantAssignment;
