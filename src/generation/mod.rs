//! Post generation pipeline.
//!
//! A request is turned into one prompt, which is tried against each
//! candidate model in order until one yields a title and a body. The result
//! is scored, stored and returned to the dashboard.

mod gemini;
pub mod virality;

pub use gemini::{GeminiClient, Generation, GeneratorError, TextGenerator};

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::constants::GENERATION_COST_ESTIMATE;
use crate::db::{best_effort, insert_generated_post, insert_usage_log, Database, NewGeneratedPost, NewUsageLog};
use virality::EngagementTier;

/// Body of a generate request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub topic: String,
    pub tone: Option<String>,
    pub content_type: Option<String>,
    pub subreddit_hint: Option<String>,
    pub media_choice: Option<String>,
    /// Pin generation to a single model instead of the fallback list.
    pub model: Option<String>,
    #[serde(default)]
    pub niches: Vec<String>,
    /// Desired virality, 0-100.
    pub target_virality: Option<u8>,
}

/// A generated post as returned to the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPost {
    pub id: String,
    pub title: String,
    pub content: String,
    pub virality_score: f64,
    pub estimated_views: String,
    pub engagement: String,
    pub media_recommendation: Option<String>,
    pub tags: Vec<String>,
    pub token_usage: u64,
    pub cost_estimate: String,
    pub model: String,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0} not configured")]
    NotConfigured(&'static str),
    #[error("no generation models configured")]
    NoCandidates,
    #[error("all {attempts} generation models failed; last error: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: GeneratorError,
    },
}

/// Generates, scores and stores posts.
pub struct GenerationService {
    generator: Arc<dyn TextGenerator>,
    models: Vec<String>,
    db: Database,
    rng: Mutex<StdRng>,
}

impl GenerationService {
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, models: Vec<String>, db: Database) -> Self {
        Self {
            generator,
            models,
            db,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the score jitter source, for reproducible scores.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Models to try for `request`, in order.
    #[must_use]
    pub fn candidates<'a>(&'a self, request: &'a GenerateRequest) -> Vec<&'a str> {
        match request.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            Some(model) => vec![model],
            None => self.models.iter().map(String::as_str).collect(),
        }
    }

    /// Run the pipeline for one request.
    ///
    /// # Errors
    ///
    /// Fails on an invalid request, a missing API key, or when every
    /// candidate model fails; never returns placeholder text.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedPost, GenerationError> {
        validate(request)?;

        let prompt = build_prompt(request);
        let candidates = self.candidates(request);
        let mut last_error = None;

        for model in &candidates {
            let error = match self.generator.generate(model, &prompt).await {
                Ok(generation) => match split_title_body(&generation.text) {
                    Some((title, content)) => {
                        return Ok(self.finish(request, model, &generation, title, content).await);
                    }
                    None => GeneratorError::Empty,
                },
                Err(GeneratorError::NotConfigured(what)) => {
                    return Err(GenerationError::NotConfigured(what));
                }
                Err(e) => e,
            };
            warn!(model = %model, "Generation candidate failed: {error}");
            last_error = Some(error);
        }

        let last = last_error.ok_or(GenerationError::NoCandidates)?;
        Err(GenerationError::Exhausted {
            attempts: candidates.len(),
            last,
        })
    }

    async fn finish(
        &self,
        request: &GenerateRequest,
        model: &str,
        generation: &Generation,
        title: String,
        content: String,
    ) -> GeneratedPost {
        let topic = request.topic.trim();
        let jitter = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            virality::sample_jitter(&mut *rng)
        };
        let score = virality::score(&title, &content, topic, jitter);
        let tier = EngagementTier::from_score(score);
        let media_rec = media_recommendation(
            topic,
            request.media_choice.as_deref().or(request.content_type.as_deref()),
        );
        let token_usage = generation
            .total_tokens
            .unwrap_or((generation.text.len() / 4) as u64);

        let id = uuid::Uuid::new_v4().to_string();
        let record = NewGeneratedPost {
            id: id.clone(),
            title: title.clone(),
            body: content.clone(),
            topic: topic.to_string(),
            tone: request.tone.clone(),
            content_type: request.content_type.clone(),
            subreddit_hint: request.subreddit_hint.clone(),
            niches: request.niches.clone(),
            model: model.to_string(),
            virality_score: score,
            predicted_engagement: tier.estimated_views().to_string(),
            media_rec: media_rec.clone(),
        };
        best_effort(
            "save generated post",
            insert_generated_post(self.db.pool(), &record).await,
        );

        info!(
            post_id = %id,
            model = %model,
            tokens = token_usage,
            cost = GENERATION_COST_ESTIMATE,
            "Generated post"
        );
        let usage = NewUsageLog {
            api_type: "gemini".to_string(),
            model: model.to_string(),
            tokens_used: i64::try_from(token_usage).unwrap_or(i64::MAX),
            cost_estimate: GENERATION_COST_ESTIMATE,
        };
        best_effort("log usage", insert_usage_log(self.db.pool(), &usage).await);

        GeneratedPost {
            id,
            title,
            content,
            virality_score: virality::round_score(score),
            estimated_views: tier.estimated_views().to_string(),
            engagement: tier.label().to_string(),
            media_recommendation: media_rec,
            tags: vec!["ai-generated".to_string(), slugify(topic)],
            token_usage,
            cost_estimate: format!("${GENERATION_COST_ESTIMATE:.2}"),
            model: model.to_string(),
        }
    }
}

fn validate(request: &GenerateRequest) -> Result<(), GenerationError> {
    if request.topic.trim().is_empty() {
        return Err(GenerationError::InvalidRequest("topic is required".to_string()));
    }
    if request.target_virality.is_some_and(|v| v > 100) {
        return Err(GenerationError::InvalidRequest(
            "target_virality must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// Instruction block sent to every candidate model.
#[must_use]
pub fn build_prompt(request: &GenerateRequest) -> String {
    let mut prompt = format!(
        "Create a viral Reddit post about \"{}\".\n\nInstructions:\n",
        request.topic.trim()
    );
    let _ = writeln!(
        prompt,
        "- Target subreddit: {}",
        request.subreddit_hint.as_deref().unwrap_or("general")
    );
    let _ = writeln!(prompt, "- Tone: {}", request.tone.as_deref().unwrap_or("engaging"));
    let _ = writeln!(
        prompt,
        "- Content type: {}",
        request.content_type.as_deref().unwrap_or("text")
    );
    if !request.niches.is_empty() {
        let _ = writeln!(prompt, "- Audience niches: {}", request.niches.join(", "));
    }
    if let Some(target) = request.target_virality {
        let _ = writeln!(prompt, "- Target virality: {target}/100");
    }
    prompt.push_str(
        "- Make it compelling, authentic, and likely to get high engagement\n\
         - Include a catchy title and detailed body\n\
         - Add strategic hooks and emotional triggers\n\
         - Format: Title on first line, then body content\n\n\
         Generate ONLY the post content, no explanations.",
    );
    prompt
}

/// Split model output into a title (first non-blank line, heading markers
/// removed) and a body. `None` if either part is empty.
#[must_use]
pub fn split_title_body(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let title = first.trim().trim_start_matches('#').trim();
    let body = rest.trim();
    if title.is_empty() || body.is_empty() {
        return None;
    }
    Some((title.to_string(), body.to_string()))
}

/// Suggestion attached to image and video posts.
#[must_use]
pub fn media_recommendation(topic: &str, media: Option<&str>) -> Option<String> {
    match media.map(str::to_lowercase).as_deref() {
        Some("image") => Some(format!(
            "Create an infographic about {topic} with key statistics and visual elements"
        )),
        Some("video") => Some(format!(
            "Short video demonstrating {topic} concepts with engaging visuals"
        )),
        _ => None,
    }
}

/// Lowercase, whitespace runs collapsed to `-`.
#[must_use]
pub fn slugify(topic: &str) -> String {
    topic
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_title_body() {
        assert_eq!(
            split_title_body("Great Title\nGreat body text here?"),
            Some(("Great Title".to_string(), "Great body text here?".to_string()))
        );
        assert_eq!(
            split_title_body("## My Title\n\nLine one\nLine two\n"),
            Some(("My Title".to_string(), "Line one\nLine two".to_string()))
        );
        assert_eq!(split_title_body("\n\n# Title\r\nBody"), Some(("Title".to_string(), "Body".to_string())));
    }

    #[test]
    fn test_split_title_body_rejects_incomplete() {
        assert_eq!(split_title_body(""), None);
        assert_eq!(split_title_body("Only a title"), None);
        assert_eq!(split_title_body("###\nBody"), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("AI tools"), "ai-tools");
        assert_eq!(slugify("  Remote   Work\tTips "), "remote-work-tips");
    }

    #[test]
    fn test_media_recommendation() {
        assert!(media_recommendation("cats", Some("image")).unwrap().contains("infographic about cats"));
        assert!(media_recommendation("cats", Some("Video")).unwrap().starts_with("Short video"));
        assert_eq!(media_recommendation("cats", Some("text")), None);
        assert_eq!(media_recommendation("cats", None), None);
    }

    #[test]
    fn test_prompt_embeds_request() {
        let request = GenerateRequest {
            topic: "AI tools".to_string(),
            tone: Some("witty".to_string()),
            subreddit_hint: Some("productivity".to_string()),
            niches: vec!["devs".to_string(), "students".to_string()],
            target_virality: Some(80),
            ..GenerateRequest::default()
        };
        let prompt = build_prompt(&request);
        assert!(prompt.contains("\"AI tools\""));
        assert!(prompt.contains("Tone: witty"));
        assert!(prompt.contains("Target subreddit: productivity"));
        assert!(prompt.contains("Content type: text"));
        assert!(prompt.contains("devs, students"));
        assert!(prompt.contains("80/100"));
    }

    #[test]
    fn test_validate() {
        assert!(validate(&GenerateRequest::default()).is_err());
        let request = GenerateRequest {
            topic: "x".to_string(),
            target_virality: Some(101),
            ..GenerateRequest::default()
        };
        assert!(validate(&request).is_err());
    }
}
