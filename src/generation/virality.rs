//! Heuristic virality estimate for a generated post.

use rand::Rng;

/// Upper bound (exclusive) of the random jitter added to every score.
pub const MAX_JITTER: f64 = 3.0;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

/// Score a post from its shape plus `jitter`, clamped to `[1, 10]`.
#[must_use]
pub fn score(title: &str, content: &str, topic: &str, jitter: f64) -> f64 {
    let mut points = 0.0;
    if title.chars().count() > 30 {
        points += 2.0;
    }
    if content.chars().count() > 200 {
        points += 2.0;
    }
    if content.contains('?') {
        points += 1.0;
    }
    if content.contains('!') {
        points += 1.0;
    }
    if topic.to_lowercase().contains("trending") {
        points += 2.0;
    }
    (points + jitter).clamp(MIN_SCORE, MAX_SCORE)
}

/// Draw a jitter term in `[0, MAX_JITTER)`.
pub fn sample_jitter<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(0.0..MAX_JITTER)
}

/// Round to one decimal place for display.
#[must_use]
pub fn round_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}

/// Engagement bucket derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementTier {
    High,
    Medium,
    Low,
}

impl EngagementTier {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 7.0 {
            Self::High
        } else if score > 5.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Label shown on the dashboard.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "Very High",
            Self::Medium => "High",
            Self::Low => "Medium",
        }
    }

    #[must_use]
    pub fn estimated_views(self) -> &'static str {
        match self {
            Self::High => "25k-50k",
            Self::Medium => "10k-25k",
            Self::Low => "2k-10k",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_question_mark_bonus() {
        assert!((score("Great Title", "Great body text here?", "AI tools", 0.0) - 1.0).abs() < f64::EPSILON);
        assert!((score("Great Title", "Great body text here?", "AI tools", 0.5) - 1.5).abs() < f64::EPSILON);
        assert!((score("Great Title", "Great body text here", "AI tools", 0.5) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_bonuses_clamped() {
        let title = "An extremely long and descriptive title here";
        let body = format!("{}?!", "x".repeat(250));
        let s = score(title, &body, "Trending gadgets", 2.99);
        assert!((s - 10.0).abs() < f64::EPSILON);
        assert!((score(title, &body, "Trending gadgets", 0.0) - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_floor() {
        assert!((score("t", "b", "x", 0.0) - MIN_SCORE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_jitter_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let j = sample_jitter(&mut rng);
            assert!((0.0..MAX_JITTER).contains(&j));
        }
    }

    #[test]
    fn test_tiers() {
        assert_eq!(EngagementTier::from_score(7.5), EngagementTier::High);
        assert_eq!(EngagementTier::from_score(7.0), EngagementTier::Medium);
        assert_eq!(EngagementTier::from_score(5.1), EngagementTier::Medium);
        assert_eq!(EngagementTier::from_score(5.0), EngagementTier::Low);
        assert_eq!(EngagementTier::High.estimated_views(), "25k-50k");
        assert_eq!(EngagementTier::Low.label(), "Medium");
    }

    #[test]
    fn test_round_score() {
        assert!((round_score(7.46) - 7.5).abs() < f64::EPSILON);
        assert!((round_score(1.0) - 1.0).abs() < f64::EPSILON);
    }
}
