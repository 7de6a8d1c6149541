//! Simulated trend data: the live event stream and the snapshot endpoint.
//!
//! Topics are sampled from a fixed catalog; there is no detection algorithm.

pub mod stream;

pub use stream::{StreamCadence, TrendFrame, TrendTicker};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Topics cycled through by the live stream.
const STREAM_TOPICS: &[&str] = &[
    "AI productivity tools",
    "Remote work tips",
    "Crypto market analysis",
    "Healthy meal prep",
    "Gaming setup ideas",
];

const ENGAGEMENT_LABELS: &[&str] = &["Low", "Medium", "High", "Very High"];

/// Snapshot catalog: topic, base score, base impressions, engagement.
const CATALOG: &[(&str, f64, u64, &str)] = &[
    ("AI productivity tools", 8.7, 45_000, "Very High"),
    ("Remote work tips", 8.2, 38_000, "High"),
    ("Crypto market analysis", 7.9, 52_000, "High"),
    ("Healthy meal prep", 7.6, 31_000, "Medium"),
    ("Gaming setup ideas", 7.4, 29_000, "Medium"),
    ("Learning programming", 7.1, 27_000, "Medium"),
    ("Travel photography", 6.8, 23_000, "Medium"),
    ("Home automation", 6.5, 21_000, "Low"),
    ("Personal finance", 6.2, 19_000, "Low"),
    ("Mindfulness practices", 5.9, 17_000, "Low"),
];

/// Event pushed to stream subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrendEvent {
    Hello { ts: i64 },
    TrendUpdate { ts: i64, trend: TrendSample },
}

impl TrendEvent {
    #[must_use]
    pub fn hello(ts: i64) -> Self {
        Self::Hello { ts }
    }

    #[must_use]
    pub fn update(ts: i64, trend: TrendSample) -> Self {
        Self::TrendUpdate { ts, trend }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSample {
    pub id: String,
    pub topic: String,
    pub score: f64,
    pub impressions: u64,
    pub engagement: String,
    pub growth_rate: String,
}

fn random_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid().to_string()
}

fn growth_rate<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:.1}%", rng.gen_range(-5.0..15.0))
}

/// One synthetic trend tick.
pub fn sample_trend<R: Rng + ?Sized>(rng: &mut R) -> TrendSample {
    let topic = STREAM_TOPICS.choose(rng).copied().unwrap_or("AI productivity tools");
    let engagement = ENGAGEMENT_LABELS.choose(rng).copied().unwrap_or("Medium");
    TrendSample {
        id: random_id(rng),
        topic: topic.to_string(),
        score: (rng.gen_range(6.0..10.0) * 10.0_f64).round() / 10.0,
        impressions: 15_000 + rng.gen_range(0..30_000),
        engagement: engagement.to_string(),
        growth_rate: growth_rate(rng),
    }
}

/// Body of a snapshot request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrendsRequest {
    pub window: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendWindow {
    Hour,
    Day,
    Week,
}

impl TrendWindow {
    /// Unknown values fall back to a day.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("1h") => Self::Hour,
            Some("7d") => Self::Week,
            _ => Self::Day,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "1h",
            Self::Day => "24h",
            Self::Week => "7d",
        }
    }

    #[must_use]
    pub fn hours(self) -> i64 {
        match self {
            Self::Hour => 1,
            Self::Day => 24,
            Self::Week => 168,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendEntry {
    pub id: String,
    pub topic: String,
    pub score: f64,
    pub impressions: u64,
    pub engagement: String,
    pub timestamp: String,
    pub growth_rate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendMeta {
    pub window: String,
    pub total_topics: usize,
    pub total_impressions: u64,
    pub average_score: f64,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendSnapshot {
    pub trends: Vec<TrendEntry>,
    pub meta: TrendMeta,
}

/// Sampled trending topics within `window`, highest score first.
pub fn snapshot<R: Rng + ?Sized>(
    request: &TrendsRequest,
    now: DateTime<Utc>,
    rng: &mut R,
) -> TrendSnapshot {
    let window = TrendWindow::parse(request.window.as_deref());
    let limit = request.limit.unwrap_or(20).min(CATALOG.len());
    let window_secs = window.hours() * 3600;

    let mut trends: Vec<TrendEntry> = CATALOG
        .iter()
        .take(limit)
        .map(|&(topic, score, impressions, engagement)| {
            let age = ChronoDuration::seconds(rng.gen_range(0..window_secs));
            TrendEntry {
                id: random_id(rng),
                topic: topic.to_string(),
                score: ((score + rng.gen_range(-0.25..0.25)) * 100.0).round() / 100.0,
                impressions: impressions + rng.gen_range(0..5_000),
                engagement: engagement.to_string(),
                timestamp: (now - age).to_rfc3339(),
                growth_rate: growth_rate(rng),
            }
        })
        .collect();
    trends.sort_by(|a, b| b.score.total_cmp(&a.score));

    let total_impressions = trends.iter().map(|t| t.impressions).sum();
    let average_score = if trends.is_empty() {
        0.0
    } else {
        trends.iter().map(|t| t.score).sum::<f64>() / trends.len() as f64
    };

    TrendSnapshot {
        meta: TrendMeta {
            window: window.as_str().to_string(),
            total_topics: trends.len(),
            total_impressions,
            average_score: (average_score * 10.0).round() / 10.0,
            last_updated: now.to_rfc3339(),
        },
        trends,
    }
}
