//! Models for the backend REST and push payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Number of ranks the prize table and rendered board always cover
pub const PRIZE_COUNT: usize = 10;

/// Prize table used whenever the backend copy is unavailable
pub const DEFAULT_PRIZES: PrizeTable = [175, 100, 70, 50, 35, 25, 15, 10, 10, 10];

/// Reward for each rank, index `i` holding the prize for rank `i + 1`
pub type PrizeTable = [u64; PRIZE_COUNT];

/// Raw player record as returned by the backend. The backend schema has
/// drifted over time so each canonical field can arrive under several
/// different keys, any of which may also be missing entirely.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPlayer {
    pub id: Option<Value>,
    pub uuid: Option<Value>,
    pub user_id: Option<Value>,
    #[serde(rename = "userId")]
    pub user_id_camel: Option<Value>,

    pub name: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,

    pub avatar: Option<String>,
    pub steam_avatar: Option<String>,
    pub image: Option<String>,

    pub points: Option<Value>,
    pub wagered: Option<Value>,
    pub wager: Option<Value>,
    pub total: Option<Value>,
}

/// Canonical player record. Every field is always populated with a
/// valid default, nothing downstream has to handle absent values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub points: f64,
}

/// Metadata accompanying the leaderboard snapshot
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeaderboardMeta {
    #[serde(rename = "updatedAt", deserialize_with = "lenient_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Countdown configuration, `end` is absent when no countdown is set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownConfig {
    #[serde(deserialize_with = "lenient_datetime")]
    pub end: Option<DateTime<Utc>>,
}

/// Hero banner configuration. All fields optional so partial push
/// payloads can be merged without blanking what the sender omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeroConfig {
    pub headline: Option<String>,
    pub sub1: Option<String>,
    pub sub2: Option<String>,
    pub link_text: Option<String>,
    pub link_url: Option<String>,
    pub headline_color: Option<String>,
    pub sub1_color: Option<String>,
    pub sub2_color: Option<String>,
    pub headline_glow: Option<String>,
    pub image_glow: Option<String>,
    pub image_url: Option<String>,
}

impl HeroConfig {
    /// Shallow patch over the previous config, first present value
    /// wins per field
    pub fn merged(&self, patch: HeroConfig) -> HeroConfig {
        HeroConfig {
            headline: patch.headline.or_else(|| self.headline.clone()),
            sub1: patch.sub1.or_else(|| self.sub1.clone()),
            sub2: patch.sub2.or_else(|| self.sub2.clone()),
            link_text: patch.link_text.or_else(|| self.link_text.clone()),
            link_url: patch.link_url.or_else(|| self.link_url.clone()),
            headline_color: patch.headline_color.or_else(|| self.headline_color.clone()),
            sub1_color: patch.sub1_color.or_else(|| self.sub1_color.clone()),
            sub2_color: patch.sub2_color.or_else(|| self.sub2_color.clone()),
            headline_glow: patch.headline_glow.or_else(|| self.headline_glow.clone()),
            image_glow: patch.image_glow.or_else(|| self.image_glow.clone()),
            image_url: patch.image_url.or_else(|| self.image_url.clone()),
        }
    }
}

/// Body of the prizes endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrizesResponse {
    pub prizes: Option<Vec<f64>>,
}

/// Body of the announcement endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnnouncementConfig {
    pub announcement: Option<String>,
}

/// Contest window bounds, either side may be unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContestWindow {
    #[serde(deserialize_with = "lenient_datetime")]
    pub start: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_datetime")]
    pub end: Option<DateTime<Utc>>,
}

/// Body returned by the hero image upload endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadResponse {
    pub image_url: Option<String>,
}

/// Sanitizes a raw prize list into the canonical table: exactly
/// [PRIZE_COUNT] entries, each floored and clamped non-negative.
/// Anything else is rejected so a bad payload can't shrink the table.
pub fn sanitize_prizes(values: &[f64]) -> Option<PrizeTable> {
    if values.len() != PRIZE_COUNT {
        return None;
    }

    let mut prizes = [0u64; PRIZE_COUNT];
    for (slot, value) in prizes.iter_mut().zip(values.iter()) {
        if value.is_finite() && *value > 0.0 {
            *slot = value.floor() as u64;
        }
    }
    Some(prizes)
}

/// Deserializes an optional ISO timestamp, treating a missing, null or
/// unparseable value as absent rather than failing the whole payload
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc)))
}

#[cfg(test)]
mod test {
    use super::{sanitize_prizes, CountdownConfig, HeroConfig, PRIZE_COUNT};

    /// Tests that prize sanitization floors values and clamps
    /// negatives to zero
    #[test]
    fn test_sanitize_prizes() {
        let raw = [175.9, 100.0, 70.5, 50.0, 35.0, -25.0, 15.0, 10.0, 10.0, 10.0];
        let prizes = sanitize_prizes(&raw).unwrap();
        assert_eq!(prizes[0], 175);
        assert_eq!(prizes[2], 70);
        assert_eq!(prizes[5], 0);
    }

    /// Tests that a wrong-length prize list is rejected
    #[test]
    fn test_sanitize_prizes_wrong_length() {
        assert!(sanitize_prizes(&[1.0; PRIZE_COUNT - 1]).is_none());
        assert!(sanitize_prizes(&[]).is_none());
    }

    /// Tests that hero merging keeps previous fields the patch omitted
    #[test]
    fn test_hero_merge_keeps_omitted() {
        let previous = HeroConfig {
            headline: Some("Weekly race".to_string()),
            sub1: Some("Top wagers win".to_string()),
            ..Default::default()
        };
        let patch = HeroConfig {
            headline: Some("New race".to_string()),
            ..Default::default()
        };

        let merged = previous.merged(patch);
        assert_eq!(merged.headline.as_deref(), Some("New race"));
        assert_eq!(merged.sub1.as_deref(), Some("Top wagers win"));
    }

    /// Tests that a malformed countdown timestamp is treated as unset
    #[test]
    fn test_lenient_countdown() {
        let config: CountdownConfig = serde_json::from_str(r#"{"end":"not a date"}"#).unwrap();
        assert!(config.end.is_none());

        let config: CountdownConfig =
            serde_json::from_str(r#"{"end":"2026-01-01T00:00:00Z"}"#).unwrap();
        assert!(config.end.is_some());
    }
}
