//! Normalization of variable-shaped player records into the canonical
//! [Player] shape. Every field has a fallback so normalization never
//! fails, and normalizing an already-canonical record is a no-op.

use crate::api::models::{Player, RawPlayer};
use serde_json::Value;
use std::cmp::Ordering;

/// Normalizes a full raw snapshot, sorting the result descending by
/// points. The sort is stable so equal scores keep their arrival order.
pub fn normalize_players(raw: &[RawPlayer]) -> Vec<Player> {
    let mut players: Vec<Player> = raw
        .iter()
        .enumerate()
        .map(|(index, player)| normalize_player(player, index))
        .collect();

    players.sort_by(|a, b| b.points.partial_cmp(&a.points).unwrap_or(Ordering::Equal));
    players
}

/// Normalizes a single record, `index` provides the positional
/// fallbacks for the id and name fields
pub fn normalize_player(raw: &RawPlayer, index: usize) -> Player {
    let id = [&raw.id, &raw.uuid, &raw.user_id, &raw.user_id_camel]
        .into_iter()
        .find_map(|value| stringify(value))
        .unwrap_or_else(|| index.to_string());

    let name = [&raw.name, &raw.username, &raw.display_name]
        .into_iter()
        .find_map(|value| value.clone())
        .unwrap_or_else(|| format!("Player {}", index + 1));

    let avatar = [&raw.avatar, &raw.steam_avatar, &raw.image]
        .into_iter()
        .find_map(|value| value.clone());

    let points = [&raw.points, &raw.wagered, &raw.wager, &raw.total]
        .into_iter()
        .find_map(|value| value.as_ref())
        .map(coerce_points)
        .unwrap_or(0.0);

    Player {
        id,
        name,
        avatar,
        points,
    }
}

/// Coerces a numeric-or-string score into a number. String input has
/// its first comma treated as a decimal separator; anything that still
/// fails to parse becomes 0.
pub fn coerce_points(value: &Value) -> f64 {
    match value {
        Value::Number(number) => {
            let parsed = number.as_f64().unwrap_or(0.0);
            if parsed.is_finite() {
                parsed
            } else {
                0.0
            }
        }
        Value::String(raw) => {
            let raw = raw.replacen(',', ".", 1);
            match raw.trim().parse::<f64>() {
                Ok(parsed) if parsed.is_finite() => parsed,
                _ => 0.0,
            }
        }
        _ => 0.0,
    }
}

/// Stringifies an id value, accepting both string and numeric ids
fn stringify(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(value)) => Some(value.clone()),
        Some(Value::Number(value)) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::{coerce_points, normalize_player, normalize_players};
    use crate::api::models::{Player, RawPlayer};
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawPlayer {
        serde_json::from_value(value).unwrap()
    }

    /// Tests the documented scenario: uuid/username/wager synonyms with
    /// a comma decimal separator
    #[test]
    fn test_synonym_record() {
        let player = normalize_player(
            &raw(json!({"uuid": "a", "username": "X", "wager": "12,50"})),
            0,
        );
        assert_eq!(
            player,
            Player {
                id: "a".to_string(),
                name: "X".to_string(),
                avatar: None,
                points: 12.5,
            }
        );
    }

    /// Tests that a record missing every source field still produces a
    /// fully populated player
    #[test]
    fn test_empty_record() {
        let player = normalize_player(&RawPlayer::default(), 4);
        assert_eq!(player.id, "4");
        assert_eq!(player.name, "Player 5");
        assert_eq!(player.avatar, None);
        assert_eq!(player.points, 0.0);
    }

    /// Tests that normalization is idempotent: feeding a canonical
    /// record back through produces the same record
    #[test]
    fn test_idempotent() {
        let first = normalize_player(
            &raw(json!({"id": 7, "name": "Ace", "avatar": "a.png", "points": "3,5"})),
            0,
        );

        let reencoded = raw(serde_json::to_value(&first).unwrap());
        let second = normalize_player(&reencoded, 0);
        assert_eq!(first, second);
    }

    /// Tests the score coercion fallbacks
    #[test]
    fn test_coerce_points() {
        assert_eq!(coerce_points(&json!(12.5)), 12.5);
        assert_eq!(coerce_points(&json!("12,50")), 12.5);
        assert_eq!(coerce_points(&json!("250")), 250.0);
        assert_eq!(coerce_points(&json!("garbage")), 0.0);
        assert_eq!(coerce_points(&json!(null)), 0.0);
        assert_eq!(coerce_points(&json!({"nested": true})), 0.0);
    }

    /// Tests that snapshots are sorted descending by points
    #[test]
    fn test_sorted_descending() {
        let players = normalize_players(&[
            raw(json!({"id": "low", "points": 10})),
            raw(json!({"id": "high", "points": 500})),
            raw(json!({"id": "mid", "points": 50})),
        ]);

        let ids: Vec<&str> = players.iter().map(|player| player.id.as_str()).collect();
        assert_eq!(ids, ["high", "mid", "low"]);
    }

    /// Tests that numeric ids are stringified rather than falling back
    /// to the positional index
    #[test]
    fn test_numeric_id() {
        let player = normalize_player(&raw(json!({"user_id": 42})), 9);
        assert_eq!(player.id, "42");
    }
}
