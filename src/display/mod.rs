//! Pure view layer turning reconciled board state into rendered text.
//! Padding, prize display and the countdown digits live here, none of
//! it touches the network.

use crate::{
    api::models::{HeroConfig, Player, PrizeTable, PRIZE_COUNT},
    sync::{BoardState, LiveStatus},
};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Number of rows the rendered board always contains
pub const BOARD_SIZE: usize = PRIZE_COUNT;

/// Image shown when the hero config carries none
const DEFAULT_HERO_IMAGE: &str = "/site-logo.png";

/// A single rendered leaderboard row
#[derive(Debug, Clone, PartialEq)]
pub struct BoardRow {
    /// Rank starting at 1
    pub rank: usize,
    pub name: String,
    pub avatar: Option<String>,
    pub points: f64,
    /// Prize for this rank, None on placeholder rows
    pub prize: Option<u64>,
    /// Whether this row pads out a short snapshot
    pub placeholder: bool,
}

/// Builds the fixed-size row list from a snapshot of any length.
/// Shortfall is filled with zero-point placeholders which never carry
/// a prize display.
pub fn board_rows(players: &[Player], prizes: &PrizeTable) -> Vec<BoardRow> {
    let mut rows: Vec<BoardRow> = players
        .iter()
        .take(BOARD_SIZE)
        .enumerate()
        .map(|(index, player)| BoardRow {
            rank: index + 1,
            name: player.name.clone(),
            avatar: player.avatar.clone(),
            points: player.points,
            prize: Some(prizes[index]),
            placeholder: false,
        })
        .collect();

    while rows.len() < BOARD_SIZE {
        rows.push(BoardRow {
            rank: rows.len() + 1,
            name: "—".to_string(),
            avatar: None,
            points: 0.0,
            prize: None,
            placeholder: true,
        });
    }

    rows
}

/// Formats a score with two decimals: `12.50$`
pub fn format_points(points: f64) -> String {
    format!("{:.2}$", points)
}

/// Formats a prize as a whole amount: `175$`
pub fn format_prize(prize: u64) -> String {
    format!("{}$", prize)
}

/// Formats the countdown remaining until `end`. An absent or elapsed
/// end renders the ended state instead of digits.
pub fn format_countdown(end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let end = match end {
        Some(end) => end,
        None => return "Leaderboard ended".to_string(),
    };

    let remaining = (end - now).num_milliseconds();
    if remaining <= 0 {
        return "Leaderboard ended".to_string();
    }

    let days = remaining / 86_400_000;
    let hours = (remaining / 3_600_000) % 24;
    let minutes = (remaining / 60_000) % 60;
    let seconds = (remaining / 1_000) % 60;

    format!(
        "{:02}d : {:02}h : {:02}m : {:02}s",
        days, hours, minutes, seconds
    )
}

/// Hero banner resolved to displayable values, every field populated
/// with its hardcoded default when unset
#[derive(Debug, Clone, PartialEq)]
pub struct HeroView {
    pub headline: String,
    pub headline_color: String,
    pub sub1: Option<String>,
    pub sub1_color: String,
    pub sub2: Option<String>,
    pub sub2_color: String,
    pub link_text: Option<String>,
    pub link_url: String,
    pub image_url: String,
}

/// Resolves the hero config against its display defaults
pub fn hero_view(hero: &HeroConfig, backend_url: &str) -> HeroView {
    HeroView {
        headline: hero.headline.clone().unwrap_or_default(),
        headline_color: hero
            .headline_color
            .clone()
            .unwrap_or_else(|| "#ffffff".to_string()),
        sub1: hero.sub1.clone().filter(|value| !value.is_empty()),
        sub1_color: hero
            .sub1_color
            .clone()
            .unwrap_or_else(|| "#cbd5e1".to_string()),
        sub2: hero.sub2.clone().filter(|value| !value.is_empty()),
        sub2_color: hero
            .sub2_color
            .clone()
            .unwrap_or_else(|| "#cbd5e1".to_string()),
        link_text: hero.link_text.clone().filter(|value| !value.is_empty()),
        link_url: hero.link_url.clone().unwrap_or_else(|| "#".to_string()),
        image_url: resolve_asset_url(hero.image_url.as_deref(), backend_url),
    }
}

/// Resolves an image reference: absolute URLs pass through, paths are
/// anchored to the backend, anything absent falls back to the default
pub fn resolve_asset_url(url: Option<&str>, backend_url: &str) -> String {
    let url = match url {
        Some(url) if !url.is_empty() => url,
        _ => DEFAULT_HERO_IMAGE,
    };

    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return url.to_string();
    }
    if url.starts_with('/') {
        return format!("{}{}", backend_url, url);
    }
    url.to_string()
}

/// Renders the whole board as text for the watch mode
pub fn render_board(state: &BoardState, backend_url: &str, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    if !state.announcement.is_empty() {
        let _ = writeln!(out, "* {}", state.announcement);
    }

    let hero = hero_view(&state.hero, backend_url);
    if !hero.headline.is_empty() {
        let _ = writeln!(out, "== {} ==", hero.headline);
    }
    if let Some(sub1) = &hero.sub1 {
        let _ = writeln!(out, "{}", sub1);
    }
    if let Some(sub2) = &hero.sub2 {
        let _ = writeln!(out, "{}", sub2);
    }
    if let Some(link_text) = &hero.link_text {
        let _ = writeln!(out, "{} -> {}", link_text, hero.link_url);
    }

    let _ = writeln!(out, "\n{}\n", format_countdown(state.countdown_end, now));

    for row in board_rows(&state.players, &state.prizes) {
        let prize = match row.prize {
            Some(prize) => format!("  Prize: {}", format_prize(prize)),
            None => String::new(),
        };
        let _ = writeln!(
            out,
            "#{:<2} {:<24} {:>12}{}",
            row.rank,
            row.name,
            format_points(row.points),
            prize
        );
    }

    match state.status {
        LiveStatus::Stale => {
            let _ = writeln!(out, "\n! Could not load live data, showing cached");
        }
        LiveStatus::Loading => {
            let _ = writeln!(out, "\nLoading live data...");
        }
        LiveStatus::Live => {
            if let Some(updated_at) = state.updated_at {
                let _ = writeln!(out, "\nUpdated {}", updated_at.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }

    out
}

#[cfg(test)]
mod test {
    use super::{
        board_rows, format_countdown, format_points, format_prize, hero_view,
        resolve_asset_url, BOARD_SIZE,
    };
    use crate::api::models::{HeroConfig, Player, DEFAULT_PRIZES};
    use chrono::{Duration, Utc};

    fn players(count: usize) -> Vec<Player> {
        (0..count)
            .map(|index| Player {
                id: index.to_string(),
                name: format!("Player {}", index + 1),
                avatar: None,
                points: (count - index) as f64,
            })
            .collect()
    }

    /// Tests that any snapshot length renders exactly the board size,
    /// padded with prize-free placeholders
    #[test]
    fn test_padding() {
        for count in [0, 3, 7, 10, 12] {
            let rows = board_rows(&players(count), &DEFAULT_PRIZES);
            assert_eq!(rows.len(), BOARD_SIZE);

            for (index, row) in rows.iter().enumerate() {
                assert_eq!(row.rank, index + 1);
                if index < count.min(BOARD_SIZE) {
                    assert!(!row.placeholder);
                    assert_eq!(row.prize, Some(DEFAULT_PRIZES[index]));
                } else {
                    assert!(row.placeholder);
                    assert_eq!(row.name, "—");
                    assert_eq!(row.points, 0.0);
                    assert_eq!(row.prize, None);
                }
            }
        }
    }

    /// Tests the prize-for-rank mapping over the whole table
    #[test]
    fn test_prize_per_rank() {
        let rows = board_rows(&players(10), &DEFAULT_PRIZES);
        for rank in 1..=BOARD_SIZE {
            assert_eq!(rows[rank - 1].prize, Some(DEFAULT_PRIZES[rank - 1]));
        }
    }

    /// Tests the value formatting helpers
    #[test]
    fn test_formatting() {
        assert_eq!(format_points(12.5), "12.50$");
        assert_eq!(format_points(0.0), "0.00$");
        assert_eq!(format_prize(175), "175$");
    }

    /// Tests the documented countdown rendering: 3661000ms remaining
    /// displays one hour, one minute and one second
    #[test]
    fn test_countdown_digits() {
        let now = Utc::now();
        let end = now + Duration::milliseconds(3_661_000);
        assert_eq!(format_countdown(Some(end), now), "00d : 01h : 01m : 01s");
    }

    /// Tests the ended states: absent end and elapsed end
    #[test]
    fn test_countdown_ended() {
        let now = Utc::now();
        assert_eq!(format_countdown(None, now), "Leaderboard ended");
        assert_eq!(
            format_countdown(Some(now - Duration::seconds(1)), now),
            "Leaderboard ended"
        );
        assert_eq!(format_countdown(Some(now), now), "Leaderboard ended");
    }

    /// Tests multi-day countdown digits
    #[test]
    fn test_countdown_days() {
        let now = Utc::now();
        let end = now + Duration::milliseconds(2 * 86_400_000 + 3_600_000);
        assert_eq!(format_countdown(Some(end), now), "02d : 01h : 00m : 00s");
    }

    /// Tests asset URL resolution against the backend
    #[test]
    fn test_resolve_asset_url() {
        let backend = "http://localhost:8080";
        assert_eq!(
            resolve_asset_url(None, backend),
            "http://localhost:8080/site-logo.png"
        );
        assert_eq!(
            resolve_asset_url(Some("/uploads/hero.png"), backend),
            "http://localhost:8080/uploads/hero.png"
        );
        assert_eq!(
            resolve_asset_url(Some("https://cdn.example.com/a.png"), backend),
            "https://cdn.example.com/a.png"
        );
        assert_eq!(resolve_asset_url(Some("relative.png"), backend), "relative.png");
    }

    /// Tests that the hero view fills display defaults
    #[test]
    fn test_hero_view_defaults() {
        let view = hero_view(&HeroConfig::default(), "http://localhost:8080");
        assert_eq!(view.headline, "");
        assert_eq!(view.headline_color, "#ffffff");
        assert_eq!(view.sub1, None);
        assert_eq!(view.sub1_color, "#cbd5e1");
        assert_eq!(view.image_url, "http://localhost:8080/site-logo.png");
    }
}
