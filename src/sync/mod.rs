//! Core synchronization between the cached local state, the polled
//! REST snapshot and the push channel.
//!
//! Reconciliation policy: pushes always replace whatever the REST path
//! last produced (last write wins by arrival order), empty or malformed
//! payloads never replace known-good state, and a failed fetch leaves
//! the cached snapshot rendered behind a stale indicator.

use crate::{
    api::{
        models::{
            sanitize_prizes, HeroConfig, Player, PrizeTable, RawPlayer, DEFAULT_PRIZES,
        },
        ApiClient, ApiError,
    },
    config::FetchPolicy,
    push::PushEvent,
    storage::{Storage, HERO_KEY, SNAPSHOT_KEY, UPDATED_AT_KEY},
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use self::normalize::normalize_players;
use parking_lot::Mutex;
use serde_json::Value;
use std::{future::Future, sync::Arc};
use thiserror::Error;
use tokio::{
    sync::watch,
    time::{sleep, timeout},
};

pub mod normalize;

/// Whether the rendered data is known to be current
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    /// Nothing but the rehydrated cache has been obtained yet
    Loading,
    /// The snapshot came from the backend this session
    Live,
    /// The fetch budget was exhausted, cached data is shown
    Stale,
}

/// Display state assembled from cache, REST and push updates
#[derive(Debug, Clone)]
pub struct BoardState {
    pub players: Vec<Player>,
    pub prizes: PrizeTable,
    pub hero: HeroConfig,
    pub countdown_end: Option<DateTime<Utc>>,
    pub announcement: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub status: LiveStatus,
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            prizes: DEFAULT_PRIZES,
            hero: HeroConfig::default(),
            countdown_end: None,
            announcement: String::new(),
            updated_at: None,
            status: LiveStatus::Loading,
        }
    }
}

/// Error type for snapshot fetch attempts
#[derive(Debug, Error)]
pub enum FetchError {
    /// The attempt exceeded its time budget and was aborted
    #[error("attempt timed out")]
    Timeout,
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The response was successful but normalized to nothing useful
    #[error("snapshot was empty")]
    EmptySnapshot,
}

/// Client maintaining the reconciled leaderboard state
pub struct LeaderboardSync {
    api: ApiClient,
    storage: Arc<dyn Storage>,
    policy: FetchPolicy,
    state: Mutex<BoardState>,
    /// Revision counter bumped on every state change so the renderer
    /// knows when to redraw
    revisions: watch::Sender<u64>,
}

impl LeaderboardSync {
    pub fn new(
        api: ApiClient,
        storage: Arc<dyn Storage>,
        policy: FetchPolicy,
    ) -> (Arc<LeaderboardSync>, watch::Receiver<u64>) {
        let (revisions, receiver) = watch::channel(0);
        let sync = Arc::new(LeaderboardSync {
            api,
            storage,
            policy,
            state: Mutex::new(BoardState::default()),
            revisions,
        });
        (sync, receiver)
    }

    /// Clone of the current display state
    pub fn state(&self) -> BoardState {
        self.state.lock().clone()
    }

    /// Rehydrates the persisted snapshot and hero config so the first
    /// paint doesn't wait on network I/O. Missing cache leaves the
    /// empty loading state in place.
    pub fn bootstrap(&self) {
        {
            let state = &mut *self.state.lock();

            if let Some(players) = self
                .storage
                .get(SNAPSHOT_KEY)
                .and_then(|data| serde_json::from_str::<Vec<Player>>(&data).ok())
            {
                if !players.is_empty() {
                    debug!("Rehydrated {} cached players", players.len());
                    state.players = players;
                }
            }

            state.updated_at = self
                .storage
                .get(UPDATED_AT_KEY)
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
                .map(|parsed| parsed.with_timezone(&Utc));

            if let Some(hero) = self
                .storage
                .get(HERO_KEY)
                .and_then(|data| serde_json::from_str::<HeroConfig>(&data).ok())
            {
                state.hero = hero;
            }
        }

        self.bump();
    }

    /// Fetches the authoritative snapshot and the auxiliary display
    /// data concurrently, so a stalled auxiliary endpoint can't delay
    /// the snapshot attempts. Snapshot failures after the retry budget
    /// downgrade to the stale indicator rather than wiping the cache.
    pub async fn refresh(&self) {
        let (_, snapshot) = tokio::join!(
            self.refresh_auxiliary(),
            retry_with_backoff(&self.policy, || self.fetch_snapshot_once()),
        );

        match snapshot {
            Ok((players, updated_at)) => self.apply_snapshot(players, updated_at),
            Err(err) => {
                warn!("Could not load live data, showing cached: {}", err);
                self.mark_stale();
            }
        }
    }

    /// Single snapshot attempt: fetch, normalize, reject empty results
    /// so a transient empty payload can't replace a good cache
    async fn fetch_snapshot_once(&self) -> Result<(Vec<Player>, DateTime<Utc>), FetchError> {
        let raw: Vec<RawPlayer> = self.api.fetch_leaderboard().await?;
        let players = normalize_players(&raw);
        if players.is_empty() {
            return Err(FetchError::EmptySnapshot);
        }

        // Metadata is best effort, its absence doesn't fail the attempt
        let updated_at = match self.api.fetch_meta().await {
            Ok(meta) => meta.updated_at.unwrap_or_else(Utc::now),
            Err(err) => {
                debug!("Snapshot meta unavailable: {}", err);
                Utc::now()
            }
        };

        Ok((players, updated_at))
    }

    /// Fetches the hero, countdown, prize and announcement data once,
    /// the whole batch bounded by the attempt time budget. Each result
    /// is applied independently, individual failures keep the previous
    /// (or default) value.
    async fn refresh_auxiliary(&self) {
        let fetches = async {
            tokio::join!(
                self.api.fetch_countdown(),
                self.api.fetch_hero(),
                self.api.fetch_prizes(),
                self.api.fetch_announcement(),
            )
        };
        let (countdown, hero, prizes, announcement) =
            match timeout(self.policy.attempt_timeout(), fetches).await {
                Ok(results) => results,
                Err(_) => {
                    debug!("Auxiliary fetches timed out");
                    return;
                }
            };

        {
            let state = &mut *self.state.lock();

            match countdown {
                Ok(config) => state.countdown_end = config.end,
                Err(err) => debug!("Countdown unavailable: {}", err),
            }

            match hero {
                Ok(patch) => {
                    state.hero = state.hero.merged(patch);
                    self.persist_hero(&state.hero);
                }
                Err(err) => debug!("Hero config unavailable: {}", err),
            }

            match prizes {
                Ok(response) => {
                    if let Some(prizes) =
                        response.prizes.as_deref().and_then(sanitize_prizes)
                    {
                        state.prizes = prizes;
                    }
                }
                Err(err) => debug!("Prizes unavailable: {}", err),
            }

            match announcement {
                Ok(config) => state.announcement = config.announcement.unwrap_or_default(),
                Err(err) => debug!("Announcement unavailable: {}", err),
            }
        }

        self.bump();
    }

    /// Replaces the snapshot in memory and in storage
    fn apply_snapshot(&self, players: Vec<Player>, updated_at: DateTime<Utc>) {
        if let Ok(data) = serde_json::to_string(&players) {
            self.storage.set(SNAPSHOT_KEY, &data);
        }
        self.storage.set(UPDATED_AT_KEY, &updated_at.to_rfc3339());

        {
            let state = &mut *self.state.lock();
            state.players = players;
            state.updated_at = Some(updated_at);
            state.status = LiveStatus::Live;
        }
        self.bump();
    }

    /// Flags the current data as stale after the fetch budget was
    /// exhausted, previously cached players stay rendered
    fn mark_stale(&self) {
        self.state.lock().status = LiveStatus::Stale;
        self.bump();
    }

    /// Applies a push channel event. Pushes supersede whatever the REST
    /// path produced regardless of timing; empty or malformed payloads
    /// are dropped without touching the current state.
    pub fn apply_push(&self, event: PushEvent) {
        match event {
            PushEvent::Leaderboard(payload) => {
                let raw: Vec<RawPlayer> = match serde_json::from_value(payload) {
                    Ok(value) => value,
                    Err(err) => {
                        debug!("Ignoring malformed leaderboard push: {}", err);
                        return;
                    }
                };
                if raw.is_empty() {
                    debug!("Ignoring empty leaderboard push");
                    return;
                }
                self.apply_snapshot(normalize_players(&raw), Utc::now());
            }
            PushEvent::Prizes(payload) => {
                let values: Vec<Value> = match serde_json::from_value(payload) {
                    Ok(value) => value,
                    Err(err) => {
                        debug!("Ignoring malformed prizes push: {}", err);
                        return;
                    }
                };
                let values: Vec<f64> = values.iter().map(normalize::coerce_points).collect();
                match sanitize_prizes(&values) {
                    Some(prizes) => {
                        self.state.lock().prizes = prizes;
                        self.bump();
                    }
                    None => debug!("Ignoring prizes push of length {}", values.len()),
                }
            }
            PushEvent::Hero(patch) => {
                {
                    let state = &mut *self.state.lock();
                    state.hero = state.hero.merged(patch);
                    self.persist_hero(&state.hero);
                }
                self.bump();
            }
            PushEvent::Countdown(config) => {
                self.state.lock().countdown_end = config.end;
                self.bump();
            }
            PushEvent::Announcement(config) => {
                self.state.lock().announcement = config.announcement.unwrap_or_default();
                self.bump();
            }
        }
    }

    fn persist_hero(&self, hero: &HeroConfig) {
        if let Ok(data) = serde_json::to_string(hero) {
            self.storage.set(HERO_KEY, &data);
        }
    }

    fn bump(&self) {
        self.revisions.send_modify(|revision| *revision += 1);
    }
}

/// Runs `attempt_op` up to the policy's attempt budget, bounding each
/// attempt with the policy timeout and sleeping an exponentially
/// growing delay between failed attempts. The last error is returned
/// once the budget is exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &FetchPolicy,
    mut attempt_op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut last_error = FetchError::Timeout;

    for attempt in 0..policy.attempts {
        match timeout(policy.attempt_timeout(), attempt_op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => last_error = err,
            Err(_) => last_error = FetchError::Timeout,
        }

        if attempt + 1 < policy.attempts {
            sleep(policy.backoff_delay(attempt)).await;
        }
    }

    Err(last_error)
}
