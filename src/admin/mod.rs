//! Admin-side client: token storage, configuration writes, image
//! upload and the ID export.
//!
//! Any non-success status on an authenticated call is treated as an
//! expired token and forces a logout, even when the true cause was an
//! unrelated server error. The backend answers wrong tokens with
//! assorted statuses so the two cases can't be told apart here.

use crate::{
    api::{
        models::{sanitize_prizes, ContestWindow, HeroConfig, PrizeTable},
        ApiClient, ApiError, ApiResult,
    },
    storage::{Storage, ADMIN_TOKEN_KEY},
};
use chrono::{DateTime, Utc};
use log::info;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

/// Error type for admin operations
#[derive(Debug, Error)]
pub enum AdminError {
    /// No token stored, login is required first
    #[error("no admin token stored, login first")]
    MissingToken,
    /// The provided token failed the validation probe
    #[error("token rejected by the backend")]
    InvalidToken,
    /// An authenticated call failed; the stored token was cleared
    #[error("unauthorized, logged out: {0}")]
    Unauthorized(ApiError),
    /// The image upload failed, surfaced without retry or logout
    #[error("upload failed: {0}")]
    Upload(ApiError),
    #[error("prize list must hold exactly 10 non-negative values")]
    InvalidPrizes,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type AdminResult<T> = Result<T, AdminError>;

/// Admin session bound to a token storage scope. A persistent scope
/// survives restarts, a session scope lives only for the process.
pub struct AdminSession {
    api: ApiClient,
    storage: Arc<dyn Storage>,
}

/// Hero banner form the way the admin panel edits it: text and color
/// fields plus glow parameters the CSS values are composed from
#[derive(Debug, Clone)]
pub struct HeroForm {
    pub headline: String,
    pub sub1: String,
    pub sub2: String,
    pub link_text: String,
    pub link_url: String,
    pub headline_color: String,
    pub sub1_color: String,
    pub sub2_color: String,
    pub image_url: String,
    pub glow_color: String,
    pub glow_size: u32,
    pub glow_alpha: f64,
    pub image_glow_color: String,
    pub image_glow_size: u32,
    pub image_glow_alpha: f64,
}

impl Default for HeroForm {
    fn default() -> Self {
        Self {
            headline: String::new(),
            sub1: String::new(),
            sub2: String::new(),
            link_text: String::new(),
            link_url: String::new(),
            headline_color: "#ffffff".to_string(),
            sub1_color: "#cbd5e1".to_string(),
            sub2_color: "#cbd5e1".to_string(),
            image_url: "/site-logo.png".to_string(),
            glow_color: "#ffffff".to_string(),
            glow_size: 12,
            glow_alpha: 0.8,
            image_glow_color: "#ffffff".to_string(),
            image_glow_size: 16,
            image_glow_alpha: 0.65,
        }
    }
}

impl HeroForm {
    /// Composes the full hero config including the glow CSS strings
    pub fn into_config(self) -> HeroConfig {
        let headline_glow = format!(
            "0 0 {}px {}",
            self.glow_size,
            hex_to_rgba(&self.glow_color, self.glow_alpha)
        );
        let image_glow = format!(
            "drop-shadow(0 0 {}px {})",
            self.image_glow_size,
            hex_to_rgba(&self.image_glow_color, self.image_glow_alpha)
        );

        HeroConfig {
            headline: Some(self.headline),
            sub1: Some(self.sub1),
            sub2: Some(self.sub2),
            link_text: Some(self.link_text),
            link_url: Some(self.link_url),
            headline_color: Some(self.headline_color),
            sub1_color: Some(self.sub1_color),
            sub2_color: Some(self.sub2_color),
            headline_glow: Some(headline_glow),
            image_glow: Some(image_glow),
            image_url: Some(self.image_url),
        }
    }
}

impl AdminSession {
    pub fn new(api: ApiClient, storage: Arc<dyn Storage>) -> AdminSession {
        AdminSession { api, storage }
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(ADMIN_TOKEN_KEY)
    }

    /// Validates the candidate token against the backend probe and
    /// stores it on success
    pub async fn login(&self, token: &str) -> AdminResult<()> {
        if token.is_empty() {
            return Err(AdminError::MissingToken);
        }

        match self.api.ping(token).await {
            Ok(()) => {
                self.storage.set(ADMIN_TOKEN_KEY, token);
                info!("Admin token accepted");
                Ok(())
            }
            Err(_) => Err(AdminError::InvalidToken),
        }
    }

    /// Re-validates the stored token
    pub async fn ping(&self) -> AdminResult<()> {
        let token = self.require_token()?;
        self.authorized(self.api.ping(&token).await)
    }

    pub fn logout(&self) {
        self.storage.remove(ADMIN_TOKEN_KEY);
    }

    pub async fn save_countdown(&self, end: DateTime<Utc>) -> AdminResult<Option<DateTime<Utc>>> {
        let token = self.require_token()?;
        let stored = self.authorized(self.api.post_countdown(&token, end).await)?;
        Ok(stored.end)
    }

    pub async fn save_hero(&self, form: HeroForm) -> AdminResult<()> {
        let token = self.require_token()?;
        self.authorized(self.api.post_hero(&token, &form.into_config()).await)
    }

    /// Stores the prize table, rejecting anything that isn't exactly
    /// ten non-negative values
    pub async fn save_prizes(&self, values: &[f64]) -> AdminResult<PrizeTable> {
        let prizes = sanitize_prizes(values).ok_or(AdminError::InvalidPrizes)?;
        let token = self.require_token()?;
        self.authorized(self.api.post_prizes(&token, &prizes).await)?;
        Ok(prizes)
    }

    pub async fn save_contest(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> AdminResult<()> {
        let token = self.require_token()?;
        let window = ContestWindow { start, end };
        self.authorized(self.api.post_contest(&token, &window).await)
    }

    /// Uploads a hero image and responds with the URL it is served
    /// from. Upload failures don't force a logout.
    pub async fn upload_image(&self, path: &Path) -> AdminResult<String> {
        let token = self.require_token()?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let bytes = tokio::fs::read(path).await?;

        let response = self
            .api
            .upload_hero_image(&token, file_name, bytes)
            .await
            .map_err(AdminError::Upload)?;
        Ok(response.image_url.unwrap_or_default())
    }

    /// Downloads the affiliate ID export into `dir`, responding with
    /// the written file path
    pub async fn export_ids(&self, dir: &Path) -> AdminResult<PathBuf> {
        let token = self.require_token()?;
        let body = self.authorized(self.api.export_ids(&token).await)?;

        let path = dir.join(export_file_name(Utc::now()));
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }

    fn require_token(&self) -> AdminResult<String> {
        self.token().ok_or(AdminError::MissingToken)
    }

    /// Maps any failed authenticated call onto the forced-logout path,
    /// clearing the stored token
    fn authorized<T>(&self, result: ApiResult<T>) -> AdminResult<T> {
        result.map_err(|err| {
            self.logout();
            AdminError::Unauthorized(err)
        })
    }
}

/// File name for an ID export taken at the provided time
fn export_file_name(at: DateTime<Utc>) -> String {
    format!("tokyorewards-ids_{}.txt", at.format("%Y-%m-%d-%H-%M-%S"))
}

/// Converts a hex color (3 or 6 digit, with or without `#`) and an
/// alpha into a CSS rgba() value
fn hex_to_rgba(hex: &str, alpha: f64) -> String {
    let mut hex = hex.trim_start_matches('#').to_string();
    if hex.len() == 3 {
        hex = hex.chars().flat_map(|c| [c, c]).collect();
    }

    let value = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFFFF);
    let r = (value >> 16) & 255;
    let g = (value >> 8) & 255;
    let b = value & 255;
    format!("rgba({}, {}, {}, {})", r, g, b, alpha)
}
