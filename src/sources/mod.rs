pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use songbird::input::{Input, YoutubeDl};
use std::time::Duration;
use tracing::info;

pub use ytdlp::YtDlpResolver;

/// Trait común para resolutores de pistas: convierten una URL o un término
/// de búsqueda en una pista reproducible, o fallan sin tocar al controlador.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Track>;
}

/// Una pista resuelta. Inmutable después de crearse: el controlador la
/// clona y la comparte libremente, nunca la modifica.
#[derive(Debug, Clone)]
pub struct Track {
    title: String,
    url: String,
    thumbnail: Option<String>,
    duration: Option<Duration>,
    requested_by: Option<UserId>,
    enqueued_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: String, url: String) -> Self {
        Self {
            title,
            url,
            thumbnail: None,
            duration: None,
            requested_by: None,
            enqueued_at: Utc::now(),
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }
    #[allow(dead_code)]
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    // Builders
    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// El solicitante se adjunta al encolar, nunca lo pone el resolutor.
    pub fn with_requested_by(mut self, user_id: UserId) -> Self {
        self.requested_by = Some(user_id);
        self
    }

    /// Crea el input de audio para songbird a partir de la URL canónica.
    pub fn to_input(&self) -> Result<Input> {
        info!("🎵 Creando input para: {}", self.title);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; Discord Music Bot)")
            .build()?;

        let ytdl = YoutubeDl::new(client, self.url.clone());
        Ok(Input::from(ytdl))
    }
}
