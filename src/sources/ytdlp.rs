use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};
use url::Url;

use super::{Resolver, Track};

/// Resolutor basado en yt-dlp. Acepta URLs directas o términos de búsqueda;
/// las URLs de YouTube se normalizan para quitar parámetros de tracking.
pub struct YtDlpResolver;

impl YtDlpResolver {
    pub fn new() -> Self {
        Self
    }

    /// Un query que empieza con esquema de URL se trata como enlace directo.
    pub fn is_direct_link(query: &str) -> bool {
        query.starts_with("http")
    }

    /// Normaliza URLs de YouTube: conserva solo el identificador del video y
    /// descarta parámetros de playlist/tracking (`list`, `t`, `si`, etc.).
    /// URLs de otros sitios se devuelven sin tocar.
    pub fn normalize_url(raw: &str) -> String {
        let parsed = match Url::parse(raw) {
            Ok(url) => url,
            Err(_) => return raw.to_string(),
        };

        let host = match parsed.host_str() {
            Some(host) => host,
            None => return raw.to_string(),
        };

        // youtube.com/watch?v=VIDEO_ID&list=...&t=...
        let is_youtube = host == "www.youtube.com"
            || host == "youtube.com"
            || host == "m.youtube.com"
            || host == "music.youtube.com";

        if is_youtube && parsed.path() == "/watch" {
            for (key, value) in parsed.query_pairs() {
                if key == "v" {
                    return format!("https://www.youtube.com/watch?v={}", value);
                }
            }
            return raw.to_string();
        }

        // youtu.be/VIDEO_ID?si=...
        if host == "youtu.be" {
            if let Some(video_id) = parsed.path_segments().and_then(|mut s| s.next()) {
                if !video_id.is_empty() {
                    return format!("https://www.youtube.com/watch?v={}", video_id);
                }
            }
        }

        raw.to_string()
    }

    /// Ejecuta yt-dlp y parsea su salida JSON.
    async fn extract(&self, target: &str) -> Result<YtDlpEntry> {
        let output = Command::new("yt-dlp")
            .args([
                "-J",
                "--no-playlist",
                "--default-search",
                "ytsearch",
                "--socket-timeout",
                "30",
                "--retries",
                "3",
                "--quiet",
                "--no-warnings",
            ])
            .arg(target)
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp falló para {}: {}", target, error.trim());
            anyhow::bail!("yt-dlp falló: {}", error.trim());
        }

        let mut entry: YtDlpEntry = serde_json::from_slice(&output.stdout)?;

        // Las búsquedas devuelven una playlist con un solo resultado
        if let Some(entries) = entry.entries.take() {
            entry = entries
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("Sin resultados para: {}", target))?;
        }

        Ok(entry)
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Track> {
        let target = if Self::is_direct_link(query) {
            Self::normalize_url(query)
        } else {
            format!("ytsearch1:{}", query)
        };

        info!("🔍 Resolviendo: {}", target);

        let entry = self.extract(&target).await?;

        let url = entry
            .webpage_url
            .or_else(|| Self::is_direct_link(query).then(|| Self::normalize_url(query)))
            .ok_or_else(|| anyhow::anyhow!("Resultado sin URL para: {}", query))?;

        let mut track = Track::new(
            entry.title.unwrap_or_else(|| "Unknown".to_string()),
            url,
        );

        if let Some(thumbnail) = entry.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }

        if let Some(duration) = entry.duration {
            track = track.with_duration(Duration::from_secs_f64(duration));
        }

        info!("✅ Resuelto: {}", track.title());
        Ok(track)
    }
}

/// Campos relevantes de la salida `-J` de yt-dlp.
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    title: Option<String>,
    webpage_url: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    entries: Option<Vec<YtDlpEntry>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_link_detection() {
        assert!(YtDlpResolver::is_direct_link(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YtDlpResolver::is_direct_link("http://example.com/audio.mp3"));
        assert!(!YtDlpResolver::is_direct_link("bohemian rhapsody"));
    }

    #[test]
    fn test_normalize_drops_tracking_params() {
        assert_eq!(
            YtDlpResolver::normalize_url(
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL123&index=4&t=42s"
            ),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            YtDlpResolver::normalize_url("https://youtu.be/dQw4w9WgXcQ?si=abcdef"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            YtDlpResolver::normalize_url("https://music.youtube.com/watch?v=abc123&feature=share"),
            "https://www.youtube.com/watch?v=abc123"
        );
    }

    #[test]
    fn test_normalize_leaves_other_urls_alone() {
        assert_eq!(
            YtDlpResolver::normalize_url("https://example.com/stream.mp3?token=xyz"),
            "https://example.com/stream.mp3?token=xyz"
        );
        // Sin parámetro v no hay nada que normalizar
        assert_eq!(
            YtDlpResolver::normalize_url("https://www.youtube.com/watch?list=PL123"),
            "https://www.youtube.com/watch?list=PL123"
        );
        assert_eq!(YtDlpResolver::normalize_url("no es una url"), "no es una url");
    }
}
