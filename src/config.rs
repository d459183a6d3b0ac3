use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,

    // Comportamiento
    pub idle_leave_secs: u64,
    pub queue_preview: usize,

    // Rendimiento
    pub worker_threads: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,

            // Comportamiento
            idle_leave_secs: std::env::var("IDLE_LEAVE_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            queue_preview: std::env::var("QUEUE_PREVIEW")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            // Rendimiento
            worker_threads: match std::env::var("WORKER_THREADS") {
                Ok(val) if !val.trim().is_empty() => val.parse()?,
                _ => num_cpus::get(),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Chequeos de sanidad sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0.0 y 2.0, se recibió: {}",
                self.default_volume
            );
        }

        if self.idle_leave_secs == 0 {
            anyhow::bail!("IDLE_LEAVE_SECS debe ser mayor que 0");
        }

        if self.queue_preview == 0 {
            anyhow::bail!("QUEUE_PREVIEW debe ser mayor que 0");
        }

        Ok(())
    }

    /// Resumen de configuración para el log de arranque, sin el token.
    pub fn summary(&self) -> String {
        format!(
            "Config: App ID {} (Guild: {}) • vol {}% • auto-leave {}s • preview {} • {} workers",
            self.application_id,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.idle_leave_secs,
            self.queue_preview,
            self.worker_threads
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            default_volume: 0.5,
            idle_leave_secs: 60,
            queue_preview: 10,
            worker_threads: num_cpus::get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_volume() {
        let config = Config {
            default_volume: 3.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_idle_delay() {
        let config = Config {
            idle_leave_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
