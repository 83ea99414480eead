use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub audio_dir: PathBuf,
    pub opus_bitrate: u32,
    pub track_cooldown_ms: u64,

    // Límites
    pub max_queue_size: usize,
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
            audio_dir: std::env::var("AUDIO_DIR")
                .unwrap_or_else(|_| "./audio".to_string())
                .into(),
            opus_bitrate: std::env::var("OPUS_BITRATE")
                .unwrap_or_else(|_| "96000".to_string()) // 96kbps (Discord default)
                .parse()?,
            track_cooldown_ms: std::env::var("TRACK_COOLDOWN_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,

            // Límites
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
        };

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.audio_dir)?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Sanity checks sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if self.opus_bitrate > 510_000 {
            anyhow::bail!(
                "Opus bitrate cannot exceed 510kbps, got: {}",
                self.opus_bitrate
            );
        }
        if self.opus_bitrate < 8_000 {
            anyhow::bail!(
                "Opus bitrate too low, minimum 8kbps, got: {}",
                self.opus_bitrate
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.track_cooldown_ms > 10_000 {
            anyhow::bail!(
                "Track cooldown above 10s makes the queue feel stuck, got: {}ms",
                self.track_cooldown_ms
            );
        }

        Ok(())
    }

    /// Resumen para el log de arranque, sin datos sensibles.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}kbps, caché en {}\n  \
            Cola: máximo {} tracks, {}ms entre tracks",
            self.application_id,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            self.opus_bitrate / 1000,
            self.audio_dir.display(),
            self.max_queue_size,
            self.track_cooldown_ms
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults: deben proveerse)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            // Audio defaults
            audio_dir: "./audio".into(),
            opus_bitrate: 96_000, // 96kbps (Discord default)
            track_cooldown_ms: 500,

            // Límites
            max_queue_size: 100,
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
    fn test_validate_rejects_bad_bitrate() {
        let mut config = Config::default();
        config.opus_bitrate = 600_000;
        assert!(config.validate().is_err());

        config.opus_bitrate = 4_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_queue() {
        let mut config = Config::default();
        config.max_queue_size = 0;
        assert!(config.validate().is_err());
    }
}
