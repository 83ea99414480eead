//! # Sources Module
//!
//! Track resolution and frame acquisition for the playback engine.
//!
//! The engine consumes the [`FrameSource`] trait and does not care how
//! frames are produced. The production implementation,
//! [`CachedOpusSource`], resolves YouTube URLs and HTTP attachments,
//! downloads audio with `yt-dlp`, transcodes it with `ffmpeg` into 20 ms
//! Opus frames and keeps one frame-cache file per track so replays skip
//! the whole pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    audio::{frames, track::Track},
    error::LoadError,
};

pub mod attachment;
pub mod transcode;
pub mod youtube;

/// Metadatos de un track recién resuelto, listos para encolar.
#[derive(Debug, Clone)]
pub struct TrackMetadata {
    pub title: String,
    pub source_ref: String,
}

/// Capacidad de resolución y carga de frames que consume el motor.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Resuelve una referencia (URL o adjunto) en uno o más tracks,
    /// dejando sus frames listos en caché. Una playlist produce varios.
    async fn resolve(&self, reference: &str) -> Result<Vec<TrackMetadata>>;

    /// Carga la secuencia de frames de un track ya resuelto. Determinista
    /// y re-reproducible: la misma referencia produce los mismos frames.
    async fn load_frames(&self, track: &Track) -> Result<Vec<Bytes>, LoadError>;
}

/// Fuente de producción: yt-dlp + ffmpeg + caché de frames Opus.
pub struct CachedOpusSource {
    audio_dir: PathBuf,
    http: reqwest::Client,
    opus_bitrate: u32,
}

impl CachedOpusSource {
    pub fn new(audio_dir: PathBuf, opus_bitrate: u32) -> Self {
        Self {
            audio_dir,
            http: reqwest::Client::new(),
            opus_bitrate,
        }
    }

    fn cache_path(&self, source_ref: &str) -> PathBuf {
        self.audio_dir.join(format!("{source_ref}.dca"))
    }

    /// Resuelve un video de YouTube: título primero (falla rápido con ids
    /// inválidos) y después caché o descarga + transcodificación.
    async fn resolve_video(&self, id: &str, start_offset: Option<u64>) -> Result<TrackMetadata> {
        let title = youtube::video_title(id).await?;
        let cache = self.cache_path(id);

        if tokio::fs::metadata(&cache).await.is_ok() {
            debug!("💾 Caché de frames reutilizada: {}", title);
        } else {
            let workdir = tempfile::tempdir().context("no se pudo crear directorio temporal")?;
            let downloaded = youtube::download_audio(id, workdir.path()).await?;
            transcode::to_frame_cache(&downloaded, &cache, self.opus_bitrate, start_offset)
                .await
                .with_context(|| format!("transcodificando {id}"))?;
            info!("⬇️ Audio descargado y transcodificado: {}", title);
        }

        Ok(TrackMetadata {
            title,
            source_ref: id.to_string(),
        })
    }

    /// Resuelve un adjunto HTTP: el título sale del nombre de archivo.
    async fn resolve_attachment(&self, url: &str) -> Result<TrackMetadata> {
        let name = attachment::file_stem(url)?;
        let cache = self.cache_path(&name);

        if tokio::fs::metadata(&cache).await.is_err() {
            let workdir = tempfile::tempdir().context("no se pudo crear directorio temporal")?;
            let downloaded = attachment::download(&self.http, url, workdir.path()).await?;
            transcode::to_frame_cache(&downloaded, &cache, self.opus_bitrate, None)
                .await
                .with_context(|| format!("transcodificando adjunto {name}"))?;
            info!("📎 Adjunto descargado y transcodificado: {}", name);
        }

        Ok(TrackMetadata {
            title: name.clone(),
            source_ref: name,
        })
    }
}

#[async_trait]
impl FrameSource for CachedOpusSource {
    async fn resolve(&self, reference: &str) -> Result<Vec<TrackMetadata>> {
        let url = Url::parse(reference).with_context(|| format!("URL inválida: {reference}"))?;

        if !youtube::is_youtube_url(&url) {
            return Ok(vec![self.resolve_attachment(reference).await?]);
        }

        let ids = youtube::video_ids(&url).await?;
        let start_offset = youtube::start_offset(&url);

        let mut tracks = Vec::with_capacity(ids.len());
        for id in &ids {
            // un ítem fallido no aborta el lote completo
            match self.resolve_video(id, start_offset).await {
                Ok(meta) => tracks.push(meta),
                Err(e) => warn!("⚠️ No se pudo resolver {id}: {e:#}"),
            }
        }

        if tracks.is_empty() {
            anyhow::bail!("no se pudo resolver ningún track de {reference}");
        }
        Ok(tracks)
    }

    async fn load_frames(&self, track: &Track) -> Result<Vec<Bytes>, LoadError> {
        let path = self.cache_path(&track.source_ref);
        let data = read_cache_file(&path).await?;
        frames::read_frames(&data[..])
    }
}

async fn read_cache_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LoadError::Missing(path.display().to_string()))
        }
        Err(e) => Err(LoadError::Io(e)),
    }
}
