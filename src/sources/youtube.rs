use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

/// Subconjunto de la metadata JSON que emite yt-dlp.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: String,
}

/// Hosts aceptados como YouTube.
pub fn is_youtube_url(url: &Url) -> bool {
    matches!(
        url.host_str().map(str::to_ascii_lowercase).as_deref(),
        Some("www.youtube.com" | "youtube.com" | "music.youtube.com" | "youtu.be")
    )
}

/// Offset de arranque en segundos (`?t=90`), si la URL lo trae.
pub fn start_offset(url: &Url) -> Option<u64> {
    url.query_pairs()
        .find(|(k, _)| k == "t")
        .and_then(|(_, v)| v.trim_end_matches('s').parse().ok())
}

/// Extrae los ids de video de una URL: watch, shorts, enlaces cortos o
/// playlists (que expanden a varios ids).
pub async fn video_ids(url: &Url) -> Result<Vec<String>> {
    if url.path().contains("/playlist") {
        return expand_playlist(url).await;
    }

    let id = if url.path().contains("/watch") {
        url.query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
            .context("URL de watch sin parámetro v")?
    } else if let Some(rest) = url.path().strip_prefix("/shorts/") {
        rest.trim_end_matches('/').to_string()
    } else {
        // enlace corto youtu.be/<id>
        url.path().trim_matches('/').to_string()
    };

    if id.is_empty() {
        anyhow::bail!("no se pudo extraer un id de video de {url}");
    }
    Ok(vec![id])
}

/// Expande una playlist a sus ids con yt-dlp sin descargar nada.
async fn expand_playlist(url: &Url) -> Result<Vec<String>> {
    let output = tokio::process::Command::new("yt-dlp")
        .args(["--flat-playlist", "--print", "%(id)s", "--socket-timeout", "30"])
        .arg(url.as_str())
        .output()
        .await
        .context("no se pudo ejecutar yt-dlp")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("yt-dlp falló expandiendo la playlist: {stderr}");
    }

    let ids: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if ids.is_empty() {
        anyhow::bail!("la playlist no contiene videos");
    }
    Ok(ids)
}

/// Título del video vía la metadata JSON de yt-dlp.
pub async fn video_title(id: &str) -> Result<String> {
    let output = tokio::process::Command::new("yt-dlp")
        .args([
            "--dump-json",
            "--no-download",
            "--no-playlist",
            "--socket-timeout",
            "30",
        ])
        .arg(watch_url(id))
        .output()
        .await
        .context("no se pudo ejecutar yt-dlp")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("yt-dlp no pudo obtener la metadata de {id}: {stderr}");
    }

    let info: VideoInfo = serde_json::from_slice(&output.stdout)
        .with_context(|| format!("parseando metadata de yt-dlp para {id}"))?;
    Ok(info.title)
}

/// Descarga el audio de un video al directorio de trabajo y devuelve la
/// ruta del archivo resultante.
pub async fn download_audio(id: &str, workdir: &Path) -> Result<PathBuf> {
    let dest = workdir.join(format!("{id}.opus"));
    let template = workdir.join(id);

    let output = tokio::process::Command::new("yt-dlp")
        .args([
            "-x",
            "--audio-format",
            "opus",
            "--audio-quality",
            "0",
            "--no-playlist",
            "--socket-timeout",
            "30",
            "--retries",
            "3",
            "-o",
        ])
        .arg(&template)
        .arg(watch_url(id))
        .output()
        .await
        .context("no se pudo ejecutar yt-dlp")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("yt-dlp no pudo descargar {id}: {stderr}");
    }
    if tokio::fs::metadata(&dest).await.is_err() {
        anyhow::bail!("yt-dlp terminó sin producir {}", dest.display());
    }
    Ok(dest)
}

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}
