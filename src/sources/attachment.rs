use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Nombre base (sin extensión) del archivo referenciado por la URL; se usa
/// como título y como clave de caché del adjunto.
pub fn file_stem(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).with_context(|| format!("URL de adjunto inválida: {url}"))?;
    let file_name = parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|s| !s.is_empty())
        .context("la URL del adjunto no tiene nombre de archivo")?;

    let stem = file_name
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .context("nombre de adjunto vacío")?;

    // la clave termina en el sistema de archivos: solo caracteres mansos
    let safe: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    Ok(safe)
}

/// Descarga el adjunto al directorio de trabajo.
pub async fn download(http: &reqwest::Client, url: &str, workdir: &Path) -> Result<PathBuf> {
    let response = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("descargando adjunto {url}"))?
        .error_for_status()
        .context("el servidor rechazó la descarga del adjunto")?;

    let data = response.bytes().await.context("leyendo cuerpo del adjunto")?;
    let dest = workdir.join("attachment.bin");
    tokio::fs::write(&dest, &data)
        .await
        .with_context(|| format!("escribiendo {}", dest.display()))?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_stem_from_attachment_url() {
        let stem = file_stem("https://cdn.example.com/files/1234/my-song.mp3").unwrap();
        assert_eq!(stem, "my-song");
    }

    #[test]
    fn test_file_stem_sanitizes_odd_characters() {
        let stem = file_stem("https://cdn.example.com/a/b/mi%20canci%C3%B3n.ogg");
        // los segmentos vienen percent-encoded; todo lo no alfanumérico se achata
        assert!(stem.unwrap().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_file_stem_without_name_fails() {
        assert!(file_stem("https://cdn.example.com/").is_err());
    }
}
