use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Un track encolado: metadatos resueltos al agregar + buffer de frames
/// Opus que se llena de forma diferida en el primer intento de
/// reproducción.
#[derive(Debug, Clone)]
pub struct Track {
    /// Título para mostrar, resuelto una sola vez al encolar.
    pub title: String,
    /// Identificador opaco que la fuente usa para (re)localizar el audio.
    pub source_ref: String,
    /// Momento en que se agregó a la cola.
    #[allow(dead_code)]
    pub added_at: DateTime<Utc>,
    /// Frames Opus en orden de reproducción; vacío hasta cargarse.
    pub frames: Vec<Bytes>,
}

impl Track {
    pub fn new(title: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_ref: source_ref.into(),
            added_at: Utc::now(),
            frames: Vec::new(),
        }
    }

    /// Libera el buffer de audio para acotar la memoria de sesiones largas.
    pub fn clear_frames(&mut self) {
        if !self.frames.is_empty() {
            debug!("🧹 Buffer de audio liberado: {}", self.title);
            self.frames = Vec::new();
        }
    }

    #[allow(dead_code)]
    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_track_has_no_frames() {
        let track = Track::new("Never Gonna Give You Up", "dQw4w9WgXcQ");
        assert!(!track.has_frames());
        assert_eq!(track.frame_count(), 0);
        assert_eq!(track.source_ref, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_clear_frames_releases_buffer() {
        let mut track = Track::new("test", "abc");
        track.frames = vec![Bytes::from_static(b"xy"), Bytes::from_static(b"z")];
        assert_eq!(track.frame_count(), 2);

        track.clear_frames();
        assert!(!track.has_frames());
    }
}
