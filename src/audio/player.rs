use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tracing::info;

use crate::{
    audio::{
        controller::{PlaybackController, PlayerState},
        queue::TrackQueue,
        track::Track,
    },
    error::PlayerError,
    sources::FrameSource,
    voice::VoiceSink,
};

/// Fachada del motor de reproducción hacia la capa de comandos.
///
/// Reúne la cola, el controlador y la fuente de frames. Una sola cola y un
/// solo destino de reproducción a la vez; el controlador garantiza que
/// nunca corran dos loops.
pub struct Player {
    queue: Arc<TrackQueue>,
    controller: PlaybackController,
    source: Arc<dyn FrameSource>,
    max_queue_size: usize,
}

impl Player {
    pub fn new(source: Arc<dyn FrameSource>, cooldown: Duration, max_queue_size: usize) -> Self {
        let queue = Arc::new(TrackQueue::new());
        let controller = PlaybackController::new(queue.clone(), source.clone(), cooldown);
        Self {
            queue,
            controller,
            source,
            max_queue_size,
        }
    }

    /// Resuelve una referencia y encola los tracks resultantes; devuelve
    /// los títulos agregados.
    ///
    /// El tope de cola configurado se aplica acá, antes de resolver: el
    /// `enqueue` de la cola en sí nunca falla.
    pub async fn enqueue(&self, reference: &str) -> Result<Vec<String>> {
        let space = self.max_queue_size.saturating_sub(self.queue.len());
        if space == 0 {
            anyhow::bail!("la cola está llena (máximo {} tracks)", self.max_queue_size);
        }

        let resolved = self.source.resolve(reference).await?;
        let accepted = resolved.len().min(space);
        if accepted < resolved.len() {
            info!("➕ Cola casi llena: se aceptan {accepted} de {} tracks", resolved.len());
        }

        let mut titles = Vec::with_capacity(accepted);
        for meta in resolved.into_iter().take(accepted) {
            titles.push(meta.title.clone());
            self.queue.enqueue(Track::new(meta.title, meta.source_ref));
        }
        Ok(titles)
    }

    /// Elimina por posición 1-based y devuelve el título eliminado.
    pub fn remove_at(&self, index: usize) -> Result<String, PlayerError> {
        self.queue.remove_at(index)
    }

    /// Copia puntual de la cola para listados.
    pub fn snapshot(&self) -> Vec<Track> {
        self.queue.snapshot()
    }

    /// Mezcla la cola. Con un loop activo la cabeza (el track sonando)
    /// queda fija; inactivo, se mezcla todo.
    pub fn shuffle(&self) {
        self.queue.shuffle(self.controller.is_active());
    }

    pub fn clear(&self) {
        self.queue.clear();
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    #[allow(dead_code)]
    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn state(&self) -> PlayerState {
        self.controller.state()
    }

    pub fn is_active(&self) -> bool {
        self.controller.is_active()
    }

    pub async fn start(&self, sink: Arc<dyn VoiceSink>) -> Result<(), PlayerError> {
        self.controller.start(sink).await
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        self.controller.pause().await
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        self.controller.resume().await
    }

    pub async fn skip(&self) -> Result<(), PlayerError> {
        self.controller.skip().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::{LoadError, SinkError}, sources::TrackMetadata};
    use async_trait::async_trait;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    /// Fuente trivial: cada referencia resuelve a un track homónimo con
    /// tres frames.
    struct EchoSource;

    #[async_trait]
    impl FrameSource for EchoSource {
        async fn resolve(&self, reference: &str) -> Result<Vec<TrackMetadata>> {
            Ok(vec![TrackMetadata {
                title: reference.to_uppercase(),
                source_ref: reference.to_string(),
            }])
        }

        async fn load_frames(&self, track: &Track) -> Result<Vec<Bytes>, LoadError> {
            Ok((0..3)
                .map(|i| Bytes::from(format!("{}:{i}", track.source_ref)))
                .collect())
        }
    }

    /// Sink lento para mantener el loop vivo durante las aserciones.
    struct SlowSink;

    #[async_trait]
    impl VoiceSink for SlowSink {
        async fn set_speaking(&self, _speaking: bool) -> Result<(), SinkError> {
            Ok(())
        }

        async fn send_frame(&self, _frame: Bytes) -> Result<(), SinkError> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn player(max: usize) -> Player {
        Player::new(Arc::new(EchoSource), Duration::from_millis(1), max)
    }

    #[tokio::test]
    async fn test_enqueue_resolves_titles() {
        let player = player(10);
        let titles = player.enqueue("hola").await.unwrap();
        assert_eq!(titles, vec!["HOLA"]);
        assert_eq!(player.queue_len(), 1);
        assert_eq!(player.snapshot()[0].title, "HOLA");
    }

    #[tokio::test]
    async fn test_enqueue_respects_queue_cap() {
        let player = player(2);
        player.enqueue("a").await.unwrap();
        player.enqueue("b").await.unwrap();
        assert!(player.enqueue("c").await.is_err());
        assert_eq!(player.queue_len(), 2);
    }

    #[tokio::test]
    async fn test_shuffle_keeps_playing_head_fixed() {
        let player = player(64);
        for i in 0..16 {
            player.enqueue(&format!("t{i}")).await.unwrap();
        }

        player.start(Arc::new(SlowSink)).await.unwrap();
        assert!(player.is_active());

        player.shuffle();
        // con el loop activo la cabeza no se mueve
        assert_eq!(player.snapshot()[0].title, "T0");
    }

    #[tokio::test]
    async fn test_idle_shuffle_is_full_permutation() {
        let player = player(64);
        let mut expected = Vec::new();
        for i in 0..24 {
            expected.push(format!("T{i}"));
            player.enqueue(&format!("t{i}")).await.unwrap();
        }

        player.shuffle();

        let mut titles: Vec<_> = player.snapshot().into_iter().map(|t| t.title).collect();
        assert_eq!(titles.len(), expected.len());
        titles.sort();
        expected.sort();
        assert_eq!(titles, expected);
    }
}
