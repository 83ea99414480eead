use std::collections::VecDeque;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::{audio::track::Track, error::PlayerError};

/// Cola ordenada de tracks compartida entre la capa de comandos y el loop
/// de streaming.
///
/// Toda mutación ocurre bajo el lock exclusivo interno, que se sostiene
/// solo durante la mutación estructural, nunca a través de E/S ni de un
/// `.await`. Las comprobaciones compuestas (¿vacía? + tomar la cabeza) se
/// hacen en una sola adquisición del lock.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: Mutex<VecDeque<Track>>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Agrega un track al final de la cola. Nunca falla.
    pub fn enqueue(&self, track: Track) {
        let mut items = self.items.lock();
        info!("➕ Agregado a la cola: {}", track.title);
        items.push_back(track);
    }

    /// Elimina el track en la posición `index` (1-based, como se presenta
    /// al usuario) y devuelve su título.
    pub fn remove_at(&self, index: usize) -> Result<String, PlayerError> {
        let mut items = self.items.lock();
        if index < 1 || index > items.len() {
            return Err(PlayerError::OutOfRange(index));
        }

        // remove() desplaza los elementos posteriores una posición abajo
        let removed = items
            .remove(index - 1)
            .ok_or(PlayerError::OutOfRange(index))?;
        debug!("❌ Eliminado de la cola: {} (posición {})", removed.title, index);
        Ok(removed.title)
    }

    /// Copia de la cabeza de la cola, o `None` si está vacía.
    pub fn peek_head(&self) -> Option<Track> {
        self.items.lock().front().cloned()
    }

    /// Extrae la cabeza de la cola.
    pub fn pop_head(&self) -> Result<Track, PlayerError> {
        self.items.lock().pop_front().ok_or(PlayerError::QueueEmpty)
    }

    /// Permutación aleatoria uniforme en el lugar.
    ///
    /// Con `exclude_head` la cabeza (el track en reproducción) queda fija
    /// y solo se mezclan los tracks que aún no empezaron.
    pub fn shuffle(&self, exclude_head: bool) {
        let mut items = self.items.lock();
        let start = usize::from(exclude_head);
        if items.len() <= start + 1 {
            return;
        }

        let mut rng = rand::thread_rng();
        items.make_contiguous()[start..].shuffle(&mut rng);
        info!("🔀 Cola mezclada ({} tracks)", items.len() - start);
    }

    /// Vacía la cola. No detiene un stream en curso: el loop observa el
    /// vaciado recién en el siguiente límite de track.
    pub fn clear(&self) {
        let mut items = self.items.lock();
        items.clear();
        info!("🗑️ Cola limpiada");
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Copia puntual de la cola para listados. El llamador recibe clones;
    /// mutarlos no afecta a la cola.
    pub fn snapshot(&self) -> Vec<Track> {
        self.items.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn track(title: &str) -> Track {
        Track::new(title, title.to_lowercase())
    }

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue.snapshot().into_iter().map(|t| t.title).collect()
    }

    #[test]
    fn test_survivors_keep_insertion_order() {
        let queue = TrackQueue::new();
        for name in ["a", "b", "c", "d", "e"] {
            queue.enqueue(track(name));
        }

        assert_eq!(queue.remove_at(2).unwrap(), "b");
        assert_eq!(queue.remove_at(3).unwrap(), "d");

        assert_eq!(titles(&queue), vec!["a", "c", "e"]);
    }

    #[test]
    fn test_remove_out_of_range_leaves_queue_unchanged() {
        let queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));

        for bad in [0, 3, 99] {
            match queue.remove_at(bad) {
                Err(PlayerError::OutOfRange(i)) => assert_eq!(i, bad),
                other => panic!("se esperaba OutOfRange, llegó {other:?}"),
            }
        }
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn test_remove_on_empty_queue_is_out_of_range() {
        let queue = TrackQueue::new();
        assert!(matches!(queue.remove_at(1), Err(PlayerError::OutOfRange(1))));
    }

    #[test]
    fn test_pop_head_is_fifo() {
        let queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));

        assert_eq!(queue.peek_head().unwrap().title, "a");
        assert_eq!(queue.pop_head().unwrap().title, "a");
        assert_eq!(queue.pop_head().unwrap().title, "b");
        assert!(matches!(queue.pop_head(), Err(PlayerError::QueueEmpty)));
        assert!(queue.peek_head().is_none());
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let queue = TrackQueue::new();
        let mut expected: Vec<String> = Vec::new();
        for i in 0..32 {
            let name = format!("track-{i}");
            expected.push(name.clone());
            queue.enqueue(Track::new(name, format!("{i}")));
        }

        queue.shuffle(false);

        let mut after = titles(&queue);
        assert_eq!(after.len(), expected.len());
        after.sort();
        expected.sort();
        assert_eq!(after, expected);
    }

    #[test]
    fn test_shuffle_excluding_head_keeps_head_fixed() {
        let queue = TrackQueue::new();
        for i in 0..16 {
            queue.enqueue(Track::new(format!("track-{i}"), format!("{i}")));
        }

        queue.shuffle(true);
        assert_eq!(queue.peek_head().unwrap().title, "track-0");
        assert_eq!(queue.len(), 16);
    }

    #[test]
    fn test_shuffle_on_tiny_queue_is_noop() {
        let queue = TrackQueue::new();
        queue.enqueue(track("only"));
        queue.shuffle(false);
        assert_eq!(titles(&queue), vec!["only"]);
        queue.shuffle(true);
        assert_eq!(titles(&queue), vec!["only"]);
    }

    #[test]
    fn test_clear_empties_queue() {
        let queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_concurrent_enqueue_never_loses_tracks() {
        let queue = Arc::new(TrackQueue::new());
        let mut handles = Vec::new();

        for worker in 0..8 {
            let queue = queue.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    queue.enqueue(Track::new(
                        format!("w{worker}-t{i}"),
                        format!("{worker}:{i}"),
                    ));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let all = titles(&queue);
        assert_eq!(all.len(), 400);

        // cada track aparece exactamente una vez y el orden por worker se
        // preserva (cada enqueue agrega al final bajo el lock)
        let mut unique = all.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 400);

        for worker in 0..8 {
            let per_worker: Vec<_> = all
                .iter()
                .filter(|t| t.starts_with(&format!("w{worker}-")))
                .cloned()
                .collect();
            let expected: Vec<_> = (0..50).map(|i| format!("w{worker}-t{i}")).collect();
            assert_eq!(per_worker, expected);
        }
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let queue = TrackQueue::new();
        queue.enqueue(track("a"));
        let snap = queue.snapshot();
        queue.enqueue(track("b"));

        assert_eq!(snap.len(), 1);
        assert_eq!(queue.len(), 2);
    }
}
