use rand::seq::SliceRandom;
use serenity::model::id::ChannelId;
use std::collections::VecDeque;
use tracing::{debug, info};

use super::{PlayerError, PlayerResult};
use crate::sources::Track;

/// Estado de reproducción de un guild. Una instancia por guild activo,
/// propiedad exclusiva del controlador.
///
/// Invariantes:
/// - `loop_queue` y `loop_track` nunca están activos a la vez
/// - `current != None` implica que el transporte reproduce (o está por
///   reproducir) esa pista; `current == None` implica transporte ocioso
#[derive(Debug)]
pub struct GuildPlayback {
    queue: VecDeque<Track>,
    current: Option<Track>,
    loop_queue: bool,
    loop_track: bool,
    volume: f32,
    announce_channel: Option<ChannelId>,
}

impl GuildPlayback {
    pub fn new(volume: f32) -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            loop_queue: false,
            loop_track: false,
            volume,
            announce_channel: None,
        }
    }

    /// Agrega una pista al final de la cola. Devuelve su posición 1-based.
    pub fn enqueue(&mut self, track: Track) -> usize {
        info!("➕ Agregado a la cola: {}", track.title());
        self.queue.push_back(track);
        self.queue.len()
    }

    /// Protocolo de fin de pista + política de selección, en una sola
    /// transición:
    ///
    /// 1. Si `loop_track` está activo y hay pista actual, se repite en el
    ///    acto sin tocar la cola.
    /// 2. Si no, la actual se retira; con `loop_queue` activo se re-agrega
    ///    al final de la cola antes de sacar la siguiente (una cola de una
    ///    sola pista se repite inmediatamente).
    /// 3. Se saca la cabeza de la cola (FIFO). Cola vacía => guild ocioso.
    pub fn finish_and_select_next(&mut self) -> Option<Track> {
        if self.loop_track {
            if let Some(current) = &self.current {
                info!("🔂 Repitiendo pista: {}", current.title());
                return Some(current.clone());
            }
        }

        let finished = self.current.take();

        if self.loop_queue {
            if let Some(finished) = finished {
                info!("🔁 Re-agregada al final por loop de cola: {}", finished.title());
                self.queue.push_back(finished);
            }
        }

        match self.queue.pop_front() {
            Some(next) => {
                debug!("➡️ Siguiente en cola (FIFO): {}", next.title());
                self.current = Some(next.clone());
                Some(next)
            }
            None => {
                debug!("📭 Cola vacía, guild ocioso");
                None
            }
        }
    }

    /// Descarta la pista actual sin reproducirla de nuevo. Se usa cuando el
    /// arranque falla: la pista se pierde tras un único intento, aunque
    /// `loop_track` esté activo.
    pub fn drop_current(&mut self) {
        if let Some(dropped) = self.current.take() {
            debug!("🗑️ Pista descartada tras fallo: {}", dropped.title());
        }
    }

    /// Vacía cola y pista actual. Los modos de repetición (y el volumen) se
    /// conservan; eso distingue a `stop` de un cleanup completo.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.current = None;
        info!("⏹️ Cola y pista actual limpiadas");
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    // Modos de repetición. Activar uno apaga el otro.

    pub fn toggle_loop_queue(&mut self) -> bool {
        self.loop_queue = !self.loop_queue;
        if self.loop_queue {
            self.loop_track = false;
        }
        self.loop_queue
    }

    pub fn toggle_loop_track(&mut self) -> bool {
        self.loop_track = !self.loop_track;
        if self.loop_track {
            self.loop_queue = false;
        }
        self.loop_track
    }

    /// Un salto manual siempre avanza, incluso con loop de pista activo.
    pub fn disable_loop_track(&mut self) {
        self.loop_track = false;
    }

    pub fn loop_queue(&self) -> bool {
        self.loop_queue
    }

    pub fn loop_track(&self) -> bool {
        self.loop_track
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 2.0);
    }

    pub fn announce_channel(&self) -> Option<ChannelId> {
        self.announce_channel
    }

    pub fn set_announce_channel(&mut self, channel_id: ChannelId) {
        self.announce_channel = Some(channel_id);
    }

    /// Mezcla la cola: snapshot ordenado, permutación, reemplazo atómico.
    /// La pista actual no se toca.
    pub fn shuffle(&mut self) {
        let mut items: Vec<Track> = self.queue.drain(..).collect();
        items.shuffle(&mut rand::thread_rng());
        self.queue = items.into();
        info!("🔀 Cola mezclada ({} pistas)", self.queue.len());
    }

    /// Quita la pista en la posición 1-based dada.
    pub fn remove_at(&mut self, position: usize) -> PlayerResult<Track> {
        if self.queue.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        if position == 0 || position > self.queue.len() {
            return Err(PlayerError::InvalidIndex(position));
        }

        let mut items: Vec<Track> = self.queue.drain(..).collect();
        let removed = items.remove(position - 1);
        self.queue = items.into();

        info!("🗑️ Quitada de la cola: {}", removed.title());
        Ok(removed)
    }

    /// Quita la única pista cuyo título contiene el texto dado (sin
    /// distinguir mayúsculas). Cero coincidencias o más de una fallan sin
    /// modificar la cola.
    pub fn remove_matching(&mut self, needle: &str) -> PlayerResult<Track> {
        if self.queue.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }

        let needle_lower = needle.to_lowercase();
        let matches: Vec<usize> = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, track)| track.title().to_lowercase().contains(&needle_lower))
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [] => Err(PlayerError::NoMatch(needle.to_string())),
            [index] => {
                let mut items: Vec<Track> = self.queue.drain(..).collect();
                let removed = items.remove(*index);
                self.queue = items.into();
                info!("🗑️ Quitada de la cola: {}", removed.title());
                Ok(removed)
            }
            many => Err(PlayerError::AmbiguousMatch(
                many.iter()
                    .map(|&i| self.queue[i].title().to_string())
                    .collect(),
            )),
        }
    }

    /// Snapshot de solo lectura para la capa de presentación.
    pub fn snapshot(&self, limit: usize) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current.clone(),
            upcoming: self.queue.iter().take(limit).cloned().collect(),
            total: self.queue.len(),
            loop_queue: self.loop_queue,
            loop_track: self.loop_track,
            volume: self.volume,
        }
    }
}

/// Vista inmutable del estado de un guild: pista actual, primeras N de la
/// cola y modos activos. Es lo único que ve la capa de presentación.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
    pub total: usize,
    pub loop_queue: bool,
    pub loop_track: bool,
    pub volume: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::new(
            title.to_string(),
            format!("https://www.youtube.com/watch?v={}", title),
        )
    }

    fn titles(state: &GuildPlayback) -> Vec<String> {
        state
            .snapshot(usize::MAX)
            .upcoming
            .iter()
            .map(|t| t.title().to_string())
            .collect()
    }

    #[test]
    fn test_loop_flags_are_mutually_exclusive() {
        let mut state = GuildPlayback::new(0.5);

        assert!(state.toggle_loop_queue());
        assert!(state.toggle_loop_track());
        assert!(!state.loop_queue());

        assert!(state.toggle_loop_queue());
        assert!(!state.loop_track());

        // Apagar un modo no enciende el otro
        assert!(!state.toggle_loop_queue());
        assert!(!state.loop_queue());
        assert!(!state.loop_track());
    }

    #[test]
    fn test_fifo_order_then_idle() {
        let mut state = GuildPlayback::new(0.5);
        state.enqueue(track("A"));
        state.enqueue(track("B"));
        state.enqueue(track("C"));

        let mut played = Vec::new();
        while let Some(next) = state.finish_and_select_next() {
            played.push(next.title().to_string());
        }

        assert_eq!(played, vec!["A", "B", "C"]);
        assert!(state.current().is_none());
        assert!(state.is_queue_empty());
    }

    #[test]
    fn test_loop_track_replays_current_without_touching_queue() {
        let mut state = GuildPlayback::new(0.5);
        state.enqueue(track("A"));
        assert_eq!(state.finish_and_select_next().unwrap().title(), "A");

        state.enqueue(track("B"));
        state.enqueue(track("C"));
        state.toggle_loop_track();

        // A termina y vuelve a sonar; B y C siguen intactas
        assert_eq!(state.finish_and_select_next().unwrap().title(), "A");
        assert_eq!(state.finish_and_select_next().unwrap().title(), "A");
        assert_eq!(titles(&state), vec!["B", "C"]);
    }

    #[test]
    fn test_loop_queue_with_empty_queue_repeats_current() {
        let mut state = GuildPlayback::new(0.5);
        state.enqueue(track("A"));
        assert_eq!(state.finish_and_select_next().unwrap().title(), "A");

        state.toggle_loop_queue();

        // Re-agregada y re-seleccionada en el acto
        assert_eq!(state.finish_and_select_next().unwrap().title(), "A");
        assert_eq!(state.finish_and_select_next().unwrap().title(), "A");
    }

    #[test]
    fn test_loop_queue_reappends_behind_existing_items() {
        let mut state = GuildPlayback::new(0.5);
        state.enqueue(track("A"));
        assert_eq!(state.finish_and_select_next().unwrap().title(), "A");

        state.enqueue(track("B"));
        state.toggle_loop_queue();

        // A termina: la cola pasa a [B, A], suena B y después A
        assert_eq!(state.finish_and_select_next().unwrap().title(), "B");
        assert_eq!(titles(&state), vec!["A"]);
        assert_eq!(state.finish_and_select_next().unwrap().title(), "A");
    }

    #[test]
    fn test_first_start_skips_loop_checks() {
        let mut state = GuildPlayback::new(0.5);
        state.toggle_loop_queue();
        state.enqueue(track("A"));

        // Sin pista actual no hay nada que re-agregar
        assert_eq!(state.finish_and_select_next().unwrap().title(), "A");
        assert!(state.is_queue_empty());
        assert_eq!(state.current().unwrap().title(), "A");
    }

    #[test]
    fn test_failed_track_is_dropped_not_retried() {
        let mut state = GuildPlayback::new(0.5);
        state.enqueue(track("A"));
        state.enqueue(track("B"));
        state.toggle_loop_track();

        // A arranca, el transporte rechaza el stream, A se descarta
        assert_eq!(state.finish_and_select_next().unwrap().title(), "A");
        state.drop_current();

        // El siguiente intento toma B aunque loop de pista siga activo
        assert_eq!(state.finish_and_select_next().unwrap().title(), "B");
    }

    #[test]
    fn test_reset_preserves_loop_flags() {
        let mut state = GuildPlayback::new(0.5);
        state.enqueue(track("A"));
        state.finish_and_select_next();
        state.enqueue(track("B"));
        state.toggle_loop_queue();

        state.reset();

        assert!(state.current().is_none());
        assert!(state.is_queue_empty());
        assert!(state.loop_queue());
    }

    #[test]
    fn test_remove_by_text_ambiguity_leaves_queue_unchanged() {
        let mut state = GuildPlayback::new(0.5);
        state.enqueue(track("Intro"));
        state.enqueue(track("Outro"));
        state.enqueue(track("intro (remix)"));

        match state.remove_matching("intro") {
            Err(PlayerError::AmbiguousMatch(candidates)) => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("se esperaba AmbiguousMatch, se obtuvo {:?}", other),
        }
        assert_eq!(state.queue_len(), 3);

        // Por índice 1-based sí se puede quitar
        let removed = state.remove_at(1).unwrap();
        assert_eq!(removed.title(), "Intro");
        assert_eq!(titles(&state), vec!["Outro", "intro (remix)"]);
    }

    #[test]
    fn test_remove_by_text_single_match_and_miss() {
        let mut state = GuildPlayback::new(0.5);
        state.enqueue(track("Bohemian Rhapsody"));
        state.enqueue(track("Under Pressure"));

        let removed = state.remove_matching("PRESSURE").unwrap();
        assert_eq!(removed.title(), "Under Pressure");

        assert!(matches!(
            state.remove_matching("pressure"),
            Err(PlayerError::NoMatch(_))
        ));
        assert_eq!(state.queue_len(), 1);
    }

    #[test]
    fn test_remove_at_out_of_range() {
        let mut state = GuildPlayback::new(0.5);
        state.enqueue(track("A"));

        assert!(matches!(state.remove_at(0), Err(PlayerError::InvalidIndex(0))));
        assert!(matches!(state.remove_at(2), Err(PlayerError::InvalidIndex(2))));
        assert_eq!(state.queue_len(), 1);
    }

    #[test]
    fn test_shuffle_preserves_tracks_and_current() {
        let mut state = GuildPlayback::new(0.5);
        state.enqueue(track("A"));
        state.finish_and_select_next();
        for title in ["B", "C", "D", "E"] {
            state.enqueue(track(title));
        }

        state.shuffle();

        let mut after = titles(&state);
        after.sort();
        assert_eq!(after, vec!["B", "C", "D", "E"]);
        assert_eq!(state.current().unwrap().title(), "A");
    }

    #[test]
    fn test_snapshot_limits_upcoming() {
        let mut state = GuildPlayback::new(0.5);
        for i in 0..15 {
            state.enqueue(track(&format!("T{i:02}")));
        }

        let snapshot = state.snapshot(10);
        assert_eq!(snapshot.upcoming.len(), 10);
        assert_eq!(snapshot.total, 15);
        assert_eq!(snapshot.upcoming[0].title(), "T00");
    }
}
