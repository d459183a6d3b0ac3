use dashmap::DashMap;
use serenity::builder::CreateMessage;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId};
use songbird::tracks::{PlayMode, TrackHandle};
use songbird::{Call, Event, Songbird, TrackEvent};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::events::{TrackEndHandler, TrackErrorHandler};
use super::state::{GuildPlayback, QueueSnapshot};
use super::{PlayerError, PlayerResult};
use crate::sources::Track;

/// Resultado de encolar una pista.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// El transporte estaba ocioso y la pista arrancó de inmediato.
    Started(Track),
    /// Había algo sonando; la pista espera en la posición 1-based dada.
    Queued(Track, usize),
    /// El transporte ya no estaba conectado: el estado se limpió y la
    /// pista se descartó (cubre un resolve que termina después del cleanup).
    Disconnected,
}

/// Resultado interno del algoritmo de avance.
enum Advanced {
    Started(Track),
    Idle,
    Disconnected,
}

/// Controlador de reproducción: dueño único del mapa guild -> estado.
///
/// Toda mutación del estado de un guild pasa por el mutex de su sesión;
/// las cadenas submit -> advance -> fin de pista -> advance se serializan
/// por guild manteniendo ese lock durante todo el avance, incluido el
/// arranque en el transporte. Guilds distintos no se bloquean entre sí.
///
/// Clonarlo es barato: los clones comparten el mismo estado interno, lo
/// que permite engancharlo en los callbacks de songbird.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    songbird: Arc<Songbird>,
    sessions: DashMap<GuildId, Arc<Mutex<GuildPlayback>>>,
    current_handles: DashMap<GuildId, TrackHandle>,
    default_volume: f32,
    http: OnceLock<Arc<Http>>,
}

impl PlaybackController {
    pub fn new(songbird: Arc<Songbird>, default_volume: f32) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                songbird,
                sessions: DashMap::new(),
                current_handles: DashMap::new(),
                default_volume,
                http: OnceLock::new(),
            }),
        }
    }

    /// Guarda el cliente HTTP para poder anunciar pistas que arrancan
    /// desde el callback de fin (donde no hay Context disponible).
    pub fn attach_http(&self, http: Arc<Http>) {
        let _ = self.inner.http.set(http);
    }

    /// Crea el estado del guild si no existe. Idempotente.
    pub fn ensure_state(&self, guild_id: GuildId) {
        self.get_or_create(guild_id);
    }

    fn get_or_create(&self, guild_id: GuildId) -> Arc<Mutex<GuildPlayback>> {
        self.inner
            .sessions
            .entry(guild_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(GuildPlayback::new(self.inner.default_volume)))
            })
            .clone()
    }

    fn session(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildPlayback>>> {
        self.inner.sessions.get(&guild_id).map(|s| s.clone())
    }

    /// Elimina el estado del guild por completo y fuerza la desconexión.
    /// Idempotente: sobre un guild ausente no hace nada más que un posible
    /// intento de desconexión.
    ///
    /// El estado se retira del mapa antes de parar el transporte, así el
    /// callback de fin que dispara ese stop encuentra el guild ausente y
    /// no resucita la reproducción.
    pub async fn cleanup(&self, guild_id: GuildId) {
        if self.inner.sessions.remove(&guild_id).is_some() {
            info!("🧹 Estado de reproducción eliminado para guild {}", guild_id);
        }

        if let Some((_, handle)) = self.inner.current_handles.remove(&guild_id) {
            let _ = handle.stop();
        }

        if self.inner.songbird.get(guild_id).is_some() {
            if let Err(e) = self.inner.songbird.remove(guild_id).await {
                debug!("Desconexión durante cleanup de {}: {:?}", guild_id, e);
            }
        }
    }

    /// Vacía la cola y la pista actual pero conserva los modos de
    /// repetición. Es la semántica de `stop`, en contraste con `cleanup`.
    pub async fn reset_state(&self, guild_id: GuildId) -> PlayerResult<()> {
        let session = self.session(guild_id).ok_or(PlayerError::NothingPlaying)?;
        session.lock().await.reset();

        // El stop dispara el callback de fin, que ve cola vacía y queda ocioso
        if let Some(handle) = self.inner.current_handles.get(&guild_id) {
            let _ = handle.stop();
        }
        Ok(())
    }

    /// Encola una pista y, si el transporte está ocioso, arranca la
    /// reproducción en esta misma llamada. La decisión encolar-y-quizá-
    /// arrancar ocurre bajo el lock de la sesión, así no puede cruzarse
    /// con un callback de fin y arrancar dos pistas a la vez.
    pub async fn submit(&self, guild_id: GuildId, track: Track) -> PlayerResult<SubmitOutcome> {
        let session = self.get_or_create(guild_id);
        let mut state = session.lock().await;

        let queued = track.clone();
        let position = state.enqueue(track);

        if self.transport_busy(guild_id).await {
            return Ok(SubmitOutcome::Queued(queued, position));
        }

        match self.advance_locked(guild_id, &mut state, false).await {
            Advanced::Started(track) => Ok(SubmitOutcome::Started(track)),
            Advanced::Disconnected => Ok(SubmitOutcome::Disconnected),
            Advanced::Idle => Err(PlayerError::Playback(
                "no se pudo iniciar la reproducción".to_string(),
            )),
        }
    }

    /// Callback de fin de pista (re-entrada desde el driver de voz, ya
    /// traspasada al contexto del controlador vía spawn). Si el guild fue
    /// limpiado mientras tanto, no hay nada que hacer.
    pub async fn on_track_end(&self, guild_id: GuildId) {
        let Some(session) = self.session(guild_id) else {
            debug!("Fin de pista para guild {} ya limpiado", guild_id);
            return;
        };

        let mut state = session.lock().await;

        // Un evento duplicado (error + fin de la misma pista) o un fin que
        // un submit concurrente ya adelantó no debe avanzar dos veces
        if self.transport_busy(guild_id).await {
            return;
        }

        match self.advance_locked(guild_id, &mut state, true).await {
            Advanced::Started(track) => debug!("▶️ Avance a: {}", track.title()),
            Advanced::Idle => debug!("📭 Guild {} ocioso", guild_id),
            Advanced::Disconnected => debug!("🔌 Guild {} desconectado", guild_id),
        }
    }

    /// Algoritmo de avance. Se llama con el lock de la sesión tomado.
    ///
    /// Bucle explícito con política de un-intento-y-descarte: una pista
    /// cuyo arranque falla se pierde y se prueba la siguiente, hasta
    /// arrancar una o vaciar la cola. Nunca se reintenta un stream fallido.
    async fn advance_locked(
        &self,
        guild_id: GuildId,
        state: &mut GuildPlayback,
        announce: bool,
    ) -> Advanced {
        loop {
            // Transporte desconectado: limpiar y no seleccionar nada
            let call = match self.inner.songbird.get(guild_id) {
                Some(call) => call,
                None => {
                    self.cleanup(guild_id).await;
                    return Advanced::Disconnected;
                }
            };
            if call.lock().await.current_channel().is_none() {
                self.cleanup(guild_id).await;
                return Advanced::Disconnected;
            }

            let next = match state.finish_and_select_next() {
                Some(track) => track,
                None => {
                    self.inner.current_handles.remove(&guild_id);
                    return Advanced::Idle;
                }
            };

            match self.start_track(guild_id, &call, &next, state.volume()).await {
                Ok(handle) => {
                    self.inner.current_handles.insert(guild_id, handle);
                    if announce {
                        self.announce_now_playing(state.announce_channel(), &next);
                    }
                    info!("▶️ Reproduciendo: {} en guild {}", next.title(), guild_id);
                    return Advanced::Started(next);
                }
                Err(e) => {
                    warn!(
                        "❌ No se pudo reproducir {} en guild {}: {:?} - se descarta",
                        next.title(),
                        guild_id,
                        e
                    );
                    state.drop_current();
                }
            }
        }
    }

    /// Arranca una pista en el transporte y registra los callbacks de fin
    /// y error ligados a este guild.
    async fn start_track(
        &self,
        guild_id: GuildId,
        call: &Arc<Mutex<Call>>,
        track: &Track,
        volume: f32,
    ) -> anyhow::Result<TrackHandle> {
        let input = track.to_input()?;

        let mut call_lock = call.lock().await;
        let handle = call_lock.play_input(input);
        let _ = handle.set_volume(volume);

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndHandler {
                    guild_id,
                    controller: self.clone(),
                },
            )
            .map_err(|e| anyhow::anyhow!("error al registrar callback de fin: {}", e))?;

        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorHandler {
                    guild_id,
                    controller: self.clone(),
                },
            )
            .map_err(|e| anyhow::anyhow!("error al registrar callback de error: {}", e))?;

        Ok(handle)
    }

    /// Anuncia la pista en el canal de texto del guild (solo avances
    /// automáticos; el arranque desde /play responde a la interacción).
    fn announce_now_playing(&self, channel: Option<ChannelId>, track: &Track) {
        let (Some(http), Some(channel)) = (self.inner.http.get(), channel) else {
            return;
        };

        let http = http.clone();
        let track = track.clone();
        tokio::spawn(async move {
            let embed = crate::ui::embeds::create_now_playing_embed(&track);
            if let Err(e) = channel
                .send_message(&http, CreateMessage::new().embed(embed))
                .await
            {
                warn!("Error al enviar anuncio de pista: {:?}", e);
            }
        });
    }

    /// ¿El transporte reporta reproduciendo o pausado para este guild?
    async fn transport_busy(&self, guild_id: GuildId) -> bool {
        let handle = match self.inner.current_handles.get(&guild_id) {
            Some(handle) => handle.clone(),
            None => return false,
        };

        match handle.get_info().await {
            Ok(info) => matches!(info.playing, PlayMode::Play | PlayMode::Pause),
            Err(_) => {
                // Handle muerto: el track ya terminó
                self.inner.current_handles.remove(&guild_id);
                false
            }
        }
    }

    /// Salta la pista actual. Apaga primero el loop de pista para que el
    /// salto siempre avance; el stop dispara el callback de fin, que
    /// reingresa al avance.
    pub async fn skip(&self, guild_id: GuildId) -> PlayerResult<Track> {
        let session = self.session(guild_id).ok_or(PlayerError::NothingPlaying)?;

        let skipped = {
            let mut state = session.lock().await;
            let current = state.current().cloned().ok_or(PlayerError::NothingPlaying)?;
            state.disable_loop_track();
            current
        };

        let handle = self
            .inner
            .current_handles
            .get(&guild_id)
            .map(|h| h.clone())
            .ok_or(PlayerError::NothingPlaying)?;
        handle
            .stop()
            .map_err(|e| PlayerError::Playback(e.to_string()))?;

        Ok(skipped)
    }

    pub async fn pause(&self, guild_id: GuildId) -> PlayerResult<()> {
        let handle = self
            .inner
            .current_handles
            .get(&guild_id)
            .map(|h| h.clone())
            .ok_or(PlayerError::NothingPlaying)?;
        handle
            .pause()
            .map_err(|e| PlayerError::Playback(e.to_string()))
    }

    pub async fn resume(&self, guild_id: GuildId) -> PlayerResult<()> {
        let handle = self
            .inner
            .current_handles
            .get(&guild_id)
            .map(|h| h.clone())
            .ok_or(PlayerError::NothingPlaying)?;
        handle
            .play()
            .map_err(|e| PlayerError::Playback(e.to_string()))
    }

    /// Ajusta el volumen del guild (escalar 0.0-2.0) y lo aplica a la
    /// pista actual si hay una sonando. Las siguientes lo heredan.
    pub async fn set_volume(&self, guild_id: GuildId, volume: f32) {
        let session = self.get_or_create(guild_id);
        session.lock().await.set_volume(volume);

        if let Some(handle) = self.inner.current_handles.get(&guild_id) {
            let _ = handle.set_volume(volume);
        }
    }

    pub async fn toggle_loop_queue(&self, guild_id: GuildId) -> bool {
        let session = self.get_or_create(guild_id);
        let mut state = session.lock().await;
        state.toggle_loop_queue()
    }

    pub async fn toggle_loop_track(&self, guild_id: GuildId) -> bool {
        let session = self.get_or_create(guild_id);
        let mut state = session.lock().await;
        state.toggle_loop_track()
    }

    pub async fn shuffle(&self, guild_id: GuildId) -> PlayerResult<usize> {
        let session = self.session(guild_id).ok_or(PlayerError::EmptyQueue)?;
        let mut state = session.lock().await;
        if state.is_queue_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        state.shuffle();
        Ok(state.queue_len())
    }

    /// Quita una pista de la cola: un número se interpreta como posición
    /// 1-based; cualquier otro texto como coincidencia parcial de título.
    pub async fn remove(&self, guild_id: GuildId, query: &str) -> PlayerResult<Track> {
        let session = self.session(guild_id).ok_or(PlayerError::EmptyQueue)?;
        let mut state = session.lock().await;

        match query.trim().parse::<usize>() {
            Ok(position) => state.remove_at(position),
            Err(_) => state.remove_matching(query.trim()),
        }
    }

    /// Recuerda el canal de texto donde anunciar los avances automáticos.
    pub async fn set_announce_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        let session = self.get_or_create(guild_id);
        session.lock().await.set_announce_channel(channel_id);
    }

    /// Snapshot de solo lectura para la capa de presentación. `None` si el
    /// guild no tiene estado.
    pub async fn snapshot(&self, guild_id: GuildId, limit: usize) -> Option<QueueSnapshot> {
        let session = self.session(guild_id)?;
        let state = session.lock().await;
        Some(state.snapshot(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> PlaybackController {
        PlaybackController::new(Songbird::serenity(), 0.5)
    }

    fn track(title: &str) -> Track {
        Track::new(
            title.to_string(),
            format!("https://www.youtube.com/watch?v={}", title),
        )
    }

    #[tokio::test]
    async fn test_ensure_state_is_idempotent() {
        let controller = controller();
        let guild_id = GuildId::new(1);

        controller.ensure_state(guild_id);
        assert!(controller.toggle_loop_queue(guild_id).await);

        // Un segundo ensure no debe pisar el estado existente
        controller.ensure_state(guild_id);
        let snapshot = controller.snapshot(guild_id, 10).await.unwrap();
        assert!(snapshot.loop_queue);
    }

    #[tokio::test]
    async fn test_reset_state_preserves_loop_flags() {
        let controller = controller();
        let guild_id = GuildId::new(2);

        controller.ensure_state(guild_id);
        controller.toggle_loop_track(guild_id).await;
        controller.reset_state(guild_id).await.unwrap();

        let snapshot = controller.snapshot(guild_id, 10).await.unwrap();
        assert!(snapshot.loop_track);
        assert!(snapshot.current.is_none());
        assert_eq!(snapshot.total, 0);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let controller = controller();
        let guild_id = GuildId::new(3);

        controller.ensure_state(guild_id);
        controller.cleanup(guild_id).await;
        assert!(controller.snapshot(guild_id, 10).await.is_none());

        // Segunda vez: sin error, sin estado residual
        controller.cleanup(guild_id).await;
        assert!(controller.snapshot(guild_id, 10).await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_loses_loop_preferences() {
        let controller = controller();
        let guild_id = GuildId::new(4);

        controller.toggle_loop_queue(guild_id).await;
        controller.cleanup(guild_id).await;

        // Recrear el estado es indistinguible de la primera creación
        controller.ensure_state(guild_id);
        let snapshot = controller.snapshot(guild_id, 10).await.unwrap();
        assert!(!snapshot.loop_queue);
        assert!(!snapshot.loop_track);
    }

    #[tokio::test]
    async fn test_submit_without_connection_discards_track() {
        let controller = controller();
        let guild_id = GuildId::new(5);

        // Sin conexión de voz el avance limpia el guild en vez de arrancar;
        // cubre también el resolve que termina después de un cleanup
        let outcome = controller.submit(guild_id, track("A")).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Disconnected));
        assert!(controller.snapshot(guild_id, 10).await.is_none());
    }

    #[tokio::test]
    async fn test_operations_on_absent_guild_fail_cleanly() {
        let controller = controller();
        let guild_id = GuildId::new(6);

        assert!(matches!(
            controller.skip(guild_id).await,
            Err(PlayerError::NothingPlaying)
        ));
        assert!(matches!(
            controller.shuffle(guild_id).await,
            Err(PlayerError::EmptyQueue)
        ));
        assert!(matches!(
            controller.remove(guild_id, "1").await,
            Err(PlayerError::EmptyQueue)
        ));
        assert!(controller.snapshot(guild_id, 10).await.is_none());
    }
}
