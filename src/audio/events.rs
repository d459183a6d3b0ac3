use serenity::async_trait;
use serenity::model::id::GuildId;
use songbird::{Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler};
use tracing::{error, info};

use super::controller::PlaybackController;

/// Callback de fin de pista. Corre en el contexto del driver de voz, así
/// que no toca el estado directamente: traspasa el trabajo al controlador
/// con un spawn (fire-and-forget) y retorna de inmediato.
pub struct TrackEndHandler {
    pub guild_id: GuildId,
    pub controller: PlaybackController,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        info!("🎵 Pista terminada en guild {}", self.guild_id);

        let controller = self.controller.clone();
        let guild_id = self.guild_id;
        tokio::spawn(async move {
            controller.on_track_end(guild_id).await;
        });

        None
    }
}

/// Callback de error de pista. El error se reporta pero no altera la
/// selección: el avance corre igual que con un fin limpio.
pub struct TrackErrorHandler {
    pub guild_id: GuildId,
    pub controller: PlaybackController,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                error!(
                    "❌ Error de pista en guild {}: {:?}",
                    self.guild_id, state.playing
                );
            }
        }

        let controller = self.controller.clone();
        let guild_id = self.guild_id;
        tokio::spawn(async move {
            controller.on_track_end(guild_id).await;
        });

        None
    }
}
