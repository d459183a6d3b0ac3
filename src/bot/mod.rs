//! # Bot Module
//!
//! Implementación del bot de Discord para Ritmo Bot.
//!
//! [`RitmoBot`] implementa el [`EventHandler`] de serenity y conecta los
//! eventos del gateway con el controlador de reproducción:
//!
//! - comandos slash -> operaciones del controlador ([`handlers`])
//! - cambios de estado de voz -> cleanup inmediato si desconectan al bot,
//!   o desconexión diferida si queda solo en el canal
//! - registro de comandos al arrancar ([`commands`])

use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{controller::PlaybackController, idle, PlayerError},
    config::Config,
    sources::{Resolver, YtDlpResolver},
};

/// Timeout para conectar o mover el bot de canal de voz.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Handler principal del bot.
pub struct RitmoBot {
    /// Configuración cargada del entorno
    pub config: Arc<Config>,
    /// Controlador de reproducción por guild
    pub controller: PlaybackController,
    /// Resolutor de pistas (yt-dlp)
    pub resolver: Arc<dyn Resolver>,
}

impl RitmoBot {
    pub fn new(config: Config, controller: PlaybackController) -> Self {
        Self {
            config: Arc::new(config),
            controller,
            resolver: Arc::new(YtDlpResolver::new()),
        }
    }

    /// Registra los comandos slash, globales o por guild según config.
    async fn register_commands(&self, ctx: &Context) -> anyhow::Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos registrados para guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Conecta el bot al canal dado, o lo mueve si ya está en otro. El
    /// timeout de conexión se reporta distinto de los demás fallos; tras
    /// un fallo que deja la conexión en estado ambiguo se limpia el guild.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), PlayerError> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| PlayerError::JoinFailed("Songbird no inicializado".to_string()))?;

        // Ya conectado al canal correcto: nada que hacer
        if let Some(call) = manager.get(guild_id) {
            if call.lock().await.current_channel() == Some(channel_id.into()) {
                return Ok(());
            }
        }

        match tokio::time::timeout(CONNECT_TIMEOUT, manager.join(guild_id, channel_id)).await {
            Ok(Ok(_call)) => {
                info!("🔊 Conectado al canal de voz en guild {}", guild_id);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Error al conectar al canal de voz: {:?}", e);
                self.controller.cleanup(guild_id).await;
                Err(PlayerError::JoinFailed(e.to_string()))
            }
            Err(_) => {
                error!("Timeout al conectar al canal de voz en guild {}", guild_id);
                self.controller.cleanup(guild_id).await;
                Err(PlayerError::ConnectTimeout)
            }
        }
    }
}

#[async_trait]
impl EventHandler for RitmoBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        // El controlador necesita HTTP para anunciar avances automáticos
        self.controller.attach_http(ctx.http.clone());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command.clone(), self).await {
                error!("Error manejando comando /{}: {:?}", command.data.name, e);

                // Mensaje genérico; si la interacción ya fue respondida
                // este intento falla en silencio
                let _ = command
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new()
                                .content("⚠️ Ocurrió un error inesperado")
                                .ephemeral(true),
                        ),
                    )
                    .await;
            }
        }
    }

    /// Reacciona a cambios de voz: limpia el guild si desconectan al bot y
    /// programa la desconexión diferida cuando queda solo en el canal.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else { return };
        let bot_id = ctx.cache.current_user().id;

        // El propio bot pasó de un canal a ninguno: kick, canal borrado o
        // desconexión forzada. Cleanup inmediato, sin espera.
        if new.user_id == bot_id {
            let was_connected = old.as_ref().and_then(|o| o.channel_id).is_some();
            if was_connected && new.channel_id.is_none() {
                info!("🔌 Bot desconectado del canal de voz en guild {}", guild_id);
                self.controller.cleanup(guild_id).await;
            }
            return;
        }

        // Canal que ocupa el bot ahora mismo
        let Some(manager) = songbird::get(&ctx).await else { return };
        let Some(call) = manager.get(guild_id) else { return };
        let Some(channel) = call.lock().await.current_channel() else {
            return;
        };
        let bot_channel = ChannelId::from(channel.0);

        // Solo interesan eventos que tocan el canal del bot
        let touches_bot_channel = new.channel_id == Some(bot_channel)
            || old.as_ref().and_then(|o| o.channel_id) == Some(bot_channel);
        if !touches_bot_channel {
            return;
        }

        if non_bot_members(&ctx, guild_id, bot_channel) == 0 {
            info!(
                "🚪 Bot solo en el canal; desconexión programada en {}s para guild {}",
                self.config.idle_leave_secs, guild_id
            );

            let delay = Duration::from_secs(self.config.idle_leave_secs);
            let controller = self.controller.clone();
            let probe_ctx = ctx.clone();

            // Cada armado corre su propia ventana; la re-consulta mira el
            // estado vivo, así que los solapados son inofensivos
            tokio::spawn(idle::delayed_leave_check(
                delay,
                async move { still_alone(&probe_ctx, guild_id, bot_channel).await },
                async move {
                    info!("🚪 Desconexión por inactividad en guild {}", guild_id);
                    controller.cleanup(guild_id).await;
                },
            ));
        }
    }
}

/// Re-consulta en vivo para la desconexión diferida: ¿sigue el bot
/// conectado al mismo canal y sin humanos presentes?
async fn still_alone(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> bool {
    let Some(manager) = songbird::get(ctx).await else {
        return false;
    };
    let Some(call) = manager.get(guild_id) else {
        return false;
    };

    let same_channel = call
        .lock()
        .await
        .current_channel()
        .map(|c| ChannelId::from(c.0))
        == Some(channel_id);

    same_channel && non_bot_members(ctx, guild_id, channel_id) == 0
}

/// Cuenta los miembros no-bot presentes en un canal de voz. Un miembro
/// fuera de caché cuenta como humano: ante la duda no se desconecta.
fn non_bot_members(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> usize {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return 0;
    };

    guild
        .voice_states
        .values()
        .filter(|vs| vs.channel_id == Some(channel_id))
        .filter(|vs| {
            guild
                .members
                .get(&vs.user_id)
                .map(|m| !m.user.bot)
                .unwrap_or(true)
        })
        .count()
}
