use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{controller::SubmitOutcome, state::QueueSnapshot, PlayerError},
    bot::RitmoBot,
    sources::Resolver,
    ui::embeds,
};

/// Maneja comandos slash. Cualquier error que llegue hasta acá se reporta
/// genéricamente al usuario; los fallos de un guild nunca tumban el proceso.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot).await?,
        "pause" => handle_pause(ctx, command, bot).await?,
        "resume" => handle_resume(ctx, command, bot).await?,
        "skip" => handle_skip(ctx, command, bot).await?,
        "stop" => handle_stop(ctx, command, bot).await?,
        "queue" => handle_queue(ctx, command, bot).await?,
        "nowplaying" => handle_nowplaying(ctx, command, bot).await?,
        "shuffle" => handle_shuffle(ctx, command, bot).await?,
        "loop" => handle_loop(ctx, command, bot).await?,
        "loopsong" => handle_loopsong(ctx, command, bot).await?,
        "remove" => handle_remove(ctx, command, bot).await?,
        "volume" => handle_volume(ctx, command, bot).await?,
        "join" => handle_join(ctx, command, bot).await?,
        "leave" => handle_leave(ctx, command, bot).await?,
        "help" => handle_help(ctx, command).await?,
        _ => {
            respond_text(ctx, &command, "❌ Comando no reconocido", true).await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer: resolver puede tardar varios segundos
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // El usuario debe estar en un canal de voz; conectar o mover si hace falta
    if let Err(e) = ensure_voice(ctx, bot, guild_id, command.user.id).await {
        return edit_with_error(ctx, &command, &e).await;
    }

    let track = match bot.resolver.resolve(&query).await {
        Ok(track) => track.with_requested_by(command.user.id),
        Err(e) => {
            warn!("Resolución fallida para «{}»: {:?}", query, e);
            return edit_with_error(
                ctx,
                &command,
                &PlayerError::NoMatch(query.to_string()),
            )
            .await;
        }
    };

    // Los avances automáticos se anuncian en el canal del comando
    bot.controller
        .set_announce_channel(guild_id, command.channel_id)
        .await;

    match bot.controller.submit(guild_id, track).await {
        Ok(SubmitOutcome::Started(track)) => {
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new().embed(embeds::create_now_playing_embed(&track)),
                )
                .await?;
        }
        Ok(SubmitOutcome::Queued(track, position)) => {
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new()
                        .embed(embeds::create_track_added_embed(&track, position)),
                )
                .await?;
        }
        Ok(SubmitOutcome::Disconnected) => {
            return edit_with_error(ctx, &command, &PlayerError::UserNotInVoiceChannel).await;
        }
        Err(e) => return edit_with_error(ctx, &command, &e).await,
    }

    Ok(())
}

async fn handle_pause(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    match bot.controller.pause(guild_id).await {
        Ok(()) => respond_text(ctx, &command, "⏸️ **Pausado**", false).await,
        Err(e) => respond_error(ctx, &command, &e).await,
    }
}

async fn handle_resume(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    match bot.controller.resume(guild_id).await {
        Ok(()) => respond_text(ctx, &command, "▶️ **Reanudado**", false).await,
        Err(e) => respond_error(ctx, &command, &e).await,
    }
}

async fn handle_skip(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    match bot.controller.skip(guild_id).await {
        Ok(skipped) => {
            respond_text(
                ctx,
                &command,
                &format!("⏭️ Saltada: **{}**", skipped.title()),
                false,
            )
            .await
        }
        Err(e) => respond_error(ctx, &command, &e).await,
    }
}

async fn handle_stop(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    match bot.controller.reset_state(guild_id).await {
        Ok(()) => respond_text(ctx, &command, "⏹️ **Detenido.** Cola limpiada", false).await,
        Err(e) => respond_error(ctx, &command, &e).await,
    }
}

async fn handle_queue(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let snapshot = bot
        .controller
        .snapshot(guild_id, bot.config.queue_preview)
        .await
        .unwrap_or(QueueSnapshot {
            current: None,
            upcoming: Vec::new(),
            total: 0,
            loop_queue: false,
            loop_track: false,
            volume: bot.config.default_volume,
        });

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embeds::create_queue_embed(&snapshot)),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_nowplaying(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let current = bot
        .controller
        .snapshot(guild_id, 0)
        .await
        .and_then(|s| s.current);

    match current {
        Some(track) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::create_now_playing_embed(&track)),
                    ),
                )
                .await?;
            Ok(())
        }
        None => respond_text(ctx, &command, "❌ No hay nada reproduciéndose", true).await,
    }
}

async fn handle_shuffle(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    match bot.controller.shuffle(guild_id).await {
        Ok(count) => {
            respond_text(
                ctx,
                &command,
                &format!("🔀 **Cola mezclada** ({} canciones)", count),
                false,
            )
            .await
        }
        Err(e) => respond_error(ctx, &command, &e).await,
    }
}

async fn handle_loop(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let enabled = bot.controller.toggle_loop_queue(guild_id).await;
    respond_text(
        ctx,
        &command,
        &format!("🔁 Loop de cola: **{}**", if enabled { "ON" } else { "OFF" }),
        false,
    )
    .await
}

async fn handle_loopsong(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let enabled = bot.controller.toggle_loop_track(guild_id).await;
    respond_text(
        ctx,
        &command,
        &format!("🔂 Loop de canción: **{}**", if enabled { "ON" } else { "OFF" }),
        false,
    )
    .await
}

async fn handle_remove(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    match bot.controller.remove(guild_id, query).await {
        Ok(removed) => {
            respond_text(
                ctx,
                &command,
                &format!("🗑️ Quitada: **{}**", removed.title()),
                false,
            )
            .await
        }
        Err(PlayerError::AmbiguousMatch(candidates)) => {
            let listing = candidates
                .iter()
                .map(|title| format!("• {}", title))
                .collect::<Vec<_>>()
                .join("\n");
            respond_text(
                ctx,
                &command,
                &format!("⚠️ **Varias coincidencias, sé más específico:**\n{}", listing),
                true,
            )
            .await
        }
        Err(e) => respond_error(ctx, &command, &e).await,
    }
}

async fn handle_volume(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Nivel no proporcionado"))?;

    let volume = (level.clamp(0, 100) as f32) / 100.0;
    bot.controller.set_volume(guild_id, volume).await;

    respond_text(
        ctx,
        &command,
        &format!("🔊 Volumen ajustado a **{}%**", level),
        false,
    )
    .await
}

async fn handle_join(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    match ensure_voice(ctx, bot, guild_id, command.user.id).await {
        Ok(()) => respond_text(ctx, &command, "👋 **Conectado al canal de voz**", false).await,
        Err(e) => respond_error(ctx, &command, &e).await,
    }
}

async fn handle_leave(ctx: &Context, command: CommandInteraction, bot: &RitmoBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    bot.controller.cleanup(guild_id).await;
    respond_text(ctx, &command, "👋 **Desconectado**", false).await
}

async fn handle_help(ctx: &Context, command: CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_help_embed())
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

/// Verifica que el usuario esté en un canal de voz y conecta (o mueve) el
/// bot hacia ese canal.
async fn ensure_voice(
    ctx: &Context,
    bot: &RitmoBot,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<(), PlayerError> {
    let channel_id = get_user_voice_channel(ctx, guild_id, user_id)?;
    bot.join_voice_channel(ctx, guild_id, channel_id).await?;
    bot.controller.ensure_state(guild_id);
    Ok(())
}

fn get_user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<ChannelId, PlayerError> {
    let guild = match guild_id.to_guild_cached(&ctx.cache) {
        Some(guild) => guild,
        None => return Err(PlayerError::UserNotInVoiceChannel),
    };

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(PlayerError::UserNotInVoiceChannel)
}

async fn respond_text(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_error(ctx: &Context, command: &CommandInteraction, error: &PlayerError) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_error_embed(&error.to_string()))
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn edit_with_error(
    ctx: &Context,
    command: &CommandInteraction,
    error: &PlayerError,
) -> Result<()> {
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::create_error_embed(&error.to_string())),
        )
        .await?;
    Ok(())
}
