use serenity::all::Timestamp;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use std::time::Duration;

use crate::audio::state::QueueSnapshot;
use crate::sources::Track;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Ritmo Bot";

/// Crea un embed para la pista que está sonando
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("[{}]({})", track.title(), track.url()))
        .color(colors::SUCCESS_GREEN);

    if let Some(duration) = track.duration() {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    } else {
        embed = embed.field("⏱️ Duración", "🔴 En vivo", true);
    }

    if let Some(requester) = track.requested_by() {
        embed = embed.field("👤 Solicitado por", format!("<@{}>", requester), true);
    }

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para una pista agregada a la cola
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Agregada a la Cola")
        .description(format!("[{}]({})", track.title(), track.url()))
        .color(colors::MUSIC_PURPLE)
        .field("📊 Posición", position.to_string(), true);

    if let Some(duration) = track.duration() {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    }

    if let Some(requester) = track.requested_by() {
        embed = embed.field("👤 Solicitado por", format!("<@{}>", requester), true);
    }

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            "🎵 Se reproducirá automáticamente cuando llegue su turno",
        ))
}

/// Crea un embed con la cola de reproducción a partir de un snapshot
pub fn create_queue_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.current.is_none() && snapshot.total == 0 {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &snapshot.current {
        let status = if snapshot.loop_track {
            "🔂"
        } else if snapshot.loop_queue {
            "🔁"
        } else {
            "▶️"
        };

        embed = embed.field(
            format!("{} Reproduciendo", status),
            format!("[{}]({})", current.title(), current.url()),
            false,
        );
    }

    if !snapshot.upcoming.is_empty() {
        let mut description = String::new();

        for (i, track) in snapshot.upcoming.iter().enumerate() {
            let duration = match track.duration() {
                Some(d) => format!(" `[{}]`", format_duration(d)),
                None => String::new(),
            };
            description.push_str(&format!("`{}.` {}{}\n", i + 1, track.title(), duration));
        }

        if snapshot.total > snapshot.upcoming.len() {
            description.push_str(&format!(
                "\n...y {} más",
                snapshot.total - snapshot.upcoming.len()
            ));
        }

        embed = embed.field("Próximas canciones", description, false);
    }

    let mut info = format!(
        "**Total:** {} canciones • 🔊 {}%",
        snapshot.total,
        (snapshot.volume * 100.0) as u32
    );
    if snapshot.loop_queue {
        info.push_str(" • 🔁 **Loop de cola**");
    }
    if snapshot.loop_track {
        info.push_str(" • 🔂 **Loop de canción**");
    }
    embed = embed.field("Información", info, false);

    embed
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea el embed de ayuda general
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Ritmo Bot - Comandos")
        .color(colors::INFO_BLUE)
        .description("Bot de música con cola por servidor")
        .field(
            "🎵 Reproducción",
            "• `/play <canción>` - Reproduce una URL o búsqueda\n\
            • `/pause` - Pausa la reproducción\n\
            • `/resume` - Reanuda la reproducción\n\
            • `/skip` - Salta la canción actual\n\
            • `/stop` - Detiene y limpia la cola",
            false,
        )
        .field(
            "📜 Cola",
            "• `/queue` - Muestra la cola\n\
            • `/nowplaying` - Muestra la canción actual\n\
            • `/shuffle` - Mezcla la cola\n\
            • `/remove <posición o nombre>` - Quita una canción\n\
            • `/loop` - Repite la cola completa\n\
            • `/loopsong` - Repite la canción actual",
            false,
        )
        .field(
            "🔊 Conexión y audio",
            "• `/join` - Conecta al canal de voz\n\
            • `/leave` - Desconecta y limpia todo\n\
            • `/volume <0-100>` - Ajusta el volumen",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
