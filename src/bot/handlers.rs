use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandDataOptionValue, CommandInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use crate::{audio::controller::PlayerState, bot::CadenzaBot, error::PlayerError};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CadenzaBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "join" => handle_join(ctx, command, bot).await?,
        "leave" => handle_leave(ctx, command, bot).await?,
        "add" => handle_add(ctx, command, bot).await?,
        "remove" => handle_remove(ctx, command, bot).await?,
        "queue" => handle_queue(ctx, command, bot).await?,
        "shuffle" => handle_shuffle(ctx, command, bot).await?,
        "clear" => handle_clear(ctx, command, bot).await?,
        "play" => handle_play(ctx, command, bot).await?,
        "pause" => handle_pause(ctx, command, bot).await?,
        "resume" => handle_resume(ctx, command, bot).await?,
        "skip" => handle_skip(ctx, command, bot).await?,
        _ => reply(ctx, &command, "❌ Comando no reconocido").await?,
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_join(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let channel_id = match get_user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(id) => id,
        Err(e) => return reply(ctx, &command, &format!("❌ {e}")).await,
    };

    bot.join_voice_channel(ctx, guild_id, channel_id).await?;
    reply(ctx, &command, "🔊 Conectado al canal de voz").await
}

async fn handle_leave(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    if bot.get_sink(guild_id).is_none() {
        return reply(ctx, &command, "❌ No estoy en un canal de voz").await;
    }

    bot.leave_voice_channel(ctx, guild_id).await?;
    reply(ctx, &command, "👋 Desconectado del canal de voz").await
}

async fn handle_add(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    // URL o adjunto: exactamente una de las dos opciones
    let mut reference: Option<String> = None;
    for option in &command.data.options {
        match (option.name.as_str(), &option.value) {
            ("url", CommandDataOptionValue::String(url)) => reference = Some(url.clone()),
            ("file", CommandDataOptionValue::Attachment(attachment_id)) => {
                if let Some(attachment) = command.data.resolved.attachments.get(attachment_id) {
                    reference = Some(attachment.url.clone());
                }
            }
            _ => {}
        }
    }
    let Some(reference) = reference else {
        return reply(ctx, &command, "❌ Indica una URL o adjunta un archivo").await;
    };

    // la resolución puede descargar y transcodificar: responder diferido
    defer(ctx, &command).await?;

    let titles = match bot.player.enqueue(&reference).await {
        Ok(titles) => titles,
        Err(e) => return edit_reply(ctx, &command, &format!("❌ No se pudo agregar: {e:#}")).await,
    };

    let summary = if titles.len() == 1 {
        format!("➕ Agregado a la cola: {}", titles[0])
    } else {
        format!("➕ Agregados {} tracks a la cola", titles.len())
    };

    // conectar si hace falta y arrancar el loop si no hay uno activo
    if bot.get_sink(guild_id).is_none() {
        if let Ok(channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) {
            bot.join_voice_channel(ctx, guild_id, channel_id).await?;
        }
    }

    if let Some(sink) = bot.get_sink(guild_id) {
        match bot.player.start(sink).await {
            Ok(()) | Err(PlayerError::QueueEmpty) => {}
            Err(e) => {
                return edit_reply(ctx, &command, &format!("{summary}\n❌ Reproducción: {e}"))
                    .await
            }
        }
    }

    edit_reply(ctx, &command, &summary).await
}

async fn handle_remove(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    let index = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "index")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Índice no proporcionado"))?;

    if index < 1 {
        return reply(ctx, &command, &format!("❌ índice fuera de rango: {index}")).await;
    }

    match bot.player.remove_at(index as usize) {
        Ok(title) => reply(ctx, &command, &format!("🗑️ Eliminado de la cola: {title}")).await,
        Err(e) => reply(ctx, &command, &format!("❌ {e}")).await,
    }
}

async fn handle_queue(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    let tracks = bot.player.snapshot();

    if tracks.is_empty() {
        return reply(ctx, &command, "📭 No hay tracks en la cola").await;
    }

    let playing = !matches!(bot.player.state(), PlayerState::Idle);
    let mut lines = Vec::with_capacity(tracks.len() + 1);
    lines.push("🎶 Cola actual:".to_string());
    for (i, track) in tracks.iter().enumerate() {
        if i == 0 && playing {
            lines.push(format!("{}. {} ⬅️ sonando", i + 1, track.title));
        } else {
            lines.push(format!("{}. {}", i + 1, track.title));
        }
    }

    reply(ctx, &command, &lines.join("\n")).await
}

async fn handle_shuffle(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    if bot.player.queue_len() < 2 {
        return reply(ctx, &command, "❌ No hay suficientes tracks para mezclar").await;
    }
    bot.player.shuffle();
    reply(ctx, &command, "🔀 Cola mezclada").await
}

async fn handle_clear(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    bot.player.clear();
    reply(ctx, &command, "🗑️ Cola vaciada").await
}

async fn handle_play(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    let Some(sink) = bot.get_sink(guild_id) else {
        return reply(ctx, &command, "❌ No estoy en un canal de voz (usa /join)").await;
    };

    match bot.player.start(sink).await {
        Ok(()) => reply(ctx, &command, "▶️ Reproducción iniciada").await,
        Err(e) => reply(ctx, &command, &format!("❌ {e}")).await,
    }
}

async fn handle_pause(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    match bot.player.pause().await {
        Ok(()) => reply(ctx, &command, "⏸️ Reproducción pausada").await,
        Err(e) => reply(ctx, &command, &format!("❌ {e}")).await,
    }
}

async fn handle_resume(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    match bot.player.resume().await {
        Ok(()) => reply(ctx, &command, "▶️ Reproducción reanudada").await,
        Err(e) => reply(ctx, &command, &format!("❌ {e}")).await,
    }
}

async fn handle_skip(ctx: &Context, command: CommandInteraction, bot: &CadenzaBot) -> Result<()> {
    match bot.player.skip().await {
        Ok(()) => reply(ctx, &command, "⏭️ Track salteado").await,
        Err(e) => reply(ctx, &command, &format!("❌ {e}")).await,
    }
}

// Funciones auxiliares

async fn reply(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn edit_reply(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))?;

    Ok(channel_id)
}
