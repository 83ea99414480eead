//! # Bot Module
//!
//! Discord-facing layer: command registration, interaction dispatch and
//! voice connection management. All playback semantics live in the audio
//! engine; this layer only parses arguments, formats responses and wires
//! the Songbird call into a [`SongbirdSink`] for the engine.

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::player::Player,
    config::Config,
    voice::{discord::SongbirdSink, VoiceSink},
};

/// Registro de sinks activos por guild, compartido con el shutdown.
pub type SinkRegistry = DashMap<GuildId, Arc<SongbirdSink>>;

pub struct CadenzaBot {
    config: Arc<Config>,
    /// Motor de reproducción (una cola, un destino a la vez)
    pub player: Arc<Player>,
    /// Llamadas de voz por guild
    voice_handlers: DashMap<GuildId, Arc<tokio::sync::Mutex<songbird::Call>>>,
    /// Sinks instalados sobre esas llamadas
    sinks: Arc<SinkRegistry>,
}

impl CadenzaBot {
    pub fn new(config: Config, player: Arc<Player>, sinks: Arc<SinkRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            player,
            voice_handlers: DashMap::new(),
            sinks,
        }
    }

    /// Registra los comandos slash, globales o por guild según la
    /// configuración (por guild propagan en segundos, útil en desarrollo).
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos registrados para la guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("🌐 Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Se une al canal de voz e instala el sink del motor sobre la llamada.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<()> {
        if self.voice_handlers.contains_key(&guild_id) {
            info!("🔊 Ya conectado a un canal de voz en guild {}", guild_id);
            return Ok(());
        }

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| anyhow::anyhow!("Error al conectar al canal de voz: {e}"))?;

        let sink = SongbirdSink::new(call.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Error instalando el sink de voz: {e}"))?;

        self.voice_handlers.insert(guild_id, call);
        self.sinks.insert(guild_id, Arc::new(sink));

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);
        Ok(())
    }

    /// Desconecta el sink y abandona el canal. Un stream en curso observa
    /// el corte como fallo de envío y se detiene sin avanzar la cola.
    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<()> {
        if let Some((_, sink)) = self.sinks.remove(&guild_id) {
            if let Err(e) = sink.disconnect().await {
                warn!("⚠️ Error desconectando el sink: {}", e);
            }
        }

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;
        manager.remove(guild_id).await?;
        self.voice_handlers.remove(&guild_id);

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }

    pub fn get_sink(&self, guild_id: GuildId) -> Option<Arc<SongbirdSink>> {
        self.sinks.get(&guild_id).map(|s| s.clone())
    }
}

#[async_trait]
impl EventHandler for CadenzaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }
}
