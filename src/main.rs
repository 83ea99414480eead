use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod voice;

use crate::{
    audio::player::Player,
    bot::{CadenzaBot, SinkRegistry},
    config::Config,
    sources::CachedOpusSource,
    voice::VoiceSink,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cadenza=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Cadenza v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    // Motor de reproducción: fuente con caché + cola + controlador
    let source = Arc::new(CachedOpusSource::new(
        config.audio_dir.clone(),
        config.opus_bitrate,
    ));
    let player = Arc::new(Player::new(
        source,
        Duration::from_millis(config.track_cooldown_ms),
        config.max_queue_size,
    ));

    // Registro de sinks compartido con el shutdown
    let sinks: Arc<SinkRegistry> = Arc::new(SinkRegistry::new());

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Crear handler del bot
    let handler = CadenzaBot::new(config.clone(), player, sinks.clone());

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Shutdown graceful: desconectar los sinks hace que un stream en curso
    // observe el corte como fallo de envío y se detenga
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        let active: Vec<_> = sinks.iter().map(|entry| entry.value().clone()).collect();
        for sink in active {
            if let Err(e) = sink.disconnect().await {
                warn!("⚠️ Error desconectando sink en shutdown: {}", e);
            }
        }
        std::process::exit(0);
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
