use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        // Utilitarios
        join_command(),
        leave_command(),
        // Cola
        add_command(),
        remove_command(),
        queue_command(),
        shuffle_command(),
        clear_command(),
        // Reproducción
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }
    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Se une a tu canal de voz")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Abandona el canal de voz")
}

fn add_command() -> CreateCommand {
    CreateCommand::new("add")
        .description("Agrega un track a la cola")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "url",
            "URL de YouTube (video, short o playlist)",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::Attachment,
            "file",
            "Archivo de audio adjunto",
        ))
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Elimina un track de la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "index",
                "Posición del track en la cola (1 = cabeza)",
            )
            .required(true),
        )
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola actual")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Mezcla la cola")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Vacía la cola")
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play").description("Arranca la reproducción de la cola")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta el track actual")
}
