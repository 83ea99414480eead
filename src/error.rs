use thiserror::Error;

/// Errores del motor de reproducción expuestos a la capa de comandos.
///
/// Los tres primeros son errores del llamador: se reportan directamente,
/// sin reintentos y sin tocar el estado del motor.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("índice fuera de rango: {0}")]
    OutOfRange(usize),

    #[error("la cola está vacía")]
    QueueEmpty,

    #[error("no hay reproducción activa")]
    NotPlaying,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Fallos al adquirir o decodificar los frames de un track.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("audio no encontrado en caché: {0}")]
    Missing(String),

    #[error("archivo de frames truncado a mitad de un frame")]
    TruncatedFrame,

    #[error("longitud de frame inválida: {0}")]
    InvalidLength(i16),

    #[error("error de E/S leyendo frames: {0}")]
    Io(#[from] std::io::Error),
}

/// Fallos del transporte de voz.
///
/// `Clone` porque un mismo fallo se entrega al llamador que lo provocó
/// (ack del rendezvous) y al propio loop para decidir su salida.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("el transporte de voz está cerrado")]
    Closed,

    #[error("error del transporte de voz: {0}")]
    Transport(String),
}
