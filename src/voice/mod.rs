//! # Voice Module
//!
//! Transport seam between the playback engine and the Discord voice
//! driver. The engine only ever talks to the [`VoiceSink`] trait; the
//! Songbird-backed adapter lives in [`discord`].

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SinkError;

pub mod discord;

/// Transporte de voz consumido por el loop de streaming.
///
/// `send_frame` es el punto de backpressure: un transporte lento o
/// desconectado frena o corta el loop.
#[async_trait]
pub trait VoiceSink: Send + Sync {
    /// Activa o desactiva el indicador de "hablando" del transporte.
    async fn set_speaking(&self, speaking: bool) -> Result<(), SinkError>;

    /// Entrega un frame Opus al transporte.
    async fn send_frame(&self, frame: Bytes) -> Result<(), SinkError>;

    /// Cierra el transporte. Un stream en curso lo observa como fallo de
    /// envío y se detiene.
    async fn disconnect(&self) -> Result<(), SinkError>;
}
