use std::{
    io::{self, Read, Seek, SeekFrom},
    sync::Arc,
};

use async_trait::async_trait;
use audiopus::{coder::Decoder as OpusDecoder, Channels, SampleRate};
use bytes::Bytes;
use songbird::{
    input::{AudioStream, Input, LiveInput, RawAdapter},
    tracks::TrackHandle,
    Call,
};
use symphonia::core::io::MediaSource;
use tokio::sync::Mutex;
use tracing::info;

use crate::{error::SinkError, sources::transcode};

/// Frames en vuelo hacia el driver antes de que `send_frame` bloquee; el
/// canal acotado es el punto de backpressure del loop de streaming.
const FRAME_BACKLOG: usize = 16;

/// Sink de producción sobre una llamada de voz de Songbird.
///
/// El driver de Songbird no expone un canal crudo de paquetes Opus, así
/// que cada frame se decodifica con Opus y se entrega como PCM f32 por un
/// stream en vivo instalado en el driver. Pausar el track del driver
/// detiene el pull del stream, que es el equivalente de speaking=false.
pub struct SongbirdSink {
    call: Arc<Mutex<Call>>,
    pcm_tx: flume::Sender<Vec<u8>>,
    track: TrackHandle,
    decoder: parking_lot::Mutex<OpusDecoder>,
}

impl SongbirdSink {
    /// Instala el stream PCM en vivo sobre una llamada ya unida. El track
    /// del driver arranca pausado hasta el primer `set_speaking(true)`.
    pub async fn new(call: Arc<Mutex<Call>>) -> Result<Self, SinkError> {
        let (pcm_tx, pcm_rx) = flume::bounded(FRAME_BACKLOG);

        let adapter = RawAdapter::new(
            PcmFeed::new(pcm_rx),
            transcode::SAMPLE_RATE,
            transcode::CHANNEL_COUNT as u32,
        );
        let stream = AudioStream {
            input: Box::new(adapter) as Box<dyn MediaSource>,
            hint: None,
        };
        let input = Input::Live(LiveInput::Raw(stream), None);

        let track = {
            let mut guard = call.lock().await;
            guard.play_input(input)
        };
        track
            .pause()
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let decoder = OpusDecoder::new(SampleRate::Hz48000, Channels::Stereo)
            .map_err(|e| SinkError::Transport(format!("decodificador Opus: {e:?}")))?;

        info!("🔊 Sink de voz instalado sobre el driver");
        Ok(Self {
            call,
            pcm_tx,
            track,
            decoder: parking_lot::Mutex::new(decoder),
        })
    }

    /// Opus -> PCM i16 -> bytes f32 little-endian para el driver.
    fn decode_frame(&self, frame: &[u8]) -> Result<Vec<u8>, SinkError> {
        let mut pcm = vec![0i16; transcode::FRAME_SAMPLES * transcode::CHANNEL_COUNT];
        let per_channel = {
            let packet = audiopus::packet::Packet::try_from(frame)
                .map_err(|e| SinkError::Transport(format!("frame Opus inválido: {e:?}")))?;
            let signals = audiopus::MutSignals::try_from(&mut pcm[..])
                .map_err(|e| SinkError::Transport(format!("frame Opus inválido: {e:?}")))?;
            let mut decoder = self.decoder.lock();
            decoder
                .decode(Some(packet), signals, false)
                .map_err(|e| SinkError::Transport(format!("frame Opus inválido: {e:?}")))?
        };
        pcm.truncate(per_channel * transcode::CHANNEL_COUNT);

        let mut out = Vec::with_capacity(pcm.len() * 4);
        for sample in pcm {
            out.extend_from_slice(&(f32::from(sample) / 32_768.0).to_le_bytes());
        }
        Ok(out)
    }
}

#[async_trait]
impl crate::voice::VoiceSink for SongbirdSink {
    async fn set_speaking(&self, speaking: bool) -> Result<(), SinkError> {
        let result = if speaking {
            self.track.play()
        } else {
            self.track.pause()
        };
        result.map_err(|e| SinkError::Transport(e.to_string()))
    }

    async fn send_frame(&self, frame: Bytes) -> Result<(), SinkError> {
        let pcm = self.decode_frame(&frame)?;
        self.pcm_tx
            .send_async(pcm)
            .await
            .map_err(|_| SinkError::Closed)
    }

    async fn disconnect(&self) -> Result<(), SinkError> {
        let _ = self.track.stop();
        let mut call = self.call.lock().await;
        call.leave()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        info!("👋 Sink de voz desconectado");
        Ok(())
    }
}

/// Lado lector del canal de PCM, consumido por el driver como
/// `MediaSource` en vivo (sin seek, longitud desconocida).
struct PcmFeed {
    rx: flume::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl PcmFeed {
    fn new(rx: flume::Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            offset: 0,
        }
    }
}

impl Read for PcmFeed {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.offset >= self.pending.len() {
            // recv bloquea el hilo de audio hasta el próximo frame; con
            // todos los emisores cerrados el stream termina limpio
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                Err(_) => return Ok(0),
            }
        }

        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

impl Seek for PcmFeed {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream de voz en vivo",
        ))
    }
}

impl MediaSource for PcmFeed {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}
