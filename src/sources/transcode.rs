use std::{path::Path, process::Stdio};

use anyhow::{Context, Result};
use audiopus::{coder::Encoder, Application, Bitrate, Channels, SampleRate};

use crate::audio::frames;

/// Frecuencia de muestreo del transporte de voz.
pub const SAMPLE_RATE: u32 = 48_000;
/// Canales del transporte de voz.
pub const CHANNEL_COUNT: usize = 2;
/// Muestras por canal en un frame de 20 ms a 48 kHz.
pub const FRAME_SAMPLES: usize = 960;
/// Muestras i16 intercaladas por frame.
const SAMPLES_PER_FRAME: usize = FRAME_SAMPLES * CHANNEL_COUNT;
/// Tope recomendado para un paquete Opus.
const MAX_OPUS_PACKET: usize = 4000;

/// Decodifica `input` a PCM s16le 48 kHz estéreo con ffmpeg, codifica
/// frames Opus de 20 ms y escribe el archivo de caché en `output`.
///
/// `start_offset` recorta los primeros segundos del audio antes de
/// codificar (el parámetro `t=` de los enlaces).
pub async fn to_frame_cache(
    input: &Path,
    output: &Path,
    opus_bitrate: u32,
    start_offset: Option<u64>,
) -> Result<()> {
    let pcm = decode_to_pcm(input, start_offset).await?;
    let encoded = encode_frames(&pcm, opus_bitrate)?;

    let mut buffer = Vec::new();
    frames::write_frames(&mut buffer, encoded.iter().map(|f| f.as_slice()))
        .context("serializando frames al formato de caché")?;
    tokio::fs::write(output, buffer)
        .await
        .with_context(|| format!("escribiendo {}", output.display()))?;
    Ok(())
}

/// Corre ffmpeg y devuelve el PCM crudo completo de stdout.
async fn decode_to_pcm(input: &Path, start_offset: Option<u64>) -> Result<Vec<u8>> {
    let mut cmd = tokio::process::Command::new("ffmpeg");
    if let Some(seconds) = start_offset {
        cmd.args(["-ss", &seconds.to_string()]);
    }
    cmd.arg("-i")
        .arg(input)
        .args(["-f", "s16le", "-ar", "48000", "-ac", "2", "-loglevel", "error", "pipe:1"])
        .stdin(Stdio::null());

    let output = cmd.output().await.context("no se pudo ejecutar ffmpeg")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffmpeg falló decodificando {}: {stderr}", input.display());
    }
    if output.stdout.is_empty() {
        anyhow::bail!("ffmpeg no produjo audio para {}", input.display());
    }
    Ok(output.stdout)
}

/// Codifica el PCM en frames Opus independientes de 20 ms.
fn encode_frames(pcm: &[u8], opus_bitrate: u32) -> Result<Vec<Vec<u8>>> {
    let mut encoder = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
        .map_err(|e| anyhow::anyhow!("no se pudo crear el codificador Opus: {e:?}"))?;
    encoder
        .set_bitrate(Bitrate::BitsPerSecond(opus_bitrate as i32))
        .map_err(|e| anyhow::anyhow!("bitrate Opus rechazado: {e:?}"))?;

    let samples = pcm_to_samples(pcm);
    let mut packet = vec![0u8; MAX_OPUS_PACKET];
    let mut encoded = Vec::with_capacity(samples.len() / SAMPLES_PER_FRAME + 1);

    for chunk in frame_chunks(&samples) {
        let written = encoder
            .encode(chunk.as_slice(), packet.as_mut_slice())
            .map_err(|e| anyhow::anyhow!("error codificando frame Opus: {e:?}"))?;
        encoded.push(packet[..written].to_vec());
    }

    Ok(encoded)
}

/// Interpreta bytes s16le intercalados como muestras. Un byte suelto al
/// final se descarta.
fn pcm_to_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Parte las muestras en frames completos; el último se rellena con
/// silencio porque el codificador exige frames de tamaño exacto.
fn frame_chunks(samples: &[i16]) -> Vec<Vec<i16>> {
    samples
        .chunks(SAMPLES_PER_FRAME)
        .map(|chunk| {
            let mut frame = chunk.to_vec();
            frame.resize(SAMPLES_PER_FRAME, 0);
            frame
        })
        .collect()
}
