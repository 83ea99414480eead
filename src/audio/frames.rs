//! Formato del archivo de caché de frames.
//!
//! Una secuencia de registros: prefijo de longitud `i16` little-endian
//! seguido de esa cantidad de bytes de payload Opus. Fin de archivo al
//! leer un prefijo (incluso parcial) es un fin de stream limpio; fin de
//! archivo a mitad de un payload es corrupción.

use std::io::{ErrorKind, Read, Write};

use bytes::Bytes;

use crate::error::LoadError;

/// Lee todos los frames de un stream en formato de caché.
pub fn read_frames<R: Read>(mut reader: R) -> Result<Vec<Bytes>, LoadError> {
    let mut frames = Vec::new();

    loop {
        let mut prefix = [0u8; 2];
        match reader.read_exact(&mut prefix) {
            Ok(()) => {}
            // EOF en el prefijo (total o parcial) marca el final del stream
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(LoadError::Io(e)),
        }

        let len = i16::from_le_bytes(prefix);
        if len < 0 {
            return Err(LoadError::InvalidLength(len));
        }

        let mut payload = vec![0u8; len as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => frames.push(Bytes::from(payload)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(LoadError::TruncatedFrame);
            }
            Err(e) => return Err(LoadError::Io(e)),
        }
    }

    Ok(frames)
}

/// Escribe frames Opus en el formato de caché.
pub fn write_frames<'a, W, I>(mut writer: W, frames: I) -> std::io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a [u8]>,
{
    for frame in frames {
        let len = i16::try_from(frame.len()).map_err(|_| {
            std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("frame de {} bytes excede el prefijo i16", frame.len()),
            )
        })?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(frame)?;
    }
    writer.flush()
}
