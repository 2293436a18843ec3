//! The host/worker wire protocol.
//!
//! Every message is a frame: a 4-byte little-endian length followed by that
//! many bytes of bincode. The host sends [`Request`]s and the worker answers
//! each with exactly one [`Response`].

use std::io::{self, Read, Write};
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::result::{CompileFailures, CompiledModule};
use crate::settings::ToolchainSettings;

/// Frames larger than this are rejected.
pub const MAX_FRAME_LEN: u32 = 256 * 1024 * 1024;

/// Handle for a session living in the worker.
pub type SessionId = u32;

/// Messages from host to worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Create the context and resolve seed references.
    Init {
        /// Context configuration.
        settings: ToolchainSettings,
    },
    /// Create a session.
    Create {
        /// Debug build.
        debug: bool,
    },
    /// Add a source unit to a session.
    Load {
        /// Target session.
        session: SessionId,
        /// Display name.
        name: String,
        /// Raw bytes of the unit.
        text: Vec<u8>,
    },
    /// Add a custom reference to a session.
    AddDependency {
        /// Target session.
        session: SessionId,
        /// Module file path.
        path: PathBuf,
    },
    /// Compile a session.
    Compile {
        /// Target session.
        session: SessionId,
        /// Name of the produced module.
        output_name: String,
    },
    /// Drop a session.
    Release {
        /// Target session.
        session: SessionId,
    },
    /// Stop serving.
    Shutdown,
}

/// Messages from worker to host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// The context is up.
    Ready {
        /// Names of every resolved reference.
        references: Vec<String>,
    },
    /// A session was created.
    Created {
        /// Its handle.
        session: SessionId,
    },
    /// The request succeeded and has nothing to return.
    Done,
    /// Compilation succeeded.
    Compiled(CompiledModule),
    /// Compilation produced failing diagnostics.
    CompileFailed(CompileFailures),
    /// The request could not be carried out.
    Failed {
        /// What went wrong.
        message: String,
    },
}

fn invalid_data(reason: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason.into())
}

/// Writes one frame and flushes.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let body = bincode::serde::encode_to_vec(message, bincode::config::standard())
        .map_err(|e| invalid_data(e.to_string()))?;
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| invalid_data(format!("frame of {} bytes is too large", body.len())))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&body)?;
    writer.flush()
}

/// Reads one frame. Returns `None` on a clean end of stream.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<Option<T>> {
    let mut len_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < len_bytes.len() {
        match reader.read(&mut len_bytes[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(invalid_data(format!("frame of {len} bytes is too large")));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    let (message, _) = bincode::serde::decode_from_slice(&body, bincode::config::standard())
        .map_err(|e| invalid_data(e.to_string()))?;
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frames_are_length_prefixed() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Request::Shutdown).unwrap();
        let len = u32::from_le_bytes(buf[..4].try_into().unwrap());
        assert_eq!(len as usize, buf.len() - 4);
    }

    #[test]
    fn several_frames_in_sequence() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Request::Create { debug: true }).unwrap();
        write_frame(&mut buf, &Request::Release { session: 7 }).unwrap();

        let mut cursor = Cursor::new(buf);
        let first: Option<Request> = read_frame(&mut cursor).unwrap();
        let second: Option<Request> = read_frame(&mut cursor).unwrap();
        let end: Option<Request> = read_frame(&mut cursor).unwrap();
        assert_eq!(first, Some(Request::Create { debug: true }));
        assert_eq!(second, Some(Request::Release { session: 7 }));
        assert_eq!(end, None);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Response::Done).unwrap();
        buf.pop();
        let mut cursor = Cursor::new(buf);
        assert!(read_frame::<_, Response>(&mut cursor).is_err());

        let mut partial_len = Cursor::new(vec![1u8, 0]);
        assert!(read_frame::<_, Response>(&mut partial_len).is_err());
    }

    #[test]
    fn oversized_length_rejected() {
        let mut cursor = Cursor::new((MAX_FRAME_LEN + 1).to_le_bytes().to_vec());
        let err = read_frame::<_, Response>(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
