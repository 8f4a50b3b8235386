//! Wire framing rules the hub validates but never interprets (spec §4.4).
//! CRDT payload bytes beyond the kind/subkind prefix are opaque here.

use thiserror::Error;

pub const MAX_FRAME_BYTES: usize = 1024 * 1024;
const SYNC_KIND: u8 = 0x00;
const AWARENESS_KIND: u8 = 0x01;
const VALID_SYNC_SUBKINDS: [u8; 3] = [0, 1, 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Sync,
    Awareness,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is empty")]
    Empty,
    #[error("frame exceeds maximum size of {MAX_FRAME_BYTES} bytes")]
    TooLarge,
    #[error("unknown frame kind byte {0:#04x}")]
    UnknownKind(u8),
    #[error("sync frame shorter than 2 bytes")]
    SyncTooShort,
    #[error("invalid sync sub-kind byte {0}")]
    InvalidSyncSubkind(u8),
    #[error("awareness frame shorter than 2 bytes")]
    AwarenessTooShort,
}

/// Validate and classify an inbound frame per spec §4.4. Never inspects
/// bytes past the kind/subkind prefix.
pub fn classify_frame(frame: &[u8]) -> Result<FrameKind, FrameError> {
    if frame.is_empty() {
        return Err(FrameError::Empty);
    }
    if frame.len() > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge);
    }
    match frame[0] {
        SYNC_KIND => {
            if frame.len() < 2 {
                return Err(FrameError::SyncTooShort);
            }
            if !VALID_SYNC_SUBKINDS.contains(&frame[1]) {
                return Err(FrameError::InvalidSyncSubkind(frame[1]));
            }
            Ok(FrameKind::Sync)
        }
        AWARENESS_KIND => {
            if frame.len() < 2 {
                return Err(FrameError::AwarenessTooShort);
            }
            Ok(FrameKind::Awareness)
        }
        other => Err(FrameError::UnknownKind(other)),
    }
}

/// Build a compactor snapshot blob: for each update in log order, a
/// big-endian u32 length followed by the exact frame bytes.
pub fn build_snapshot_blob<'a>(updates: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    for update in updates {
        out.extend_from_slice(&(update.len() as u32).to_be_bytes());
        out.extend_from_slice(update);
    }
    out
}

/// Split a snapshot blob back into individual frames. Truncation or a
/// mismatched length prefix silently terminates parsing; any well-formed
/// prefix already parsed is returned. No checksum is verified.
pub fn split_snapshot_blob(blob: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut pos = 0usize;
    while pos + 4 <= blob.len() {
        let len = u32::from_be_bytes([blob[pos], blob[pos + 1], blob[pos + 2], blob[pos + 3]])
            as usize;
        pos += 4;
        if pos + len > blob.len() {
            break;
        }
        frames.push(blob[pos..pos + len].to_vec());
        pos += len;
    }
    frames
}
