/*
[INPUT]:  Stream kind + payload bytes
[OUTPUT]: Multiplexed stdout/stderr frames (8-byte header + payload)
[POS]:    Wire format layer - framing shared by runtimes and the demuxer
[UPDATE]: When changing the frame header layout or stream kinds
*/

/// Length of the frame header preceding every payload
pub const FRAME_HEADER_LEN: usize = 8;

/// Stream a frame belongs to, as encoded in header byte 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
    /// Error message injected by the runtime itself
    System,
}

impl StreamKind {
    pub fn as_byte(self) -> u8 {
        match self {
            StreamKind::Stdin => 0,
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
            StreamKind::System => 3,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(StreamKind::Stdin),
            1 => Some(StreamKind::Stdout),
            2 => Some(StreamKind::Stderr),
            3 => Some(StreamKind::System),
            _ => None,
        }
    }
}

/// Encode one frame. Payloads larger than `u32::MAX` are split.
pub fn encode_frame(kind: StreamKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    for chunk in payload.chunks(u32::MAX as usize) {
        out.push(kind.as_byte());
        out.extend_from_slice(&[0, 0, 0]);
        out.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
        out.extend_from_slice(chunk);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_header() {
        let frame = encode_frame(StreamKind::Stderr, b"boom\n");
        assert_eq!(&frame[..FRAME_HEADER_LEN], &[2, 0, 0, 0, 0, 0, 0, 5]);
        assert_eq!(&frame[FRAME_HEADER_LEN..], b"boom\n");
    }

    #[test]
    fn test_stream_kind_bytes() {
        for kind in [
            StreamKind::Stdin,
            StreamKind::Stdout,
            StreamKind::Stderr,
            StreamKind::System,
        ] {
            assert_eq!(StreamKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(StreamKind::from_byte(9), None);
    }
}
