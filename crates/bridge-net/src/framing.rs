//! Length-prefixed framing for bridge commands
//!
//! Each frame is a 4-byte little-endian length followed by UTF-8 text.
//! One command frame and one reply frame per connection. The length prefix
//! replaces the single bounded `recv` of earlier bridge generations, which
//! silently truncated oversized commands; an oversized frame is now an
//! explicit protocol error on both sides.

use bridge_core::{BridgeError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size. Commands carry paths and short names; anything
/// larger is malformed.
pub const MAX_FRAME: usize = 64 * 1024;

/// Write one text frame
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> Result<()> {
    let data = text.as_bytes();
    if data.len() > MAX_FRAME {
        return Err(BridgeError::Protocol(format!(
            "Frame too large: {} bytes (max {})",
            data.len(),
            MAX_FRAME
        )));
    }

    let len = (data.len() as u32).to_le_bytes();
    writer
        .write_all(&len)
        .await
        .map_err(|e| BridgeError::Transport(format!("Write length failed: {}", e)))?;
    writer
        .write_all(data)
        .await
        .map_err(|e| BridgeError::Transport(format!("Write data failed: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| BridgeError::Transport(format!("Flush failed: {}", e)))?;

    Ok(())
}

/// Read one text frame
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .await
        .map_err(|e| BridgeError::Transport(format!("Read length failed: {}", e)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_FRAME {
        return Err(BridgeError::Protocol(format!(
            "Frame too large: {} bytes (max {})",
            len, MAX_FRAME
        )));
    }

    let mut data = vec![0u8; len];
    reader
        .read_exact(&mut data)
        .await
        .map_err(|e| BridgeError::Transport(format!("Read data failed: {}", e)))?;

    String::from_utf8(data)
        .map_err(|e| BridgeError::Protocol(format!("Frame is not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, "IMPORT|/tmp/shot_crate_toPeerB.fbx")
            .await
            .unwrap();
        let text = read_frame(&mut b).await.unwrap();
        assert_eq!(text, "IMPORT|/tmp/shot_crate_toPeerB.fbx");
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let huge = ((MAX_FRAME + 1) as u32).to_le_bytes();
        tokio::io::AsyncWriteExt::write_all(&mut a, &huge).await.unwrap();
        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }

    #[tokio::test]
    async fn oversized_outbound_frame_is_rejected() {
        let (mut a, _b) = tokio::io::duplex(64);
        let text = "X".repeat(MAX_FRAME + 1);
        let err = write_frame(&mut a, &text).await.unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }

    #[tokio::test]
    async fn truncated_stream_is_a_transport_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        // Announce 10 bytes, deliver 3, close.
        tokio::io::AsyncWriteExt::write_all(&mut a, &10u32.to_le_bytes())
            .await
            .unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut a, b"abc").await.unwrap();
        drop(a);
        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }
}
