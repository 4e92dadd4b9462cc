//! Length-prefixed frame IO over a byte stream.

use sehat_protocol::{frame_length, LENGTH_PREFIX_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::NetworkError;

/// Write an already-encoded frame (length prefix included) and flush.
pub async fn write_framed<W>(writer: &mut W, frame: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}

/// Read one frame body. Returns `Ok(None)` when the peer closed the stream
/// cleanly between frames.
pub async fn read_framed<R>(reader: &mut R) -> Result<Option<Vec<u8>>, NetworkError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(NetworkError::Io(e.to_string())),
    }
    let len = frame_length(prefix)?;
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| NetworkError::Io(e.to_string()))?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sehat_protocol::{encode, Message, MessageBody, MAX_MESSAGE_SIZE};

    #[tokio::test]
    async fn frames_survive_a_stream() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let msg = Message::new("v1", MessageBody::PeersRequest);
        let frame = encode(&msg).unwrap();

        write_framed(&mut a, &frame).await.unwrap();
        write_framed(&mut a, &frame).await.unwrap();
        drop(a);

        let first = read_framed(&mut b).await.unwrap().unwrap();
        assert_eq!(sehat_protocol::decode(&first).unwrap(), msg);
        assert!(read_framed(&mut b).await.unwrap().is_some());
        assert!(read_framed(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_an_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let prefix = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes();
        a.write_all(&prefix).await.unwrap();

        assert!(matches!(
            read_framed(&mut b).await,
            Err(NetworkError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&10u32.to_be_bytes()).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);

        assert!(matches!(read_framed(&mut b).await, Err(NetworkError::Io(_))));
    }
}
