use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Read one line-delimited JSON frame. Blank lines are skipped; `None`
/// means the peer closed the stream.
pub async fn read_frame<T, R>(reader: &mut R) -> Result<Option<T>>
where
    T: DeserializeOwned,
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            break;
        }
    }
    Ok(Some(serde_json::from_str(line.trim())?))
}

/// Write one frame as line-delimited JSON and flush.
pub async fn write_frame<T, W>(writer: &mut W, frame: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let s = serde_json::to_string(frame)?;
    writer.write_all(s.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
