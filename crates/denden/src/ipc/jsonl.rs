use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame, newline included.
pub const MAX_FRAME_BYTES: u64 = 4 * 1024 * 1024;

/// Writes `value` as one newline-terminated frame and flushes, so the peer
/// sees the whole request before this side starts waiting for a reply.
pub async fn write_jsonl<W, T>(writer: &mut W, value: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = serde_json::to_vec(value).map_err(malformed_frame)?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next non-blank line and decodes it.
///
/// Returns `Ok(None)` on a clean EOF. Undecodable or oversized frames are
/// reported as [`io::ErrorKind::InvalidData`].
pub async fn read_jsonl<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    loop {
        line.clear();
        let n = (&mut *reader)
            .take(MAX_FRAME_BYTES)
            .read_line(&mut line)
            .await?;
        if n == 0 {
            return Ok(None);
        }
        if n as u64 >= MAX_FRAME_BYTES && !line.ends_with('\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame exceeds {MAX_FRAME_BYTES} bytes"),
            ));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value = serde_json::from_str(trimmed).map_err(malformed_frame)?;
        return Ok(Some(value));
    }
}

fn malformed_frame(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
