//! Response writers for the fake IMAP server. Every write is flushed,
//! so a response is on the wire before the next command is read.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

async fn send<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    chunks: &[&[u8]],
) -> std::io::Result<()> {
    let inner = stream.get_mut();
    for chunk in chunks {
        inner.write_all(chunk).await?;
    }
    inner.flush().await
}

/// Write one complete response line (the caller supplies `\r\n`).
pub async fn write_line<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    line: &str,
) -> std::io::Result<()> {
    send(stream, &[line.as_bytes()]).await
}

/// Write `prefix {n}\r\n` followed by the `n` bytes of `data`.
pub async fn write_literal<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    prefix: &str,
    data: &[u8],
) -> std::io::Result<()> {
    let announce = format!("{prefix} {{{}}}\r\n", data.len());
    send(stream, &[announce.as_bytes(), data]).await
}

/// Announce a literal of `data.len()` bytes but send only the first
/// half, as a connection cut mid-transfer would.
pub async fn write_short_literal<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    prefix: &str,
    data: &[u8],
) -> std::io::Result<()> {
    let announce = format!("{prefix} {{{}}}\r\n", data.len());
    send(stream, &[announce.as_bytes(), &data[..data.len() / 2]]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn capture<F, Fut>(write: F) -> Vec<u8>
    where
        F: FnOnce(BufReader<tokio::io::DuplexStream>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let (mut client, server) = tokio::io::duplex(1024);
        write(BufReader::new(server)).await;
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn literal_is_counted_in_bytes() {
        let out = capture(|mut s| async move {
            write_literal(&mut s, "* 1 FETCH (UID 3 BODY[]", "héllo".as_bytes())
                .await
                .unwrap();
        })
        .await;
        assert_eq!(out, "* 1 FETCH (UID 3 BODY[] {6}\r\nhéllo".as_bytes());
    }

    #[tokio::test]
    async fn short_literal_keeps_full_announcement() {
        let out = capture(|mut s| async move {
            write_short_literal(&mut s, "X", b"abcdefgh").await.unwrap();
        })
        .await;
        assert_eq!(out, b"X {8}\r\nabcd");
    }
}
