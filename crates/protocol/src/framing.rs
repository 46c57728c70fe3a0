//! The exact byte-level framing used on the wire.
//!
//! ```text
//! C→S: <document bytes> <EOF>
//! S→C: <pagecount>\n
//!      for n in 1..pagecount:
//!          <width> <height>\n
//!          <width*height*3 raw bytes>
//! ```
//!
//! All integers are ASCII decimal. The dim line uses exactly one ASCII
//! space. Newlines are `\n`, never `\r\n`. There is no length prefix on the
//! document upload; the server reads until EOF, so the client must close its
//! write side before expecting the page count.
//!
//! Every function here works over generic `AsyncRead`/`AsyncWrite`, not
//! hardcoded stdio, so the framing itself can be exercised in tests over an
//! in-memory `tokio::io::duplex` pair without spawning any subprocess.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{dimensions::Dimensions, error::SanitizeError, pagecount::PageCount};

/// Read an entire document from `reader` until EOF.
///
/// This has no length prefix on the wire; the only way to know the document
/// is complete is that the writer closed its side.
pub async fn read_document_to_end<R>(reader: &mut R) -> Result<Vec<u8>, SanitizeError>
where
    R: AsyncRead + Unpin,
{
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .await
        .map_err(|err| SanitizeError::TransportBroken(format!("failed to read document: {err}")))?;
    if data.is_empty() {
        return Err(SanitizeError::TransportBroken(
            "no document bytes received".to_owned(),
        ));
    }
    Ok(data)
}

/// Write the document bytes. The caller is responsible for shutting down
/// the write half afterwards so the peer sees EOF.
pub async fn write_document_bytes<W>(writer: &mut W, data: &[u8]) -> Result<(), SanitizeError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(data)
        .await
        .map_err(|err| SanitizeError::TransportBroken(format!("failed to send document: {err}")))
}

/// Read one ASCII line, stripping the trailing `\n` (and any `\r` some
/// misbehaving peer might add), without interpreting it yet.
async fn read_line<R>(reader: &mut R) -> Result<String, SanitizeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .await
        .map_err(|err| SanitizeError::ReceiveError(format!("failed to read line: {err}")))?;
    if n == 0 {
        return Err(SanitizeError::ReceiveError(
            "unexpected EOF waiting for line".to_owned(),
        ));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Write the page count line: one ASCII decimal integer, then `\n`.
pub async fn write_pagecount_line<W>(writer: &mut W, pagecount: PageCount) -> Result<(), SanitizeError>
where
    W: AsyncWrite + Unpin,
{
    let line = format!("{pagecount}\n");
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|err| SanitizeError::TransportBroken(format!("failed to send page count: {err}")))?;
    writer
        .flush()
        .await
        .map_err(|err| SanitizeError::TransportBroken(format!("failed to flush page count: {err}")))
}

/// Read and validate the page count line.
pub async fn read_pagecount_line<R>(reader: &mut R) -> Result<PageCount, SanitizeError>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?;
    let untrusted: i64 = line
        .trim()
        .parse()
        .map_err(|_| SanitizeError::PageError(format!("non-integer page count: {line:?}")))?;
    PageCount::validate(untrusted)
}

/// Write one dim line: `"<width> <height>\n"`.
pub async fn write_dim_line<W>(writer: &mut W, dim: Dimensions) -> Result<(), SanitizeError>
where
    W: AsyncWrite + Unpin,
{
    let line = format!("{} {}\n", dim.width, dim.height);
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|err| SanitizeError::TransportBroken(format!("failed to send dim line: {err}")))
}

/// Read and validate one dim line.
pub async fn read_dim_line<R>(reader: &mut R) -> Result<Dimensions, SanitizeError>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?;
    let mut parts = line.splitn(2, ' ');
    let untrusted_w = parts
        .next()
        .ok_or_else(|| SanitizeError::ReceiveError(format!("malformed dim line: {line:?}")))?;
    let untrusted_h = parts
        .next()
        .ok_or_else(|| SanitizeError::ReceiveError(format!("malformed dim line: {line:?}")))?;
    let untrusted_w: i64 = untrusted_w
        .parse()
        .map_err(|_| SanitizeError::ReceiveError(format!("non-integer width in {line:?}")))?;
    let untrusted_h: i64 = untrusted_h
        .parse()
        .map_err(|_| SanitizeError::ReceiveError(format!("non-integer height in {line:?}")))?;
    Dimensions::validate(untrusted_w, untrusted_h)
}

/// Write the raw RGB bytes for one page. Callers should flush once per
/// page, not per write, to keep syscall counts proportional to page count.
pub async fn write_page_bytes<W>(writer: &mut W, data: &[u8]) -> Result<(), SanitizeError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(data)
        .await
        .map_err(|err| SanitizeError::TransportBroken(format!("failed to send page bytes: {err}")))?;
    writer
        .flush()
        .await
        .map_err(|err| SanitizeError::TransportBroken(format!("failed to flush page bytes: {err}")))
}

/// Read exactly `dim.byte_size()` bytes of raw RGB payload. A short read
/// (peer closed early) is a [`SanitizeError::ReceiveError`], never a panic
/// or a truncated buffer silently accepted.
pub async fn read_page_bytes<R>(reader: &mut R, dim: Dimensions) -> Result<Vec<u8>, SanitizeError>
where
    R: AsyncRead + Unpin,
{
    let size = dim.byte_size();
    let mut buf = vec![0u8; size as usize];
    reader.read_exact(&mut buf).await.map_err(|err| {
        SanitizeError::ReceiveError(format!(
            "expected {size} bytes of page data, read failed: {err}"
        ))
    })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{BufReader, duplex};

    #[tokio::test]
    async fn pagecount_round_trips() {
        let (mut client, server) = duplex(64);
        let mut server = BufReader::new(server);
        let pc = PageCount::validate(42).unwrap();
        write_pagecount_line(&mut client, pc).await.unwrap();
        let got = read_pagecount_line(&mut server).await.unwrap();
        assert_eq!(got, pc);
    }

    #[tokio::test]
    async fn dim_line_round_trips() {
        let (mut client, server) = duplex(64);
        let mut server = BufReader::new(server);
        let dim = Dimensions::validate(800, 600).unwrap();
        write_dim_line(&mut client, dim).await.unwrap();
        let got = read_dim_line(&mut server).await.unwrap();
        assert_eq!(got, dim);
    }

    #[tokio::test]
    async fn oversize_dim_line_is_rejected_before_any_read() {
        let (mut client, server) = duplex(64);
        let mut server = BufReader::new(server);
        client.write_all(b"20000 20000\n").await.unwrap();
        let err = read_dim_line(&mut server).await.unwrap_err();
        assert!(matches!(err, SanitizeError::DimensionError(_)));
    }

    #[tokio::test]
    async fn truncated_page_payload_is_receive_error() {
        let (mut client, server) = duplex(4096);
        let mut server = server;
        let dim = Dimensions::validate(10, 10).unwrap(); // expects 300 bytes
        client.write_all(&vec![0u8; 10]).await.unwrap();
        drop(client); // close early, short of 300 bytes
        let err = read_page_bytes(&mut server, dim).await.unwrap_err();
        assert!(matches!(err, SanitizeError::ReceiveError(_)));
    }

    #[tokio::test]
    async fn malformed_dim_line_is_receive_error() {
        let (mut client, server) = duplex(64);
        let mut server = BufReader::new(server);
        client.write_all(b"not-a-number\n").await.unwrap();
        let err = read_dim_line(&mut server).await.unwrap_err();
        assert!(matches!(err, SanitizeError::ReceiveError(_)));
    }

    #[tokio::test]
    async fn eof_before_pagecount_is_receive_error() {
        let (client, server) = duplex(64);
        drop(client);
        let mut server = BufReader::new(server);
        let err = read_pagecount_line(&mut server).await.unwrap_err();
        assert!(matches!(err, SanitizeError::ReceiveError(_)));
    }

    #[tokio::test]
    async fn page_bytes_round_trip() {
        let (mut client, server) = duplex(4096);
        let mut server = server;
        let dim = Dimensions::validate(2, 2).unwrap(); // 12 bytes
        let payload: Vec<u8> = (0..12).collect();
        write_page_bytes(&mut client, &payload).await.unwrap();
        let got = read_page_bytes(&mut server, dim).await.unwrap();
        assert_eq!(got, payload);
    }
}
