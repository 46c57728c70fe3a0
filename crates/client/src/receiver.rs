//! C6: receiving one page's raw pixels from the server and persisting them
//! to a scratch file.
//!
//! This is the trusted side's mirror of the server's `pixelize` module: the
//! server never writes files the client doesn't ask for, so every dimension
//! and byte count here has already gone through [`qvm_sanitize_protocol`]'s
//! validated types before we touch the filesystem.

use qvm_sanitize_protocol::{Dimensions, SanitizeError, framing};

use crate::prelude::*;

/// One page's worth of raw pixels, received and written to scratch.
pub struct ReceivedPage {
    pub dimensions: Dimensions,
    pub rgb_path: PathBuf,
}

/// Read one `<width> <height>\n` line and the raw pixel payload that
/// follows it, and write the payload to `scratch_dir/<page_number>.rgb`.
pub async fn receive_page<R>(
    reader: &mut R,
    scratch_dir: &Path,
    page_number: u32,
) -> Result<ReceivedPage, SanitizeError>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let dimensions = framing::read_dim_line(reader).await?;
    let bytes = framing::read_page_bytes(reader, dimensions).await?;

    let rgb_path = scratch_dir.join(format!("{page_number}.rgb"));
    tokio::fs::write(&rgb_path, &bytes).await.map_err(|err| {
        SanitizeError::ReceiveError(format!(
            "failed to write scratch file {}: {err}",
            rgb_path.display()
        ))
    })?;

    Ok(ReceivedPage {
        dimensions,
        rgb_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvm_sanitize_protocol::framing as wire;

    #[tokio::test]
    async fn receives_and_persists_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let dim = Dimensions::validate(2, 2).unwrap();
        let pixels = vec![7u8; dim.byte_size() as usize];

        let (mut client, mut server) = tokio::io::duplex(4096);
        let writer_task = tokio::spawn(async move {
            wire::write_dim_line(&mut server, dim).await.unwrap();
            wire::write_page_bytes(&mut server, &pixels).await.unwrap();
        });

        let mut reader = tokio::io::BufReader::new(&mut client);
        let page = receive_page(&mut reader, dir.path(), 1).await.unwrap();
        writer_task.await.unwrap();

        assert_eq!(page.dimensions, dim);
        let on_disk = tokio::fs::read(&page.rgb_path).await.unwrap();
        assert_eq!(on_disk.len(), dim.byte_size() as usize);
        assert!(on_disk.iter().all(|&b| b == 7));
    }
}
