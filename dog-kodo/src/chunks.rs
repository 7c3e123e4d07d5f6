use std::path::Path;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::io::AsyncReadExt;

use crate::{ByteStream, KodoResult};

/// Single-chunk stream over in-memory data
pub fn bytes_source<B: Into<Bytes>>(data: B) -> ByteStream {
    let data = data.into();
    Box::pin(futures_util::stream::once(async move { Ok(data) }))
}

/// Stream a local file in reads of up to `read_size` bytes
pub async fn file_source<P: AsRef<Path>>(path: P, read_size: usize) -> KodoResult<ByteStream> {
    let mut file = tokio::fs::File::open(path).await?;
    let stream = async_stream::stream! {
        let mut buffer = vec![0u8; read_size.max(1)];
        loop {
            match file.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => yield Ok(Bytes::copy_from_slice(&buffer[..n])),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };
    Ok(Box::pin(stream))
}

/// Re-chunk `source` into pieces of exactly `size` bytes.
///
/// Only the final piece may be shorter. An empty source yields nothing, and
/// the first read error ends the stream after being yielded.
pub fn fixed_size(mut source: ByteStream, size: usize) -> ByteStream {
    let size = size.max(1);
    let stream = async_stream::stream! {
        let mut buffer = BytesMut::with_capacity(size);
        while let Some(chunk) = source.next().await {
            let mut chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            while !chunk.is_empty() {
                let take = (size - buffer.len()).min(chunk.len());
                buffer.extend_from_slice(&chunk.split_to(take));
                if buffer.len() == size {
                    yield Ok(buffer.split().freeze());
                }
            }
        }
        if !buffer.is_empty() {
            yield Ok(buffer.split().freeze());
        }
    };
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pieces: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(futures_util::stream::iter(
            pieces.into_iter().map(|p| Ok::<_, std::io::Error>(Bytes::from_static(p))),
        ))
    }

    async fn collect(stream: ByteStream) -> Vec<Bytes> {
        stream.map(|chunk| chunk.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_regroups_uneven_input() {
        let chunks = collect(fixed_size(source(vec![&b"ab"[..], &b"cdefg"[..], &b""[..], &b"h"[..]]), 3)).await;
        assert_eq!(chunks, vec![Bytes::from("abc"), Bytes::from("def"), Bytes::from("gh")]);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_trailing_chunk() {
        let chunks = collect(fixed_size(source(vec![&b"abcdef"[..]]), 2)).await;
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 2));
    }

    #[tokio::test]
    async fn test_empty_source_yields_nothing() {
        assert!(collect(fixed_size(source(vec![]), 4)).await.is_empty());
        assert!(collect(fixed_size(source(vec![&b""[..]]), 4)).await.is_empty());
    }

    #[tokio::test]
    async fn test_read_error_is_forwarded() {
        let failing: ByteStream = Box::pin(futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"a")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone")),
        ]));
        let results: Vec<_> = fixed_size(failing, 4).collect().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[tokio::test]
    async fn test_file_source_reads_whole_file() {
        let path = std::env::temp_dir().join(format!("dog-kodo-chunks-{}", std::process::id()));
        tokio::fs::write(&path, b"0123456789").await.unwrap();

        let chunks = collect(fixed_size(file_source(&path, 3).await.unwrap(), 4)).await;
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(chunks, vec![Bytes::from("0123"), Bytes::from("4567"), Bytes::from("89")]);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = file_source("/definitely/not/here", 4).await;
        assert!(matches!(result, Err(crate::KodoError::Io { .. })));
    }
}
