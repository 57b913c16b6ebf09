use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading newline-delimited JSON records from a chunk stream.
///
/// Records are returned as raw lines, parsing is left to the caller. Chunk
/// boundaries may fall anywhere, including inside a multi-byte character.
pub struct NdJson {
    buf: Vec<u8>,
    chunks: Chunks,
    exhausted: bool,
}

impl NdJson {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
            exhausted: false,
        }
    }

    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(line) = self.try_take_line()? {
                return Ok(Some(line));
            }
            if self.exhausted {
                // The last record may come without a trailing newline.
                if self.buf.iter().all(u8::is_ascii_whitespace) {
                    self.buf.clear();
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buf);
                return decode_line(&rest).map(Some);
            }

            match self.chunks.next_chunk().await.map_err(Error::ChunksError)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.exhausted = true,
            }
        }
    }

    fn try_take_line(&mut self) -> Result<Option<String>, Error> {
        while let Some(eol_idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=eol_idx).collect();
            let line = decode_line(&line[..eol_idx])?;
            if !line.is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

fn decode_line(bytes: &[u8]) -> Result<String, Error> {
    let Ok(line) = std::str::from_utf8(bytes) else {
        return Err(Error::InvalidPayload);
    };
    Ok(line.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_normal_lines() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"{\"a\":1}\n"),
                Bytes::from_static(b"{\"b\":2}\n"),
            ]
            .into(),
        );
        let mut lines = NdJson::new(chunks);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"b\":2}");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_chunks() {
        // "é" is split between the two chunks.
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"{\"t\":\"caf\xc3"),
                Bytes::from_static(b"\xa9\"}\n\n{\"t\":"),
                Bytes::from_static(b"\"end\"}"),
            ]
            .into(),
        );
        let mut lines = NdJson::new(chunks);
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"t\":\"café\"}"
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"t\":\"end\"}"
        );
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"\xff\xfe\n")].into(),
        );
        let mut lines = NdJson::new(chunks);
        assert_eq!(
            lines.next_line().await.unwrap_err(),
            Error::InvalidPayload
        );
    }
}
