use x11rb::connection::Connection;

/// The smallest chunk size we'll ever use, regardless of what the server
/// reports. Matches the source's final fallback (`libxclip.c`: "If this
/// fails for some reason, we fallback to this").
const MIN_CHUNK_SIZE: usize = 4096;

/// Splits a payload into the chunks the owner loop writes one at a time
/// during an INCR transfer.
///
/// `chunk_size` is a quarter of the server's maximum request size, floored
/// at [`MIN_CHUNK_SIZE`]. The quarter-limit margin reserves headroom for
/// request framing; too large risks `BadLength`, too small wastes round
/// trips.
pub(crate) struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    pub(crate) fn new(conn: &impl Connection) -> Self {
        let max_request_bytes = conn.maximum_request_bytes();
        Self { chunk_size: (max_request_bytes / 4).max(MIN_CHUNK_SIZE) }
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// A payload this long fits in a single property write; no INCR
    /// transfer needed.
    pub(crate) fn is_small(&self, payload_len: usize) -> bool {
        payload_len <= self.chunk_size
    }

    /// The next slice to write for a transfer that has already sent
    /// `bytes_sent` bytes of `payload`. Empty once `bytes_sent == payload.len()`,
    /// which the owner loop writes as the terminating chunk.
    pub(crate) fn next_chunk<'a>(&self, payload: &'a [u8], bytes_sent: usize) -> &'a [u8] {
        let remaining = payload.len() - bytes_sent;
        let this_chunk = remaining.min(self.chunk_size);
        &payload[bytes_sent..bytes_sent + this_chunk]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker_with_size(chunk_size: usize) -> Chunker {
        Chunker { chunk_size }
    }

    #[test]
    fn small_payload_is_single_shot() {
        let chunker = chunker_with_size(16);
        assert!(chunker.is_small(16));
        assert!(!chunker.is_small(17));
    }

    #[test]
    fn chunks_cover_the_whole_payload() {
        let chunker = chunker_with_size(3);
        let payload = b"Foobarbaz";
        let mut bytes_sent = 0;
        let mut reassembled = Vec::new();
        loop {
            let chunk = chunker.next_chunk(payload, bytes_sent);
            if chunk.is_empty() {
                break;
            }
            reassembled.extend_from_slice(chunk);
            bytes_sent += chunk.len();
        }
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn empty_payload_yields_only_the_terminator() {
        let chunker = chunker_with_size(4096);
        assert!(chunker.next_chunk(b"", 0).is_empty());
    }
}
