//! Pulling the JSON body out of a raw HTTP response stream.
//!
//! The response is read one chunk at a time into a fixed receive buffer. A
//! two-state scanner drops the status line and headers, then the body is
//! copied into the caller's payload buffer until it is full; anything past
//! that is drained and discarded.

use crate::{
    errors::Error,
    ports::{ReadOutcome, TransportStream, WriteOutcome},
    Result,
};

/// Blank line that ends the headers, followed by the opening brace of the
/// JSON body.
const MARKER: &[u8] = b"\r\n\r\n{";
const CARRY: usize = MARKER.len() - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    AwaitingBoundary,
    Copying,
    Done,
}

/// Finds the header/body boundary across chunk edges.
///
/// The last few bytes of every chunk that did not contain the marker are kept
/// so a marker split over two reads is still found.
#[derive(Clone, Debug, Default)]
pub struct BoundaryScanner {
    tail: [u8; CARRY],
    tail_len: usize,
}

impl BoundaryScanner {
    /// Index in `chunk` where the payload (`{`) starts, if the boundary ends
    /// inside this chunk.
    pub fn scan(&mut self, chunk: &[u8]) -> Option<usize> {
        if self.tail_len > 0 {
            let head = chunk.len().min(CARRY);
            let mut window = [0u8; CARRY * 2];
            window[..self.tail_len].copy_from_slice(&self.tail[..self.tail_len]);
            window[self.tail_len..self.tail_len + head].copy_from_slice(&chunk[..head]);

            // The tail alone is shorter than the marker, so a hit here always
            // ends inside `chunk`.
            if let Some(pos) = find(&window[..self.tail_len + head], MARKER) {
                return Some(pos + CARRY - self.tail_len);
            }
        }

        if let Some(pos) = find(chunk, MARKER) {
            return Some(pos + CARRY);
        }

        self.remember_tail(chunk);
        None
    }

    fn remember_tail(&mut self, chunk: &[u8]) {
        if chunk.len() >= CARRY {
            self.tail.copy_from_slice(&chunk[chunk.len() - CARRY..]);
            self.tail_len = CARRY;
            return;
        }

        let keep = (self.tail_len + chunk.len()).min(CARRY);
        let from_tail = keep - chunk.len();
        let mut next = [0u8; CARRY];
        next[..from_tail].copy_from_slice(&self.tail[self.tail_len - from_tail..self.tail_len]);
        next[from_tail..keep].copy_from_slice(chunk);
        self.tail = next;
        self.tail_len = keep;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// How much of the body ended up in the payload buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramedPayload {
    pub len: usize,
    /// Body bytes were dropped because the payload buffer was full.
    pub truncated: bool,
}

/// Drives reads from a transport stream and frames the response body.
///
/// Owns the receive buffer; it is allocated once and zeroed before every
/// physical read.
#[derive(Debug)]
pub struct FramedTransportReader {
    receive: Box<[u8]>,
}

impl FramedTransportReader {
    pub fn new(receive_capacity: usize) -> Self {
        Self {
            receive: vec![0u8; receive_capacity.max(1)].into_boxed_slice(),
        }
    }

    /// Read the whole response from `stream`, copying at most
    /// `payload_out.len()` body bytes into `payload_out`.
    ///
    /// Truncation is not an error here; the caller decides what to do with
    /// `FramedPayload::truncated`.
    pub async fn read_payload(
        &mut self,
        stream: &mut dyn TransportStream,
        payload_out: &mut [u8],
    ) -> Result<FramedPayload> {
        let mut state = FrameState::AwaitingBoundary;
        let mut scanner = BoundaryScanner::default();
        let mut len = 0usize;
        let mut truncated = false;

        loop {
            if state == FrameState::Done {
                break;
            }

            self.receive.fill(0);
            let n = match stream.read(&mut self.receive).await.map_err(read_failed)? {
                ReadOutcome::WouldBlock => {
                    tokio::task::yield_now().await;
                    continue;
                }
                ReadOutcome::Closed => {
                    state = FrameState::Done;
                    continue;
                }
                ReadOutcome::Data(n) => n.min(self.receive.len()),
            };
            let chunk = &self.receive[..n];

            let body = match state {
                FrameState::AwaitingBoundary => match scanner.scan(chunk) {
                    Some(start) => {
                        tracing::trace!(skipped = start, "payload boundary found");
                        state = FrameState::Copying;
                        &chunk[start..]
                    }
                    None => continue,
                },
                FrameState::Copying => chunk,
                FrameState::Done => break,
            };

            let take = body.len().min(payload_out.len() - len);
            payload_out[len..len + take].copy_from_slice(&body[..take]);
            len += take;
            if take < body.len() {
                truncated = true;
            }
        }

        Ok(FramedPayload { len, truncated })
    }
}

/// Write all of `bytes`, retrying on `WouldBlock`.
pub async fn write_request(stream: &mut dyn TransportStream, bytes: &[u8]) -> Result<()> {
    let mut written = 0usize;
    while written < bytes.len() {
        match stream
            .write(&bytes[written..])
            .await
            .map_err(write_failed)?
        {
            WriteOutcome::Written(0) => {
                return Err(Error::TransportWriteFailed(
                    "stream accepted zero bytes".to_string(),
                ))
            }
            WriteOutcome::Written(n) => written += n.min(bytes.len() - written),
            WriteOutcome::WouldBlock => tokio::task::yield_now().await,
        }
    }
    tracing::trace!(bytes = written, "request written");
    Ok(())
}

fn read_failed(e: Error) -> Error {
    if e.is_transport() {
        e
    } else {
        Error::TransportReadFailed(e.to_string())
    }
}

fn write_failed(e: Error) -> Error {
    if e.is_transport() {
        e
    } else {
        Error::TransportWriteFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedStream, Step};

    const RESPONSE: &[u8] =
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 23\r\n\r\n{\"ok\":true,\"result\":[]}";

    fn split_into(bytes: &[u8], sizes: &[usize]) -> Vec<Step> {
        let mut steps = Vec::new();
        let mut rest = bytes;
        for &size in sizes {
            if rest.is_empty() {
                break;
            }
            let n = size.min(rest.len());
            steps.push(Step::Data(rest[..n].to_vec()));
            rest = &rest[n..];
        }
        if !rest.is_empty() {
            steps.push(Step::Data(rest.to_vec()));
        }
        steps.push(Step::Closed);
        steps
    }

    async fn frame(steps: Vec<Step>, receive: usize, payload: usize) -> (Vec<u8>, FramedPayload) {
        let mut stream = ScriptedStream::new(steps);
        let mut reader = FramedTransportReader::new(receive);
        let mut out = vec![0u8; payload];
        let framed = reader.read_payload(&mut stream, &mut out).await.unwrap();
        out.truncate(framed.len);
        (out, framed)
    }

    #[test]
    fn scanner_finds_marker_in_one_chunk() {
        let mut s = BoundaryScanner::default();
        assert_eq!(s.scan(b"HTTP/1.1 200 OK\r\n\r\n{}"), Some(19));
    }

    #[test]
    fn scanner_finds_marker_split_across_chunks() {
        for split in 1..MARKER.len() {
            let mut s = BoundaryScanner::default();
            let mut first = b"X-Header: 1".to_vec();
            first.extend_from_slice(&MARKER[..split]);
            let mut second = MARKER[split..].to_vec();
            second.extend_from_slice(b"\"ok\":true}");

            assert_eq!(s.scan(&first), None, "split at {split}");
            assert_eq!(s.scan(&second), Some(MARKER.len() - split - 1), "split at {split}");
        }
    }

    #[test]
    fn scanner_handles_tiny_chunks() {
        let mut s = BoundaryScanner::default();
        let input = b"H: v\r\n\r\n{x";
        let mut found = None;
        for (i, b) in input.iter().enumerate() {
            if let Some(start) = s.scan(std::slice::from_ref(b)) {
                found = Some((i, start));
                break;
            }
        }
        assert_eq!(found, Some((8, 0)));
    }

    #[test]
    fn scanner_ignores_blank_line_without_brace() {
        let mut s = BoundaryScanner::default();
        assert_eq!(s.scan(b"HTTP/1.1 502 Bad Gateway\r\n\r\n<html>"), None);
    }

    #[tokio::test]
    async fn single_chunk_response_is_framed() {
        let (out, framed) = frame(split_into(RESPONSE, &[512]), 512, 512).await;
        assert_eq!(out, br#"{"ok":true,"result":[]}"#);
        assert!(!framed.truncated);
    }

    #[tokio::test]
    async fn would_block_is_retried() {
        let mut steps = vec![Step::WouldBlock, Step::WouldBlock];
        steps.extend(split_into(RESPONSE, &[10, 7, 60, 3]));
        steps.insert(4, Step::WouldBlock);
        let (out, _) = frame(steps, 512, 512).await;
        assert_eq!(out, br#"{"ok":true,"result":[]}"#);
    }

    #[tokio::test]
    async fn small_receive_buffer_spreads_reads() {
        let (out, framed) = frame(split_into(RESPONSE, &[RESPONSE.len()]), 16, 512).await;
        assert_eq!(out, br#"{"ok":true,"result":[]}"#);
        assert!(!framed.truncated);
    }

    #[tokio::test]
    async fn payload_is_truncated_at_capacity() {
        let (out, framed) = frame(split_into(RESPONSE, &[70, 5, 5]), 512, 10).await;
        assert_eq!(out, br#"{"ok":true"#);
        assert_eq!(framed.len, 10);
        assert!(framed.truncated);
    }

    #[tokio::test]
    async fn missing_boundary_yields_empty_payload() {
        let (out, framed) = frame(
            split_into(b"HTTP/1.1 502 Bad Gateway\r\n\r\n<html></html>", &[512]),
            512,
            64,
        )
        .await;
        assert!(out.is_empty());
        assert!(!framed.truncated);
    }

    #[tokio::test]
    async fn read_error_aborts() {
        let mut stream = ScriptedStream::new(vec![
            Step::Data(b"HTTP/1.1 200 OK\r\n".to_vec()),
            Step::Fail,
        ]);
        let mut reader = FramedTransportReader::new(64);
        let mut out = [0u8; 64];
        let err = reader.read_payload(&mut stream, &mut out).await.unwrap_err();
        assert!(matches!(err, Error::TransportReadFailed(_)));
    }

    #[tokio::test]
    async fn write_request_retries_partial_writes() {
        let mut stream = ScriptedStream::new(vec![]).with_write_limit(3).with_write_blocks(2);
        write_request(&mut stream, b"POST / HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(stream.written(), b"POST / HTTP/1.1\r\n\r\n");
    }
}
