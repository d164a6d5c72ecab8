//! Scripted transport fakes shared by the unit tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    errors::Error,
    ports::{Connector, Endpoint, ReadOutcome, TransportStream, WriteOutcome},
    Result,
};

#[derive(Clone, Debug)]
pub enum Step {
    Data(Vec<u8>),
    WouldBlock,
    Closed,
    Fail,
    /// Never completes; used to trip the cycle deadline.
    Stall,
}

pub struct ScriptedStream {
    steps: VecDeque<Step>,
    written: Vec<u8>,
    write_limit: usize,
    write_blocks: usize,
    sink: Option<Arc<Mutex<Vec<Vec<u8>>>>>,
}

impl ScriptedStream {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            written: Vec::new(),
            write_limit: usize::MAX,
            write_blocks: 0,
            sink: None,
        }
    }

    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = limit.max(1);
        self
    }

    pub fn with_write_blocks(mut self, blocks: usize) -> Self {
        self.write_blocks = blocks;
        self
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }
}

#[async_trait]
impl TransportStream for ScriptedStream {
    async fn write(&mut self, bytes: &[u8]) -> Result<WriteOutcome> {
        if self.write_blocks > 0 {
            self.write_blocks -= 1;
            return Ok(WriteOutcome::WouldBlock);
        }
        let n = bytes.len().min(self.write_limit);
        self.written.extend_from_slice(&bytes[..n]);
        Ok(WriteOutcome::Written(n))
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        match self.steps.pop_front() {
            None | Some(Step::Closed) => Ok(ReadOutcome::Closed),
            Some(Step::WouldBlock) => Ok(ReadOutcome::WouldBlock),
            Some(Step::Fail) => Err(Error::TransportReadFailed("connection reset".to_string())),
            Some(Step::Stall) => std::future::pending().await,
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.steps.push_front(Step::Data(data.split_off(n)));
                }
                Ok(ReadOutcome::Data(n))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(sink) = &self.sink {
            sink.lock()
                .unwrap()
                .push(std::mem::take(&mut self.written));
        }
        Ok(())
    }
}

/// Hands out one scripted stream per `open`, recording every request that
/// was written to them.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    responses: Arc<Mutex<VecDeque<Option<Vec<Step>>>>>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a full HTTP response for the next `open`.
    pub fn respond(&self, status_and_headers: &str, body: &str) -> &Self {
        let raw = format!("{status_and_headers}\r\nContent-Length: {}\r\n\r\n{body}", body.len());
        self.respond_steps(vec![Step::Data(raw.into_bytes()), Step::Closed])
    }

    pub fn respond_json(&self, body: &str) -> &Self {
        self.respond("HTTP/1.1 200 OK\r\nContent-Type: application/json", body)
    }

    pub fn respond_steps(&self, steps: Vec<Step>) -> &Self {
        self.responses.lock().unwrap().push_back(Some(steps));
        self
    }

    /// The next `open` fails.
    pub fn refuse(&self) -> &Self {
        self.responses.lock().unwrap().push_back(None);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| String::from_utf8_lossy(r).into_owned())
            .collect()
    }

    pub fn opens_left(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, _endpoint: &Endpoint) -> Result<Box<dyn TransportStream>> {
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Some(steps)) => {
                let mut stream = ScriptedStream::new(steps);
                stream.sink = Some(self.requests.clone());
                Ok(Box::new(stream))
            }
            Some(None) => Err(Error::TransportOpenFailed("connection refused".to_string())),
            None => Err(Error::TransportOpenFailed("no scripted response".to_string())),
        }
    }
}

/// Body of a request captured by `ScriptedConnector::requests`.
pub fn body_of(request: &str) -> &str {
    request
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or("")
}
