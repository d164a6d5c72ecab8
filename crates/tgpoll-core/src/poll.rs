//! The poll/dispatch/acknowledge cycle.
//!
//! One worker, one request in flight. Every cycle composes a `getUpdates`
//! request from the current offset, frames and parses the response, hands
//! each text message to the handler (sending its reply, if any) and only then
//! acknowledges the update. One deadline covers everything after compose:
//! transport exchanges, handler calls and replies. Failures abandon the
//! cycle; the loop itself never stops on error.

use std::sync::Arc;

use tokio::time::{sleep, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    connectivity::Connectivity,
    domain::{ChatId, UpdateEvent},
    errors::Error,
    framing::{write_request, FramedPayload, FramedTransportReader},
    messaging::{port::MessageHandler, types::Reply},
    offset::OffsetTracker,
    ports::{Connector, Endpoint},
    reply::compose_reply_into,
    request::{self, Verb},
    security::RecipientPolicy,
    updates::{self, BatchItem},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Requesting,
    Sending,
    Receiving,
    Dispatching,
    Acknowledging,
    Sleeping,
    Error,
}

/// Where the cycle deadline ran out during a dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Expired {
    /// The handler never returned; the update stays unacknowledged.
    InHandler,
    /// The handler ran but its reply did not make it out in time.
    InReply,
}

/// What one cycle did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Text messages found in the response.
    pub received: usize,
    /// Messages handed to the handler.
    pub dispatched: usize,
    pub replies_sent: usize,
    /// Updates that moved the offset forward.
    pub acknowledged: usize,
}

pub struct PollLoop {
    cfg: Arc<Config>,
    connector: Arc<dyn Connector>,
    handler: Arc<dyn MessageHandler>,
    policy: RecipientPolicy,
    offsets: OffsetTracker,
    reader: FramedTransportReader,
    request: Box<[u8]>,
    payload: Box<[u8]>,
    body: Vec<u8>,
    state: PollState,
}

impl PollLoop {
    pub fn new(
        cfg: Arc<Config>,
        connector: Arc<dyn Connector>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            policy: RecipientPolicy::from_ids(&cfg.allowed_chats),
            offsets: OffsetTracker::new(),
            reader: FramedTransportReader::new(cfg.receive_buffer_size),
            request: vec![0u8; cfg.request_buffer_size].into_boxed_slice(),
            payload: vec![0u8; cfg.payload_buffer_size].into_boxed_slice(),
            body: Vec::with_capacity(cfg.request_buffer_size),
            state: PollState::Idle,
            cfg,
            connector,
            handler,
        }
    }

    /// Replace the allow-list derived from the config.
    pub fn with_policy(mut self, policy: RecipientPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn offsets(&self) -> &OffsetTracker {
        &self.offsets
    }

    /// Poll until `shutdown` fires. Waits (without polling) while the link
    /// is down.
    pub async fn run(mut self, mut connectivity: Connectivity, shutdown: CancellationToken) {
        tracing::info!(
            host = %self.cfg.endpoint.host,
            interval_ms = self.cfg.poll_interval.as_millis() as u64,
            "poll loop started"
        );

        loop {
            if !connectivity.is_up() {
                tracing::info!("waiting for connectivity");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = connectivity.wait_up() => tracing::info!("connectivity established"),
                }
            }

            let outcome = tokio::select! {
                _ = shutdown.cancelled() => break,
                outcome = self.run_cycle() => outcome,
            };

            match outcome {
                Ok(report) if report.received > 0 || report.acknowledged > 0 => {
                    tracing::info!(
                        received = report.received,
                        dispatched = report.dispatched,
                        replies = report.replies_sent,
                        offset = self.offsets.next_request_offset(),
                        "poll cycle complete"
                    );
                }
                Ok(_) => tracing::debug!("poll cycle complete: no updates"),
                Err(e) => {
                    self.transition(PollState::Error);
                    tracing::warn!(error = %e, "poll cycle failed; retrying next tick");
                }
            }

            self.transition(PollState::Sleeping);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.cfg.poll_interval) => {}
            }
            self.transition(PollState::Idle);
        }

        tracing::info!(
            offset = self.offsets.next_request_offset(),
            "poll loop stopped"
        );
    }

    /// One request/response/dispatch round, bounded by `cycle_deadline`.
    ///
    /// On error the offset only reflects updates whose handler already
    /// returned; everything after them is redelivered next cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.transition(PollState::Requesting);
        let offset = self.offsets.next_request_offset();
        request::compose_get_updates_body(
            offset,
            self.cfg.poll_timeout_secs,
            self.cfg.poll_limit,
            &mut self.body,
        )?;
        let len = request::compose(
            Verb::Post,
            "getUpdates",
            &self.cfg.bot_token,
            &self.cfg.endpoint,
            Some(self.body.as_slice()),
            &mut self.request,
        )?;
        tracing::debug!(offset, bytes = len, "requesting updates");

        let deadline = Instant::now() + self.cfg.cycle_deadline;
        let framed = self.exchange(len, deadline).await?;
        if framed.truncated {
            if self.cfg.strict_payload {
                return Err(Error::PayloadTruncated {
                    capacity: self.payload.len(),
                });
            }
            tracing::debug!(
                capacity = self.payload.len(),
                "getUpdates payload truncated"
            );
        }

        let batch = updates::parse_batch(&self.payload[..framed.len])?;

        let mut report = CycleReport::default();
        for item in batch.items {
            let update_id = item.update_id();
            if update_id.0 < self.offsets.next_request_offset() {
                tracing::debug!(update_id = update_id.0, "update already acknowledged");
                continue;
            }

            let mut expired = None;
            if let BatchItem::Event(event) = item {
                report.received += 1;
                self.transition(PollState::Dispatching);
                expired = self.dispatch(&event, &mut report, deadline).await.err();
            }

            if expired != Some(Expired::InHandler) {
                self.transition(PollState::Acknowledging);
                if self.offsets.observe(update_id) {
                    report.acknowledged += 1;
                }
            }
            if let Some(at) = expired {
                tracing::warn!(
                    update_id = update_id.0,
                    stage = ?at,
                    "cycle deadline expired"
                );
                return Err(Error::CycleTimeout(self.cfg.cycle_deadline));
            }
        }

        Ok(report)
    }

    async fn dispatch(
        &mut self,
        event: &UpdateEvent,
        report: &mut CycleReport,
        deadline: Instant,
    ) -> std::result::Result<(), Expired> {
        tracing::debug!(
            update_id = event.update_id.0,
            chat_id = event.chat_id.0,
            text = %event.text,
            "message received"
        );

        if !self.policy.permits(event.chat_id) {
            tracing::info!(
                chat_id = event.chat_id.0,
                "message from unauthorized chat; not answering"
            );
            return Ok(());
        }

        report.dispatched += 1;
        let handled = timeout_at(deadline, self.handler.handle(event))
            .await
            .map_err(|_| Expired::InHandler)?;
        let reply = match handled {
            Ok(Some(reply)) => reply,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!(update_id = event.update_id.0, error = %e, "handler failed");
                return Ok(());
            }
        };

        match self.send_reply(event.chat_id, &reply, deadline).await {
            Ok(()) => report.replies_sent += 1,
            Err(Error::CycleTimeout(_)) => return Err(Expired::InReply),
            Err(e) => {
                tracing::warn!(chat_id = event.chat_id.0, error = %e, "reply not delivered")
            }
        }
        Ok(())
    }

    async fn send_reply(
        &mut self,
        chat_id: ChatId,
        reply: &Reply,
        deadline: Instant,
    ) -> Result<()> {
        compose_reply_into(chat_id, &reply.text, reply.markup.as_ref(), &mut self.body)?;
        let len = request::compose(
            Verb::Post,
            "sendMessage",
            &self.cfg.bot_token,
            &self.cfg.endpoint,
            Some(self.body.as_slice()),
            &mut self.request,
        )?;

        let framed = self.exchange(len, deadline).await?;
        updates::check_send_response(&self.payload[..framed.len])?;
        tracing::debug!(chat_id = chat_id.0, "reply sent");
        Ok(())
    }

    /// Open a fresh stream, send `request[..len]`, frame the response into
    /// the payload buffer, close the stream. Gives up at `deadline`.
    async fn exchange(&mut self, len: usize, deadline: Instant) -> Result<FramedPayload> {
        let run = open_and_exchange(
            self.connector.as_ref(),
            &self.cfg.endpoint,
            &self.request[..len],
            &mut self.reader,
            &mut self.payload,
            &mut self.state,
        );

        match timeout_at(deadline, run).await {
            Ok(res) => res,
            Err(_) => Err(Error::CycleTimeout(self.cfg.cycle_deadline)),
        }
    }

    fn transition(&mut self, next: PollState) {
        if self.state != next {
            tracing::trace!(from = ?self.state, to = ?next, "poll state");
            self.state = next;
        }
    }
}

async fn open_and_exchange(
    connector: &dyn Connector,
    endpoint: &Endpoint,
    request: &[u8],
    reader: &mut FramedTransportReader,
    payload: &mut [u8],
    state: &mut PollState,
) -> Result<FramedPayload> {
    let mut stream = connector.open(endpoint).await.map_err(|e| match e {
        Error::TransportOpenFailed(_) => e,
        other => Error::TransportOpenFailed(other.to_string()),
    })?;

    *state = PollState::Sending;
    let res = match write_request(stream.as_mut(), request).await {
        Ok(()) => {
            *state = PollState::Receiving;
            reader.read_payload(stream.as_mut(), payload).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = stream.close().await {
        tracing::debug!(error = %e, "closing transport failed");
    }
    res
}
