//! Sends one request to the orchestrator and classifies what came back.
//!
//! A [`Dispatcher`] is single-use: it walks `Idle → Connecting →
//! AwaitingResponse` and ends in `Completed` or `Failed`. The transport handle
//! lives only inside [`Dispatcher::send`] / [`Dispatcher::health`] and is
//! dropped before either returns, on every path.

use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use denden_core::outcome::{Outcome, TransportFailure};
use denden_protocol::{
    HealthSnapshot, RequestEnvelope, RequestFrame, ResponseEnvelope, ResponseFrame,
};
use serde::de::DeserializeOwned;
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};

use crate::ipc::jsonl::{read_jsonl, write_jsonl};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Connecting,
    AwaitingResponse,
    Completed,
    Failed,
}

/// An established connection able to perform one frame exchange.
#[async_trait]
pub trait Transport: Send {
    async fn call(&mut self, request: &RequestFrame) -> Result<ResponseFrame, TransportFailure>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    async fn connect(&self) -> Result<Self::Transport, TransportFailure>;
}

pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Transport = TcpTransport;

    async fn connect(&self) -> Result<TcpTransport, TransportFailure> {
        let stream = TcpStream::connect(self.addr.as_str())
            .await
            .map_err(|err| {
                TransportFailure::unavailable(format!("connect {}: {err}", self.addr))
            })?;
        let (read_half, write_half) = stream.into_split();
        Ok(TcpTransport {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }
}

pub struct TcpTransport {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn call(&mut self, request: &RequestFrame) -> Result<ResponseFrame, TransportFailure> {
        write_jsonl(&mut self.writer, request)
            .await
            .map_err(|err| io_failure("write request", err))?;

        read_jsonl(&mut self.reader)
            .await
            .map_err(|err| io_failure("read response", err))?
            .ok_or_else(|| {
                TransportFailure::unavailable("connection closed before a response arrived")
            })
    }
}

fn io_failure(what: &str, err: io::Error) -> TransportFailure {
    if err.kind() == io::ErrorKind::InvalidData {
        TransportFailure::internal(format!("{what}: malformed frame: {err}"))
    } else {
        TransportFailure::unavailable(format!("{what}: {err}"))
    }
}

pub struct Dispatcher<C> {
    connector: C,
    deadline: Duration,
    state: DispatchState,
}

impl Dispatcher<TcpConnector> {
    pub fn tcp(addr: impl Into<String>, deadline: Duration) -> Self {
        Self::new(TcpConnector::new(addr), deadline)
    }
}

impl<C: Connector> Dispatcher<C> {
    pub fn new(connector: C, deadline: Duration) -> Self {
        Self {
            connector,
            deadline,
            state: DispatchState::Idle,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub async fn send(&mut self, envelope: &RequestEnvelope) -> Outcome<ResponseEnvelope> {
        let frame = match RequestFrame::send(envelope) {
            Ok(frame) => frame,
            Err(err) => {
                self.transition(DispatchState::Failed);
                return Outcome::TransportFailure(TransportFailure::internal(format!(
                    "encode request: {err}"
                )));
            }
        };
        self.exchange(frame).await.into()
    }

    pub async fn health(&mut self) -> Outcome<HealthSnapshot> {
        let frame = RequestFrame::status(new_frame_id("status"));
        self.exchange(frame).await.into()
    }

    async fn exchange<T>(&mut self, request: RequestFrame) -> Result<T, TransportFailure>
    where
        T: DeserializeOwned,
    {
        let result = self.round_trip(&request).await;
        match &result {
            Ok(_) => self.transition(DispatchState::Completed),
            Err(err) => {
                tracing::debug!(code = %err.code, message = %err.message, "dispatch failed");
                self.transition(DispatchState::Failed);
            }
        }
        result
    }

    async fn round_trip<T>(&mut self, request: &RequestFrame) -> Result<T, TransportFailure>
    where
        T: DeserializeOwned,
    {
        if self.state != DispatchState::Idle {
            return Err(TransportFailure::internal("dispatcher already used"));
        }
        let deadline = Instant::now() + self.deadline;

        self.transition(DispatchState::Connecting);
        let mut transport = timeout_at(deadline, self.connector.connect())
            .await
            .map_err(|_| deadline_exceeded(self.deadline, "connecting"))??;

        self.transition(DispatchState::AwaitingResponse);
        let reply = timeout_at(deadline, transport.call(request))
            .await
            .map_err(|_| deadline_exceeded(self.deadline, "awaiting response"))?;
        drop(transport);
        let reply = reply?;

        decode_reply(request, reply)
    }

    fn transition(&mut self, next: DispatchState) {
        tracing::debug!(from = ?self.state, to = ?next, "dispatch state");
        self.state = next;
    }
}

fn decode_reply<T>(request: &RequestFrame, reply: ResponseFrame) -> Result<T, TransportFailure>
where
    T: DeserializeOwned,
{
    if reply.r#type != request.r#type || reply.id != request.id {
        return Err(TransportFailure::internal(format!(
            "mismatched response frame: expected {}/{}, got {}/{}",
            request.r#type, request.id, reply.r#type, reply.id
        )));
    }
    if !reply.success {
        return Err(reply.error.map(TransportFailure::from).unwrap_or_else(|| {
            TransportFailure::internal(format!("{} failed without detail", request.r#type))
        }));
    }
    serde_json::from_value(reply.payload).map_err(|err| {
        TransportFailure::internal(format!("decode {} payload: {err}", request.r#type))
    })
}

fn deadline_exceeded(deadline: Duration, phase: &str) -> TransportFailure {
    TransportFailure::deadline_exceeded(format!("deadline of {deadline:?} exceeded while {phase}"))
}

fn new_frame_id(prefix: &str) -> String {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{prefix}-{now_ns}")
}
