//! Session layer: key bookkeeping, request/reply exchanges, retry policy
//!
//! A session owns the transport and the two pieces of rolling state the wire
//! format requires: the transaction counter and the session key. Every reply
//! carries the key for the next exchange, and the station may interject a
//! key-sync frame at any point to force a re-send under a fresh key.
//!
//! Exchanges are strictly serialized: the protocol has no multiplexing, so a
//! session hands out replies one request at a time (`&mut self`); callers that
//! need sharing wrap the session in a mutex (see [`crate::client`]).

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::frame::{self, MSG_TYPE_KEY_SYNC};
use crate::protocol::{decode_frame, encode_frame, parse_reply, Reply, VarType};
use crate::transport::Transport;
use std::time::Duration;

/// WID probed during the opening handshake; controllers answer reads of
/// unassigned registers with an error status, which still proves the link.
pub const PROBE_WID: u16 = 4000;

/// Key-sync re-sends tolerated within a single exchange
const MAX_KEY_SYNCS: u32 = 2;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No link; only `open` leaves this state
    Disconnected,
    /// Probing the controller or re-deriving the session key
    Handshaking,
    /// Exchanges flowing normally
    Ready,
    /// Too many consecutive failures; next request re-synchronizes first
    Degraded,
}

/// A connection to one controller
pub struct Session {
    transport: Box<dyn Transport>,
    station_addr: u8,
    client_addr: u8,
    password: u32,
    reply_timeout: Duration,
    request_retries: u32,
    failure_threshold: u32,
    transaction_id: u32,
    key: u32,
    state: SessionState,
    failure_streak: u32,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("station_addr", &self.station_addr)
            .field("client_addr", &self.client_addr)
            .field("reply_timeout", &self.reply_timeout)
            .field("request_retries", &self.request_retries)
            .field("failure_threshold", &self.failure_threshold)
            .field("transaction_id", &self.transaction_id)
            .field("state", &self.state)
            .field("failure_streak", &self.failure_streak)
            .finish()
    }
}

impl Session {
    /// Open a session over `transport` and handshake with the controller
    ///
    /// The initial key is 0; the station pushes the real key in its first
    /// reply (or via an explicit key-sync frame). Fails with
    /// `HandshakeTimeout` when the controller stays silent and
    /// `HandshakeRejected` when replies arrive but never survive telegram
    /// validation.
    pub fn open(transport: Box<dyn Transport>, config: &Config) -> Result<Session> {
        let mut session = Session {
            transport,
            station_addr: config.connection.station_addr,
            client_addr: config.connection.client_addr,
            password: config.connection.password,
            reply_timeout: config.timing.reply_timeout(),
            request_retries: config.timing.request_retries,
            failure_threshold: config.timing.failure_threshold,
            transaction_id: 1,
            key: 0,
            state: SessionState::Handshaking,
            failure_streak: 0,
        };
        session.probe()?;
        Ok(session)
    }

    /// Station address exchanges are directed to
    pub fn station_addr(&self) -> u8 {
        self.station_addr
    }

    /// Address this client identifies as
    pub fn client_addr(&self) -> u8 {
        self.client_addr
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Issue one request telegram and return the validated reply
    ///
    /// Retries timeouts and corrupted replies up to the configured budget,
    /// then escalates as `Comm`. Past the consecutive-failure threshold the
    /// session degrades and the next call re-synchronizes the key before
    /// sending.
    pub fn request(&mut self, telegram: &[u8]) -> Result<Reply> {
        match self.state {
            SessionState::Disconnected => return Err(Error::NotConnected),
            SessionState::Degraded => {
                log::info!("session degraded, re-synchronizing key");
                self.key = 0;
                self.state = SessionState::Handshaking;
            }
            _ => {}
        }

        let mut last_error = None;
        for attempt in 0..=self.request_retries {
            match self.exchange(telegram) {
                Ok(reply) => {
                    self.failure_streak = 0;
                    self.state = SessionState::Ready;
                    return Ok(reply);
                }
                Err(
                    e @ (Error::Timeout
                    | Error::ChecksumMismatch { .. }
                    | Error::MalformedFrame(_)
                    | Error::UnknownFrameType(_)),
                ) => {
                    log::warn!(
                        "exchange attempt {}/{} failed: {}",
                        attempt + 1,
                        self.request_retries + 1,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    self.register_failure();
                    return Err(e);
                }
            }
        }

        self.register_failure();
        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no reply".to_string());
        Err(Error::Comm(format!(
            "no valid reply after {} attempts: {}",
            self.request_retries + 1,
            detail
        )))
    }

    /// One send/receive round, following key-sync redirections
    fn exchange(&mut self, telegram: &[u8]) -> Result<Reply> {
        let mut syncs = 0;
        loop {
            let datagram = encode_frame(telegram, self.transaction_id, self.key, self.password);
            self.transport.send(&datagram)?;
            let sent_tid = self.transaction_id;
            self.transaction_id = self.transaction_id.wrapping_add(1);

            let raw = self.transport.recv(self.reply_timeout)?;
            let decoded = decode_frame(&raw)?;
            // Every reply hands us the key for the next exchange
            self.key = decoded.key;

            if decoded.msg_type == MSG_TYPE_KEY_SYNC {
                syncs += 1;
                if syncs > MAX_KEY_SYNCS {
                    return Err(Error::Comm("key sync did not converge".into()));
                }
                log::debug!("key sync received, re-sending under new key");
                continue;
            }

            if decoded.transaction_id != sent_tid {
                // Stations are not known to renumber; note it and carry on
                log::debug!(
                    "reply transaction id {} differs from sent {}",
                    decoded.transaction_id,
                    sent_tid
                );
            }

            return parse_reply(&decoded.telegram);
        }
    }

    /// Opening handshake: probe with a register read until something answers
    fn probe(&mut self) -> Result<()> {
        let telegram = frame::build_read_reg(
            self.station_addr,
            self.client_addr,
            VarType::Int16,
            PROBE_WID,
        );

        let mut saw_garbage = false;
        for attempt in 0..=self.request_retries {
            match self.exchange(&telegram) {
                Ok(_) => {
                    log::info!("handshake complete, station {} answering", self.station_addr);
                    self.failure_streak = 0;
                    self.state = SessionState::Ready;
                    return Ok(());
                }
                Err(Error::Timeout) => {
                    log::debug!("handshake probe {} timed out", attempt + 1);
                }
                Err(
                    Error::ChecksumMismatch { .. }
                    | Error::MalformedFrame(_)
                    | Error::UnknownFrameType(_)
                    | Error::Comm(_),
                ) => {
                    saw_garbage = true;
                    log::debug!("handshake probe {} drew an invalid reply", attempt + 1);
                }
                Err(e) => {
                    self.state = SessionState::Disconnected;
                    return Err(e);
                }
            }
        }

        self.state = SessionState::Disconnected;
        if saw_garbage {
            Err(Error::HandshakeRejected)
        } else {
            Err(Error::HandshakeTimeout)
        }
    }

    /// Tear the session down; subsequent requests fail with `NotConnected`
    pub fn close(&mut self) {
        log::info!("session closed");
        self.state = SessionState::Disconnected;
        self.key = 0;
    }

    /// Count a failed request; degrade past the threshold
    fn register_failure(&mut self) {
        self.failure_streak += 1;
        if self.failure_streak >= self.failure_threshold
            && self.state == SessionState::Ready
        {
            log::warn!(
                "{} consecutive exchange failures, session degraded",
                self.failure_streak
            );
            self.state = SessionState::Degraded;
        }
    }
}
