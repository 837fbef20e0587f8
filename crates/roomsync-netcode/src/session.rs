//! Connection session: resume, handshake and the main channel
//!
//! ```text
//!                 ┌── stored identity ──▶ ResumeAttempt ──opened──────────────┐
//! Disconnected ──┤                             │ error / timeout             ▼
//!                 └── none ─────────────▶ HandshakePhase1 ──reply──▶ MainConnecting ──opened──▶ Main
//! ```
//!
//! All transport notifications are drained in [`ConnectionSession::poll`],
//! which the tick loop calls once per frame. Losing the main channel returns
//! to `Disconnected` but keeps the identity, so the next `connect` resumes.

use crate::error::{Error, Result};
use crate::protocol::{encode, HandshakeReply, Hello};
use crate::store::{clear_identity, load_identity, persist_identity, KeyValueStore};
use crate::transport::{Channel, ChannelEvent, Connector};
use roomsync_core::{PlayerId, SessionConfig, SessionIdentity};
use tracing::{debug, info, warn};
use url::Url;

/// Connection phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    /// Opening the main channel with a stored identity
    ResumeAttempt,
    /// Waiting for the server to assign an identity
    HandshakePhase1,
    /// Identity assigned, main channel opening
    MainConnecting,
    /// Main channel open; sync may run
    Main,
}

/// What a poll produced for the sync layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The main channel just opened
    MainOpened(SessionIdentity),
    /// Text received on the main channel
    Message(String),
    /// The main channel closed
    Closed,
}

/// Handshake and main-channel URLs derived from the configured server URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
    handshake: Url,
}

impl Endpoints {
    /// Derive endpoints; a trailing `/ws` on `server_url` is optional
    ///
    /// `ws://host:8080/ws` and `ws://host:8080` both give the handshake
    /// endpoint `ws://host:8080/ws` and main endpoints `ws://host:8080/ws/<slot>`.
    pub fn from_server_url(server_url: &str) -> Result<Self> {
        let trimmed = server_url.trim().trim_end_matches('/');
        let base = trimmed.strip_suffix("/ws").unwrap_or(trimmed).to_string();
        let handshake = Url::parse(&format!("{}/ws", base))?;
        match handshake.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, server_url
                )))
            }
        }
        Ok(Self { base, handshake })
    }

    pub fn handshake(&self) -> &Url {
        &self.handshake
    }

    /// Main channel URL for a slot
    pub fn main(&self, slot: &PlayerId) -> Result<Url> {
        Ok(Url::parse(&format!("{}/ws/{}", self.base, slot))?)
    }
}

pub struct ConnectionSession {
    endpoints: Endpoints,
    display_name: String,
    resume_timeout: f32,
    handshake_timeout: f32,
    connector: Box<dyn Connector>,
    store: Box<dyn KeyValueStore>,
    phase: SessionPhase,
    channel: Option<Box<dyn Channel>>,
    identity: Option<SessionIdentity>,
    phase_elapsed: f32,
}

impl ConnectionSession {
    pub fn new(
        config: &SessionConfig,
        connector: Box<dyn Connector>,
        store: Box<dyn KeyValueStore>,
    ) -> Result<Self> {
        let endpoints = Endpoints::from_server_url(&config.server_url)?;
        let identity = load_identity(store.as_ref());
        Ok(Self {
            endpoints,
            display_name: config.display_name.clone(),
            resume_timeout: config.resume_timeout_secs.max(0.0),
            handshake_timeout: config.handshake_timeout_secs.max(0.0),
            connector,
            store,
            phase: SessionPhase::Disconnected,
            channel: None,
            identity,
            phase_elapsed: 0.0,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether the main channel is open
    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Main
    }

    /// The assigned or stored identity
    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Start connecting
    ///
    /// Safe to call in any phase: only `Disconnected` starts an attempt.
    pub fn connect(&mut self) {
        if self.phase != SessionPhase::Disconnected {
            debug!(phase = ?self.phase, "connect ignored: attempt already in progress");
            return;
        }
        match self.identity.clone() {
            Some(identity) => self.start_resume(identity),
            None => self.start_handshake(),
        }
    }

    /// Close the channel; the identity is kept for the next resume
    pub fn disconnect(&mut self) {
        self.release_channel();
        if self.phase != SessionPhase::Disconnected {
            info!(phase = ?self.phase, "session disconnected");
        }
        self.set_phase(SessionPhase::Disconnected);
    }

    /// Forget the stored identity so the next connect handshakes
    pub fn reset_identity(&mut self) -> Result<()> {
        self.disconnect();
        self.identity = None;
        clear_identity(self.store.as_mut())?;
        info!("session identity reset");
        Ok(())
    }

    /// Send text on the main channel
    pub fn send(&mut self, text: &str) -> Result<()> {
        if self.phase != SessionPhase::Main {
            return Err(Error::NotConnected);
        }
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        channel.send_text(text)
    }

    /// Drain transport events and advance the phase machine
    pub fn poll(&mut self, dt: f32) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        if self.phase == SessionPhase::Disconnected {
            return out;
        }
        self.phase_elapsed += dt.max(0.0);

        while let Some(event) = self.channel.as_mut().and_then(|ch| ch.try_recv()) {
            self.handle_event(event, &mut out);
            if self.phase == SessionPhase::Disconnected {
                break;
            }
        }

        self.check_timeouts();
        out
    }

    fn handle_event(&mut self, event: ChannelEvent, out: &mut Vec<SessionEvent>) {
        match (self.phase, event) {
            (SessionPhase::ResumeAttempt, ChannelEvent::Opened) => {
                self.set_phase(SessionPhase::Main);
                if let Some(identity) = self.identity.clone() {
                    info!(%identity, "session resumed");
                    out.push(SessionEvent::MainOpened(identity));
                }
            }
            (SessionPhase::ResumeAttempt, ChannelEvent::Error(e)) => {
                warn!(error = %e, "resume failed, falling back to handshake");
                self.start_handshake();
            }
            (SessionPhase::ResumeAttempt, ChannelEvent::Closed) => {
                warn!("resume channel closed, falling back to handshake");
                self.start_handshake();
            }

            (SessionPhase::HandshakePhase1, ChannelEvent::Opened) => self.send_hello(),
            (SessionPhase::HandshakePhase1, ChannelEvent::Text(text)) => {
                match HandshakeReply::parse(&text) {
                    Ok(identity) => {
                        info!(%identity, "identity assigned");
                        if let Err(e) = persist_identity(self.store.as_mut(), &identity) {
                            warn!(error = %e, "failed to persist identity");
                        }
                        self.identity = Some(identity.clone());
                        self.start_main(identity);
                    }
                    Err(e) => debug!(error = %e, raw = %text, "ignoring non-reply during handshake"),
                }
            }
            (SessionPhase::HandshakePhase1, ChannelEvent::Error(e)) => {
                warn!(error = %e, "handshake failed");
                self.disconnect();
            }
            (SessionPhase::HandshakePhase1, ChannelEvent::Closed) => {
                warn!("handshake channel closed before reply");
                self.disconnect();
            }

            (SessionPhase::MainConnecting, ChannelEvent::Opened) => {
                self.set_phase(SessionPhase::Main);
                if let Some(identity) = self.identity.clone() {
                    info!(%identity, "main channel open");
                    out.push(SessionEvent::MainOpened(identity));
                }
            }
            (SessionPhase::MainConnecting, ChannelEvent::Error(e)) => {
                warn!(error = %e, "main channel failed to open");
                self.disconnect();
            }
            (SessionPhase::MainConnecting, ChannelEvent::Closed) => {
                warn!("main channel closed while opening");
                self.disconnect();
            }

            (SessionPhase::Main, ChannelEvent::Text(text)) => out.push(SessionEvent::Message(text)),
            (SessionPhase::Main, ChannelEvent::Error(e)) => {
                warn!(error = %e, "main channel error");
            }
            (SessionPhase::Main, ChannelEvent::Closed) => {
                info!("main channel closed");
                self.disconnect();
                out.push(SessionEvent::Closed);
            }

            (phase, event) => debug!(?phase, ?event, "event ignored"),
        }
    }

    fn check_timeouts(&mut self) {
        match self.phase {
            SessionPhase::ResumeAttempt if self.phase_elapsed > self.resume_timeout => {
                warn!(
                    timeout_secs = self.resume_timeout,
                    "resume timed out, falling back to handshake"
                );
                self.start_handshake();
            }
            SessionPhase::HandshakePhase1 | SessionPhase::MainConnecting
                if self.phase_elapsed > self.handshake_timeout =>
            {
                warn!(phase = ?self.phase, timeout_secs = self.handshake_timeout, "connect timed out");
                self.disconnect();
            }
            _ => {}
        }
    }

    fn start_resume(&mut self, identity: SessionIdentity) {
        let url = match self.endpoints.main(&identity.slot) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "stored slot unusable, handshaking");
                self.start_handshake();
                return;
            }
        };
        debug!(%url, %identity, "trying resume");
        match self.open(&url) {
            Ok(()) => self.set_phase(SessionPhase::ResumeAttempt),
            Err(e) => {
                warn!(error = %e, "resume connect failed, falling back to handshake");
                self.start_handshake();
            }
        }
    }

    fn start_handshake(&mut self) {
        let url = self.endpoints.handshake.clone();
        debug!(%url, "starting handshake");
        match self.open(&url) {
            Ok(()) => self.set_phase(SessionPhase::HandshakePhase1),
            Err(e) => {
                warn!(error = %e, "handshake connect failed");
                self.disconnect();
            }
        }
    }

    fn start_main(&mut self, identity: SessionIdentity) {
        let opened = self
            .endpoints
            .main(&identity.slot)
            .and_then(|url| self.open(&url));
        match opened {
            Ok(()) => self.set_phase(SessionPhase::MainConnecting),
            Err(e) => {
                warn!(error = %e, "main connect failed");
                self.disconnect();
            }
        }
    }

    fn send_hello(&mut self) {
        let hello = Hello {
            name: self.display_name.clone(),
        };
        let sent = encode(&hello).and_then(|text| match self.channel.as_mut() {
            Some(channel) => channel.send_text(&text),
            None => Err(Error::NotConnected),
        });
        match sent {
            Ok(()) => debug!(name = %self.display_name, "hello sent"),
            Err(e) => warn!(error = %e, "failed to send hello"),
        }
    }

    fn open(&mut self, url: &Url) -> Result<()> {
        self.release_channel();
        let channel = self.connector.open(url)?;
        self.channel = Some(channel);
        Ok(())
    }

    fn release_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "session phase");
        }
        self.phase = phase;
        self.phase_elapsed = 0.0;
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        self.release_channel();
    }
}
