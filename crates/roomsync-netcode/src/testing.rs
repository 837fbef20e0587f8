//! In-memory connector for tests
//!
//! URLs are scripted up front: accept, refuse, stay silent, or accept and
//! answer the first message sent. Tests inspect what was opened and sent.

use crate::error::{Error, Result};
use crate::transport::{Channel, ChannelEvent, Connector};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone)]
pub enum Behavior {
    Accept,
    /// Opening fails immediately
    Refuse,
    /// Never opens
    Silent,
    /// Opens, then answers the first sent message with this text
    Reply(String),
}

#[derive(Debug, Default)]
struct ChannelState {
    inbox: VecDeque<ChannelEvent>,
    sent: Vec<String>,
    open: bool,
    closed: bool,
    reply: Option<String>,
}

#[derive(Debug, Default)]
struct NetworkState {
    behaviors: HashMap<String, Behavior>,
    opened: Vec<String>,
    channels: HashMap<String, Arc<Mutex<ChannelState>>>,
}

/// Scripted network shared between the connector and the test
#[derive(Debug, Clone, Default)]
pub struct ScriptedNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, behavior: Behavior) -> &Self {
        self.state
            .lock()
            .behaviors
            .insert(url.to_string(), behavior);
        self
    }

    pub fn connector(&self) -> ScriptedConnector {
        ScriptedConnector {
            network: self.clone(),
        }
    }

    /// URLs passed to `open`, in order
    pub fn opened(&self) -> Vec<String> {
        self.state.lock().opened.clone()
    }

    /// Texts sent on the most recent channel to `url`
    pub fn sent(&self, url: &str) -> Vec<String> {
        self.channel(url)
            .map(|ch| ch.lock().sent.clone())
            .unwrap_or_default()
    }

    pub fn clear_sent(&self, url: &str) {
        if let Some(ch) = self.channel(url) {
            ch.lock().sent.clear();
        }
    }

    /// Deliver an event to the most recent channel to `url`
    pub fn push(&self, url: &str, event: ChannelEvent) {
        if let Some(ch) = self.channel(url) {
            ch.lock().inbox.push_back(event);
        }
    }

    /// Whether the client closed the most recent channel to `url`
    pub fn closed_by_client(&self, url: &str) -> bool {
        self.channel(url).map(|ch| ch.lock().closed).unwrap_or(false)
    }

    fn channel(&self, url: &str) -> Option<Arc<Mutex<ChannelState>>> {
        self.state.lock().channels.get(url).cloned()
    }
}

pub struct ScriptedConnector {
    network: ScriptedNetwork,
}

impl Connector for ScriptedConnector {
    fn open(&mut self, url: &Url) -> Result<Box<dyn Channel>> {
        let key = url.to_string();
        let mut net = self.network.state.lock();
        net.opened.push(key.clone());
        let behavior = net
            .behaviors
            .get(&key)
            .cloned()
            .unwrap_or(Behavior::Refuse);

        let mut state = ChannelState::default();
        match behavior {
            Behavior::Refuse => return Err(Error::Transport(format!("refused: {}", key))),
            Behavior::Silent => {}
            Behavior::Accept => state.inbox.push_back(ChannelEvent::Opened),
            Behavior::Reply(text) => {
                state.inbox.push_back(ChannelEvent::Opened);
                state.reply = Some(text);
            }
        }
        let state = Arc::new(Mutex::new(state));
        net.channels.insert(key, Arc::clone(&state));
        Ok(Box::new(ScriptedChannel { state }))
    }
}

struct ScriptedChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl Channel for ScriptedChannel {
    fn send_text(&mut self, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::NotConnected);
        }
        state.sent.push(text.to_string());
        if let Some(reply) = state.reply.take() {
            state.inbox.push_back(ChannelEvent::Text(reply));
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<ChannelEvent> {
        let mut state = self.state.lock();
        let event = state.inbox.pop_front()?;
        match event {
            ChannelEvent::Opened => state.open = !state.closed,
            ChannelEvent::Closed => state.open = false,
            _ => {}
        }
        Some(event)
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.open = false;
        state.closed = true;
    }
}
