//! WebSocket transport on tokio-tungstenite
//!
//! Each channel is one spawned task owning the socket. The tick loop talks
//! to it through two unbounded queues, so sends never block a frame and
//! inbound messages wait until the next poll.

use crate::error::{Error, Result};
use crate::transport::{Channel, ChannelEvent, Connector};
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};
use url::Url;

/// Opens WebSocket channels on a tokio runtime
#[derive(Debug, Clone)]
pub struct WsConnector {
    runtime: Handle,
}

impl WsConnector {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime the caller is running inside
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

impl Connector for WsConnector {
    fn open(&mut self, url: &Url) -> Result<Box<dyn Channel>> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let task = self
            .runtime
            .spawn(run_socket(url.to_string(), event_tx, out_rx));
        debug!(%url, "websocket connect started");
        Ok(Box::new(WsChannel {
            outbound: Some(out_tx),
            events: event_rx,
            open: false,
            opened: false,
            task,
        }))
    }
}

/// Handle to one socket task
pub struct WsChannel {
    outbound: Option<UnboundedSender<Message>>,
    events: UnboundedReceiver<ChannelEvent>,
    open: bool,
    /// `Opened` was seen; the socket finished its upgrade
    opened: bool,
    task: JoinHandle<()>,
}

impl Channel for WsChannel {
    fn send_text(&mut self, text: &str) -> Result<()> {
        if !self.open {
            return Err(Error::NotConnected);
        }
        let outbound = self.outbound.as_ref().ok_or(Error::NotConnected)?;
        outbound
            .send(Message::Text(text.to_string()))
            .map_err(|_| Error::Transport("socket task stopped".to_string()))
    }

    fn try_recv(&mut self) -> Option<ChannelEvent> {
        let event = self.events.try_recv().ok()?;
        match event {
            ChannelEvent::Opened => {
                self.open = true;
                self.opened = true;
            }
            ChannelEvent::Closed => self.open = false,
            _ => {}
        }
        Some(event)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if let Some(outbound) = self.outbound.take() {
            if self.opened {
                let _ = outbound.send(Message::Close(None));
            }
        }
        if !self.opened {
            // Still connecting: drop the pending socket now
            self.task.abort();
        }
        self.open = false;
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        if self.outbound.is_some() || !self.opened {
            self.task.abort();
        }
    }
}

async fn run_socket(
    url: String,
    events: UnboundedSender<ChannelEvent>,
    mut outbound: UnboundedReceiver<Message>,
) {
    let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            let _ = events.send(ChannelEvent::Error(e.to_string()));
            let _ = events.send(ChannelEvent::Closed);
            return;
        }
    };
    let _ = events.send(ChannelEvent::Opened);

    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    let closing = matches!(msg, Message::Close(_));
                    if let Err(e) = write.send(msg).await {
                        let _ = events.send(ChannelEvent::Error(e.to_string()));
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                None => break,
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(ChannelEvent::Text(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    trace!(?frame, "server closed socket");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                    break;
                }
                None => break,
            },
        }
    }
    let _ = events.send(ChannelEvent::Closed);
}
