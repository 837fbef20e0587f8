//! Transport traits for the text channel
//!
//! A [`Connector`] opens a [`Channel`] to a URL without blocking; the channel
//! reports `Opened`, inbound text, errors and closure as [`ChannelEvent`]s
//! that the session drains once per tick. Network callbacks therefore never
//! touch sync state directly.

use crate::error::Result;
use url::Url;

/// Notification from an open or opening channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The connection is established
    Opened,
    /// A text message arrived
    Text(String),
    /// Connect, send or receive failure
    Error(String),
    /// The channel closed (either side)
    Closed,
}

/// Full-duplex text channel
///
/// Dropping a channel must release the underlying connection.
pub trait Channel: Send {
    /// Queue a text message for sending
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Next pending event, if any (non-blocking)
    fn try_recv(&mut self) -> Option<ChannelEvent>;

    /// Whether `Opened` has been seen and the channel has not closed
    fn is_open(&self) -> bool;

    /// Close the channel
    fn close(&mut self);
}

/// Opens channels
pub trait Connector {
    /// Start connecting to `url`
    ///
    /// Returns as soon as the attempt is started; success is reported by a
    /// later [`ChannelEvent::Opened`].
    fn open(&mut self, url: &Url) -> Result<Box<dyn Channel>>;
}
