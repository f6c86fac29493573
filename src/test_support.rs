//! In-memory connection halves for driving the pump and handler in tests

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::Sink;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Default)]
struct Captured {
    frames: Vec<Message>,
    closed: bool,
}

/// Sink recording every frame written to it; clones share the record
#[derive(Debug, Clone, Default)]
pub(crate) struct CaptureSink {
    state: Arc<Mutex<Captured>>,
}

impl CaptureSink {
    /// Text frames written so far, in order
    pub(crate) fn texts(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .frames
            .iter()
            .filter_map(|frame| match frame {
                Message::Text(text) => Some(text.to_string()),
                _ => None,
            })
            .collect()
    }

    /// Text frames parsed as JSON
    pub(crate) fn json(&self) -> Vec<serde_json::Value> {
        self.texts()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

impl Sink<Message> for CaptureSink {
    type Error = Infallible;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.state.lock().unwrap().frames.push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.state.lock().unwrap().closed = true;
        Poll::Ready(Ok(()))
    }
}

/// Inbound text frame
pub(crate) fn text(body: &str) -> Result<Message, String> {
    Ok(Message::Text(body.to_string().into()))
}
