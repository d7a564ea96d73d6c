//! A stream of lines for consumers that would rather poll than implement
//! [`Observer`].

use std::io;
use std::pin::Pin;
use std::task::{self, Poll};

use futures_util::future::poll_fn;
use futures_util::ready;
use futures_util::stream::Stream as FuturesStream;
use tokio::sync::mpsc;

use crate::observer::{Handle, Observer};
use crate::Error;

#[derive(Debug)]
pub(crate) enum Notification {
    Line(String),
    Closed,
    Failed(io::Error),
}

/// Forwards callbacks into an unbounded channel. Sends only fail once the
/// `Subscription` has been dropped, in which case there is nobody to tell.
pub(crate) struct ChannelObserver {
    tx: mpsc::UnboundedSender<Notification>,
}

pub(crate) fn channel() -> (ChannelObserver, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelObserver { tx }, rx)
}

impl Observer for ChannelObserver {
    fn on_next(&self, _handle: Handle, line: &str) {
        let _ = self.tx.send(Notification::Line(line.to_owned()));
    }

    fn on_close(&self, _handle: Handle) {
        let _ = self.tx.send(Notification::Closed);
    }

    fn on_error(&self, _handle: Handle, error: &Error) {
        let _ = self.tx.send(Notification::Failed(error.into()));
    }
}

/// One circular read of a file, as a [`futures::Stream`] of lines.
///
/// The stream ends once every line has been received. Under
/// [`FailurePolicy::Notify`](crate::FailurePolicy::Notify) a failed read yields
/// a single `Err` and then ends; under the default policy a failed read leaves
/// the stream pending forever, as does shutting the service down mid-read.
///
/// [`futures::Stream`]: https://docs.rs/futures/0.3/futures/stream/trait.Stream.html
#[derive(Debug)]
pub struct Subscription {
    handle: Handle,
    rx: mpsc::UnboundedReceiver<Notification>,
    done: bool,
}

impl Subscription {
    pub(crate) fn new(handle: Handle, rx: mpsc::UnboundedReceiver<Notification>) -> Self {
        Subscription {
            handle,
            rx,
            done: false,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns the next line, or `None` once the read is complete.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        poll_fn(|cx| self.poll_line(cx)).await
    }

    fn poll_line(&mut self, cx: &mut task::Context<'_>) -> Poll<io::Result<Option<String>>> {
        if self.done {
            return Poll::Ready(Ok(None));
        }

        match ready!(self.rx.poll_recv(cx)) {
            Some(Notification::Line(line)) => Poll::Ready(Ok(Some(line))),
            Some(Notification::Failed(err)) => {
                self.done = true;
                Poll::Ready(Err(err))
            }
            Some(Notification::Closed) | None => {
                self.done = true;
                Poll::Ready(Ok(None))
            }
        }
    }
}

impl FuturesStream for Subscription {
    type Item = io::Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_line(cx).map(Result::transpose)
    }
}
