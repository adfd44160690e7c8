use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWrite;
use tokio::sync::oneshot;

/// Writable sink that buffers everything written to it. The paired
/// [`PassThroughCompletion`] resolves with the whole buffer once the sink is
/// shut down.
#[derive(Debug)]
pub struct PassThroughStream {
    buffer: BytesMut,
    completion: Option<oneshot::Sender<io::Result<Bytes>>>,
}

#[derive(Debug)]
pub struct PassThroughCompletion {
    receiver: oneshot::Receiver<io::Result<Bytes>>,
}

pub fn create_pass_through_stream() -> (PassThroughStream, PassThroughCompletion) {
    let (sender, receiver) = oneshot::channel();
    let sink = PassThroughStream { buffer: BytesMut::new(), completion: Some(sender) };
    (sink, PassThroughCompletion { receiver })
}

impl PassThroughStream {
    pub fn is_closed(&self) -> bool {
        self.completion.is_none()
    }

    /// Abort the sink; the completion resolves with `err`
    pub fn fail(&mut self, err: io::Error) {
        self.buffer.clear();
        if let Some(completion) = self.completion.take() {
            let _ = completion.send(Err(err));
        }
    }

    fn closed_error() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "pass-through stream is closed")
    }
}

impl AsyncWrite for PassThroughStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.is_closed() {
            return Poll::Ready(Err(Self::closed_error()));
        }
        this.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(completion) = this.completion.take() {
            let data = std::mem::take(&mut this.buffer).freeze();
            // Receiver gone means nobody is waiting for the data.
            let _ = completion.send(Ok(data));
        }
        Poll::Ready(Ok(()))
    }
}

impl Future for PassThroughCompletion {
    type Output = io::Result<Bytes>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "pass-through stream dropped before it was closed",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}
