use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::AsyncWrite;
use tokio::sync::oneshot;

use crate::fs::error::FsResult;
use crate::stream::PassThroughStream;

/// Writable handle returned by `FileSystem::create_write_stream`
///
/// Bytes are buffered until shutdown. Shutdown completes once the upload has
/// finished, and fails with the upload's error.
#[derive(Debug)]
pub struct WriteStream {
    sink: PassThroughStream,
    upload: Option<oneshot::Receiver<FsResult<()>>>,
    path: String,
}

impl WriteStream {
    pub(crate) fn new(
        sink: PassThroughStream,
        upload: oneshot::Receiver<FsResult<()>>,
        path: impl Into<String>,
    ) -> Self {
        Self { sink, upload: Some(upload), path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl AsyncWrite for WriteStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().sink).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().sink).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(Pin::new(&mut this.sink).poll_shutdown(cx))?;

        let Some(upload) = this.upload.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        let result = ready!(Pin::new(upload).poll(cx));
        this.upload = None;
        match result {
            Ok(Ok(())) => Poll::Ready(Ok(())),
            Ok(Err(err)) => Poll::Ready(Err(err.into())),
            Err(_) => Poll::Ready(Err(io::Error::other(format!(
                "upload of '{}' was abandoned",
                this.path
            )))),
        }
    }
}
