#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use driveway::events::{Notifier, ProgressEvent, SubscriberId};
use driveway::sink::Destination;
use tokio::io::AsyncWrite;

// notifier that remembers everything it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(SubscriberId, &'static str, ProgressEvent)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(SubscriberId, &'static str, ProgressEvent)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.sent().into_iter().map(|(_, _, event)| event).collect()
    }

    pub fn events_for(&self, filename: &str) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter(|e| e.filename == filename)
            .map(|e| e.processed_already)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send_to(&self, subscriber: &SubscriberId, event: &'static str, payload: &ProgressEvent) {
        self.sent
            .lock()
            .unwrap()
            .push((subscriber.clone(), event, payload.clone()));
    }
}

// in-memory destination
#[derive(Default)]
pub struct MemorySink {
    pub data: Vec<u8>,
    pub finished: bool,
}

impl AsyncWrite for MemorySink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.data).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.data).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.data).poll_shutdown(cx)
    }
}

impl Destination for MemorySink {
    async fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }
}

// accepts `capacity` bytes, then fails every write like a full disk
pub struct FullDiskSink {
    pub data: Vec<u8>,
    pub capacity: usize,
}

impl FullDiskSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
        }
    }
}

impl AsyncWrite for FullDiskSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.data.len() + buf.len() > self.capacity {
            return Poll::Ready(Err(io::Error::other("no space left on device")));
        }
        self.data.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl Destination for FullDiskSink {
    async fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// destination backed by an in-memory pipe, so writes stall until the
// other end reads
pub struct PipeSink(pub tokio::io::DuplexStream);

impl AsyncWrite for PipeSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

impl Destination for PipeSink {
    async fn finish(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.0.shutdown().await
    }
}
