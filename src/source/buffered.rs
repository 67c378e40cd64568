//! Bounded-queue ingestion decoupling.
//!
//! Wraps any `FrameSource` with a producer thread and a bounded channel so a
//! slow classifier does not stall frame decoding. A full queue blocks the
//! producer (backpressure); frames are never dropped, because a dropped
//! frame would corrupt the previous/current pair the change scheduler
//! differences against. The pipeline behaves identically whether frames
//! arrive inline or through this wrapper.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Result};

use super::{FrameSource, SourceStats};
use crate::frame::FrameBuffer;

pub struct BufferedSource {
    rx: Receiver<Result<Option<FrameBuffer>>>,
    producer: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    locator: String,
    delivered: u64,
    exhausted: bool,
}

impl BufferedSource {
    /// Connect `inner` and start the producer thread with a queue of
    /// `depth` frames.
    pub fn spawn(mut inner: Box<dyn FrameSource>, depth: usize) -> Result<Self> {
        if depth == 0 {
            return Err(anyhow!("ingest queue depth must be at least 1"));
        }
        inner.connect()?;
        let locator = inner.stats().locator;

        let (tx, rx) = sync_channel(depth);
        let stop = Arc::new(AtomicBool::new(false));
        let producer_stop = stop.clone();
        let producer = std::thread::Builder::new()
            .name("lotwatch-ingest".to_string())
            .spawn(move || {
                loop {
                    if producer_stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let item = inner.next_frame();
                    let end = matches!(item, Ok(None));
                    // Blocks when the queue is full: backpressure, not drop.
                    if tx.send(item).is_err() || end {
                        break;
                    }
                }
                inner.close();
            })?;

        Ok(Self {
            rx,
            producer: Some(producer),
            stop,
            locator,
            delivered: 0,
            exhausted: false,
        })
    }
}

impl FrameSource for BufferedSource {
    fn connect(&mut self) -> Result<()> {
        // The inner source was connected before the producer started.
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>> {
        if self.exhausted {
            return Ok(None);
        }
        match self.rx.recv() {
            Ok(Ok(Some(frame))) => {
                self.delivered += 1;
                Ok(Some(frame))
            }
            Ok(Ok(None)) | Err(_) => {
                self.exhausted = true;
                Ok(None)
            }
            Ok(Err(e)) => Err(e),
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_delivered: self.delivered,
            locator: self.locator.clone(),
        }
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Free a queue slot in case the producer is blocked mid-send.
        while self.rx.try_recv().is_ok() {}
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BufferedSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SyntheticSource;

    #[test]
    fn delivers_frames_in_order_and_terminates() {
        let inner = SyntheticSource::new("stub://t", 48, 32).with_limit(5);
        let mut source = BufferedSource::spawn(Box::new(inner), 2).unwrap();

        let mut count = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.dimensions(), (48, 32));
            count += 1;
        }
        assert_eq!(count, 5);
        assert_eq!(source.stats().frames_delivered, 5);
        // Exhaustion is sticky.
        assert!(source.next_frame().unwrap().is_none());
        source.close();
    }

    #[test]
    fn close_unblocks_a_producer_waiting_on_a_full_queue() {
        // Unlimited inner source and a depth-1 queue: the producer is
        // guaranteed to be parked in `send` shortly after spawn.
        let inner = SyntheticSource::new("stub://t", 32, 32);
        let mut source = BufferedSource::spawn(Box::new(inner), 1).unwrap();
        let _ = source.next_frame().unwrap();
        source.close();
    }

    #[test]
    fn zero_depth_is_rejected() {
        let inner = SyntheticSource::new("stub://t", 32, 32);
        assert!(BufferedSource::spawn(Box::new(inner), 0).is_err());
    }
}
