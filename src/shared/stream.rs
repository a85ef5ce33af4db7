// This is free and unencumbered software released into the public domain.

//! Frame delivery into a preview surface.
//!
//! This is the background path that renders frames: producers push into a
//! bounded queue and a worker thread fans each frame out to the registered
//! sinks. A full queue drops the frame rather than blocking the producer.

use crate::shared::{CameraError, Frame};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc::{SyncSender, TrySendError, sync_channel},
    },
    thread::JoinHandle,
};

pub type FrameSink = Arc<dyn Fn(Frame) + Send + Sync + 'static>;

#[derive(Debug)]
pub enum StreamEvent {
    Started,
    Stopped,
    FrameDropped,
    Error(CameraError),
}

/// What happened to a frame pushed into a [`FrameQueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The queue was full; the frame was discarded.
    Dropped,
    /// The renderer is gone.
    Closed,
}

enum RenderMsg {
    Frame(Frame),
    Sink(FrameSink),
    Stop,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    dropped: AtomicU64,
    rendered: AtomicU64,
}

/// Running totals of a [`FrameDispatcher`].
#[derive(Clone, Debug, Default)]
pub struct StreamStats(Arc<Counters>);

impl StreamStats {
    pub fn queued(&self) -> u64 {
        self.0.queued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.0.dropped.load(Ordering::Relaxed)
    }

    /// Frames handed to the sinks.
    pub fn rendered(&self) -> u64 {
        self.0.rendered.load(Ordering::Relaxed)
    }
}

/// Producer side of a [`FrameDispatcher`]; cheap to clone.
#[derive(Clone)]
pub struct FrameQueue {
    tx: SyncSender<RenderMsg>,
    events_tx: SyncSender<StreamEvent>,
    stats: StreamStats,
}

impl core::fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameQueue")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl FrameQueue {
    /// Queues a frame for rendering without blocking.
    pub fn push(&self, frame: Frame) -> Delivery {
        match self.tx.try_send(RenderMsg::Frame(frame)) {
            Ok(()) => {
                self.stats.0.queued.fetch_add(1, Ordering::Relaxed);
                Delivery::Queued
            },
            Err(TrySendError::Full(_)) => {
                self.stats.0.dropped.fetch_add(1, Ordering::Relaxed);
                let _ = self.events_tx.try_send(StreamEvent::FrameDropped);
                Delivery::Dropped
            },
            Err(TrySendError::Disconnected(_)) => {
                let _ = self
                    .events_tx
                    .try_send(StreamEvent::Error(CameraError::Closed));
                Delivery::Closed
            },
        }
    }
}

/// Renders queued frames into sinks on its own thread.
///
/// The worker owns the sink list; sinks registered after a frame was queued
/// only see later frames.
pub struct FrameDispatcher {
    queue: FrameQueue,
    worker: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for FrameDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameDispatcher")
            .field("running", &self.worker.is_some())
            .field("stats", &self.queue.stats)
            .finish()
    }
}

impl FrameDispatcher {
    pub fn new(capacity: usize, events_tx: SyncSender<StreamEvent>) -> Self {
        let (tx, rx) = sync_channel::<RenderMsg>(capacity.max(1));
        let stats = StreamStats::default();

        let worker = {
            let events_tx = events_tx.clone();
            let stats = stats.clone();
            std::thread::spawn(move || {
                let _ = events_tx.try_send(StreamEvent::Started);
                let mut sinks: Vec<FrameSink> = Vec::new();

                for msg in rx {
                    match msg {
                        RenderMsg::Frame(frame) => {
                            for sink in &sinks {
                                sink(frame.clone());
                            }
                            stats.0.rendered.fetch_add(1, Ordering::Relaxed);
                        },
                        RenderMsg::Sink(sink) => sinks.push(sink),
                        RenderMsg::Stop => break,
                    }
                }

                let _ = events_tx.try_send(StreamEvent::Stopped);
            })
        };

        Self {
            queue: FrameQueue {
                tx,
                events_tx,
                stats,
            },
            worker: Some(worker),
        }
    }

    pub fn queue(&self) -> FrameQueue {
        self.queue.clone()
    }

    pub fn stats(&self) -> StreamStats {
        self.queue.stats.clone()
    }

    /// Registers a sink; blocks while the queue is full.
    pub fn add_sink(&self, sink: FrameSink) {
        if self.queue.tx.send(RenderMsg::Sink(sink)).is_err() {
            trace_event!(warn, "frame renderer stopped; sink not registered");
        }
    }

    /// Stops the worker once the frames already queued are rendered.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.queue.tx.send(RenderMsg::Stop);
        let _ = worker.join();
    }
}

impl Drop for FrameDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::mpsc::channel, time::Duration};

    fn frame() -> Frame {
        Frame::new_bgra(vec![0u8; 2 * 2 * 4], 2, 2, 0)
    }

    #[test]
    fn fans_out_frames_to_every_sink() {
        let (events_tx, events_rx) = sync_channel(16);
        let mut dispatcher = FrameDispatcher::new(4, events_tx);

        let (seen_tx, seen_rx) = channel();
        for sink_id in 0..2 {
            let seen_tx = seen_tx.clone();
            dispatcher.add_sink(Arc::new(move |frame: Frame| {
                let _ = seen_tx.send((sink_id, frame.width));
            }));
        }

        assert_eq!(dispatcher.queue().push(frame()), Delivery::Queued);

        let mut sinks: Vec<_> = (0..2)
            .map(|_| seen_rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        sinks.sort();
        assert_eq!(sinks, vec![(0, 2), (1, 2)]);

        dispatcher.stop();
        assert_eq!(dispatcher.stats().rendered(), 1);
        let events: Vec<_> = events_rx.try_iter().collect();
        assert!(matches!(events.first(), Some(StreamEvent::Started)));
        assert!(matches!(events.last(), Some(StreamEvent::Stopped)));
    }

    #[test]
    fn stop_renders_what_was_queued() {
        let (events_tx, _events_rx) = sync_channel(16);
        let mut dispatcher = FrameDispatcher::new(8, events_tx);
        let (seen_tx, seen_rx) = channel();
        dispatcher.add_sink(Arc::new(move |_frame: Frame| {
            let _ = seen_tx.send(());
        }));

        let queue = dispatcher.queue();
        for _ in 0..3 {
            assert_eq!(queue.push(frame()), Delivery::Queued);
        }
        dispatcher.stop();

        assert_eq!(seen_rx.try_iter().count(), 3);
        assert_eq!(queue.push(frame()), Delivery::Closed);
    }

    #[test]
    fn full_queue_drops_and_counts_frame() {
        let (events_tx, events_rx) = sync_channel(16);
        let dispatcher = FrameDispatcher::new(1, events_tx);
        let (release_tx, release_rx) = channel::<()>();
        let release_rx = std::sync::Mutex::new(release_rx);
        dispatcher.add_sink(Arc::new(move |_frame: Frame| {
            let _ = release_rx.lock().map(|rx| rx.recv_timeout(Duration::from_secs(2)));
        }));

        let queue = dispatcher.queue();
        let mut deliveries = Vec::new();
        for _ in 0..4 {
            deliveries.push(queue.push(frame()));
        }

        // One frame is blocked in the sink, one fits the queue; the rest drop.
        assert!(deliveries.contains(&Delivery::Dropped));
        let dropped = deliveries.iter().filter(|d| **d == Delivery::Dropped).count();
        assert_eq!(dispatcher.stats().dropped(), dropped as u64);
        assert!(
            events_rx
                .try_iter()
                .any(|e| matches!(e, StreamEvent::FrameDropped))
        );

        for _ in 0..4 {
            let _ = release_tx.send(());
        }
    }
}
