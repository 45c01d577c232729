//! Duplex endpoint of a full duplex pipe.

use std::fmt;
use std::sync::Arc;

use super::ChannelCore;
use super::sealed::Endpoint;
use crate::io::{CloseableChannel, SinkChannel, SourceChannel};

/// An endpoint that both reads and writes.
#[derive(Clone)]
pub struct StreamChannel {
    core: Arc<ChannelCore<StreamChannel>>,
}

impl Endpoint for StreamChannel {
    fn core(&self) -> &Arc<ChannelCore<Self>> {
        &self.core
    }

    fn from_core(core: Arc<ChannelCore<Self>>) -> Self {
        Self { core }
    }
}

impl CloseableChannel for StreamChannel {}
impl SourceChannel for StreamChannel {}
impl SinkChannel for StreamChannel {}

impl fmt::Debug for StreamChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamChannel")
            .field("id", &self.core.id())
            .field("state", &self.core.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelState;
    use crate::error::ErrorKind;
    use crate::testing::{Latch, eventually, terminate, worker};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn test_bytes_arrive_in_order() {
        let worker = worker();
        let (left, right) = worker.create_full_duplex_pipe().unwrap().into_sides();
        let expected: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let received = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(Latch::new(1));

        let (sink, eof) = (received.clone(), done.clone());
        right.read_setter().set(move |channel: &StreamChannel| {
            let mut buf = [0u8; 777];
            loop {
                match channel.read(&mut buf) {
                    Ok(Some(0)) => return,
                    Ok(Some(n)) => sink.lock().extend_from_slice(&buf[..n]),
                    Ok(None) => {
                        channel.suspend_reads();
                        eof.count_down();
                        return;
                    }
                    Err(err) => panic!("read failed: {}", err),
                }
            }
        });
        right.resume_reads();

        let data = Arc::new(expected.clone());
        let offset = Arc::new(AtomicUsize::new(0));
        left.write_setter().set(move |channel: &StreamChannel| {
            let mut at = offset.load(Ordering::SeqCst);
            while at < data.len() {
                let end = (at + 1000).min(data.len());
                match channel.write(&data[at..end]) {
                    Ok(0) => break,
                    Ok(n) => at += n,
                    Err(err) => panic!("write failed: {}", err),
                }
            }
            offset.store(at, Ordering::SeqCst);
            if at == data.len() {
                channel.shutdown_writes().unwrap();
            }
        });
        left.resume_writes();

        assert!(done.wait(TIMEOUT));
        assert_eq!(*received.lock(), expected);
        terminate(&worker);
    }

    #[test]
    fn test_half_close_keeps_other_direction() {
        let worker = worker();
        let (left, right) = worker.create_full_duplex_pipe().unwrap().into_sides();

        left.shutdown_writes().unwrap();
        assert_eq!(left.state(), ChannelState::WriteShutdown);
        assert_eq!(left.write(b"x").unwrap_err().kind(), ErrorKind::Closed);

        let mut buf = [0u8; 4];
        assert_eq!(right.read(&mut buf).unwrap(), None);
        assert_eq!(right.write(b"back").unwrap(), 4);
        assert_eq!(left.read(&mut buf).unwrap(), Some(4));
        assert_eq!(&buf, b"back");

        left.shutdown_reads().unwrap();
        assert_eq!(left.state(), ChannelState::Closed);
        assert!(!left.is_open());
        assert_eq!(left.read(&mut buf).unwrap(), None);
        assert_eq!(right.state(), ChannelState::Open);
        terminate(&worker);
    }

    #[test]
    fn test_close_listener_fires_once() {
        let worker = worker();
        let (left, _right) = worker.create_full_duplex_pipe().unwrap().into_sides();
        let fired = Arc::new(AtomicUsize::new(0));

        let count = fired.clone();
        left.close_setter().set(move |_: &StreamChannel| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        let closers: Vec<_> = (0..8)
            .map(|_| {
                let channel = left.clone();
                std::thread::spawn(move || channel.close().unwrap())
            })
            .collect();
        for closer in closers {
            closer.join().unwrap();
        }
        left.shutdown_reads().unwrap();
        left.close().unwrap();

        assert!(eventually(TIMEOUT, || fired.load(Ordering::SeqCst) == 1));
        terminate(&worker);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_invocation_after_close_listener() {
        let worker = worker();
        let (left, right) = worker.create_full_duplex_pipe().unwrap().into_sides();
        let log = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Latch::new(1));

        let events = log.clone();
        left.read_setter().set(move |channel: &StreamChannel| {
            events.lock().push("read");
            let mut buf = [0u8; 8];
            let _ = channel.read(&mut buf);
            if events.lock().len() > 3 {
                channel.close().unwrap();
            }
        });
        let events = log.clone();
        left.write_setter().set(move |_: &StreamChannel| events.lock().push("write"));
        let (events, done) = (log.clone(), closed.clone());
        left.close_setter().set(move |_: &StreamChannel| {
            events.lock().push("close");
            done.count_down();
        });
        left.resume_reads();
        left.resume_writes();

        let writer = std::thread::spawn(move || {
            while right.write(b"tick").is_ok() {
                std::thread::sleep(Duration::from_micros(200));
            }
        });

        assert!(closed.wait(TIMEOUT));
        writer.join().unwrap();
        terminate(&worker);

        let log = log.lock();
        assert_eq!(log.last(), Some(&"close"));
        assert_eq!(log.iter().filter(|e| **e == "close").count(), 1);
    }

    #[test]
    fn test_endpoint_invocations_never_overlap() {
        let worker = worker();
        let violations = Arc::new(AtomicUsize::new(0));
        let invocations = Arc::new(AtomicUsize::new(0));
        let mut pipes = Vec::new();

        for _ in 0..16 {
            let (left, right) = worker.create_full_duplex_pipe().unwrap().into_sides();
            for side in [&left, &right] {
                let busy = Arc::new(AtomicBool::new(false));

                let (flag, bad, count) = (busy.clone(), violations.clone(), invocations.clone());
                side.read_setter().set(move |channel: &StreamChannel| {
                    if flag.swap(true, Ordering::SeqCst) {
                        bad.fetch_add(1, Ordering::SeqCst);
                    }
                    let mut buf = [0u8; 64];
                    let _ = channel.read(&mut buf);
                    count.fetch_add(1, Ordering::SeqCst);
                    flag.store(false, Ordering::SeqCst);
                });

                let (flag, bad, count) = (busy.clone(), violations.clone(), invocations.clone());
                side.write_setter().set(move |channel: &StreamChannel| {
                    if flag.swap(true, Ordering::SeqCst) {
                        bad.fetch_add(1, Ordering::SeqCst);
                    }
                    let _ = channel.write(&[7u8; 32]);
                    if count.fetch_add(1, Ordering::SeqCst) % 3 == 0 {
                        channel.suspend_writes();
                    }
                    flag.store(false, Ordering::SeqCst);
                });
                side.resume_reads();
                side.resume_writes();
            }
            pipes.push((left, right));
        }

        for _ in 0..50 {
            for (left, right) in &pipes {
                left.resume_writes();
                right.resume_writes();
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(eventually(TIMEOUT, || invocations.load(Ordering::SeqCst) > 500));
        terminate(&worker);
        assert_eq!(violations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_abandoned_peer_breaks_the_pipe() {
        let worker = worker();
        let (left, right) = worker.create_full_duplex_pipe().unwrap().into_sides();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        right.close_setter().set(move |_: &StreamChannel| flag.store(true, Ordering::SeqCst));
        left.write(b"lost").unwrap();
        drop(right);

        let mut buf = [0u8; 4];
        assert!(eventually(TIMEOUT, || matches!(left.read(&mut buf), Ok(None))));
        assert_eq!(left.write(b"x").unwrap_err().kind(), ErrorKind::BrokenPipe);
        terminate(&worker);
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_shutdown_closes_live_endpoints() {
        let worker = worker();
        let latch = Arc::new(Latch::new(2));
        let (left, right) = worker.create_full_duplex_pipe().unwrap().into_sides();
        for side in [&left, &right] {
            let closed = latch.clone();
            side.close_setter().set(move |_: &StreamChannel| closed.count_down());
        }

        worker.shutdown();
        assert!(latch.wait(TIMEOUT));
        assert!(worker.await_termination(TIMEOUT));
        assert_eq!(left.state(), ChannelState::Closed);
        assert_eq!(right.state(), ChannelState::Closed);
    }

    #[test]
    fn test_debug_shows_id_and_state() {
        let worker = worker();
        let (left, _right) = worker.create_full_duplex_pipe().unwrap().into_sides();
        let rendered = format!("{:?}", left);
        assert!(rendered.contains(&format!("id: {}", left.id())));
        assert!(rendered.contains("Open"));
        terminate(&worker);
    }
}
