use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use xpipe::{SinkChannel, SourceChannel, Worker, WorkerConfig};

const DEFAULT_DATA_MB: usize = 100;
const REPLY_SIZE: usize = 200 * 1024; // 200 KB
const CHUNK_SIZE: usize = 16 * 1024;

struct Report {
    received: usize,
    matches: bool,
}

/// Pushes `size` copies of `byte` from `sink` to `source` through listeners
/// and waits until the source reads end-of-stream.
fn transfer<L, R>(source: &L, sink: &R, size: usize, byte: u8) -> Report
where
    L: SourceChannel,
    R: SinkChannel,
{
    let (done_tx, done_rx) = mpsc::channel();
    let received = Arc::new(AtomicUsize::new(0));
    let matches = Arc::new(AtomicUsize::new(0));

    let (count, good) = (received.clone(), matches.clone());
    source.read_setter().set(move |channel: &L| {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match channel.read(&mut buf) {
                Ok(Some(0)) => return,
                Ok(Some(n)) => {
                    count.fetch_add(n, Ordering::Relaxed);
                    let matching = buf[..n].iter().filter(|b| **b == byte).count();
                    good.fetch_add(matching, Ordering::Relaxed);
                }
                Ok(None) => {
                    channel.suspend_reads();
                    let _ = done_tx.send(());
                    return;
                }
                Err(err) => {
                    log::error!("Read failed: {}", err);
                    return;
                }
            }
        }
    });

    let chunk = vec![byte; CHUNK_SIZE];
    let sent = Arc::new(AtomicUsize::new(0));
    sink.write_setter().set(move |channel: &R| {
        let mut at = sent.load(Ordering::Relaxed);
        while at < size {
            let len = (size - at).min(chunk.len());
            match channel.write(&chunk[..len]) {
                Ok(0) => break,
                Ok(n) => at += n,
                Err(err) => {
                    log::error!("Write failed: {}", err);
                    return;
                }
            }
        }
        sent.store(at, Ordering::Relaxed);
        if at == size {
            channel.suspend_writes();
            if let Err(err) = channel.shutdown_writes() {
                log::error!("Shutdown failed: {}", err);
            }
        }
    });

    source.resume_reads();
    sink.resume_writes();
    done_rx.recv().expect("Transfer did not complete");

    let received = received.load(Ordering::Relaxed);
    Report {
        received,
        matches: received == size && matches.load(Ordering::Relaxed) == size,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_size = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<usize>().ok())
        .unwrap_or(DEFAULT_DATA_MB)
        * 1024
        * 1024;

    let worker = Worker::new(
        WorkerConfig::default()
            .with_worker_threads(2)
            .with_pipe_buffer_size(64 * 1024),
    )
    .expect("Failed to start worker");

    // one way, half duplex
    let (source, sink) = worker
        .create_half_duplex_pipe()
        .expect("Failed to create pipe")
        .into_sides();
    info!("Sending {} MB of data...", data_size / 1024 / 1024);

    let start = Instant::now();
    let report = transfer(&source, &sink, data_size, 0xAB);
    let elapsed = start.elapsed();
    let speed = (report.received as f64 / 1024.0 / 1024.0) / elapsed.as_secs_f64();

    if report.matches {
        info!("Data matches exactly");
    } else {
        info!("Data does not match");
    }
    info!("=== Transfer Complete ===");
    info!("Total received: {} MB", report.received / 1024 / 1024);
    info!("Time: {:.2} seconds", elapsed.as_secs_f64());
    info!("Speed: {:.2} MB/s", speed);

    // reply over a full duplex pipe, right to left
    let (left, right) = worker
        .create_full_duplex_pipe()
        .expect("Failed to create pipe")
        .into_sides();
    info!("Sending {} KB of data back...", REPLY_SIZE / 1024);

    let start = Instant::now();
    let report = transfer(&left, &right, REPLY_SIZE, 0xCD);
    let elapsed = start.elapsed();
    let speed = (report.received as f64 / 1024.0) / elapsed.as_secs_f64();

    info!("=== Reply Complete ===");
    info!("Total received: {} KB", report.received / 1024);
    info!("Matches: {}", report.matches);
    info!("Time: {:.2} seconds", elapsed.as_secs_f64());
    info!("Speed: {:.2} KB/s", speed);

    worker.shutdown();
    if !worker.await_termination(Duration::from_secs(10)) {
        log::warn!("Worker did not terminate in time");
    }
}
