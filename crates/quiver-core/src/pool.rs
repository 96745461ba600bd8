//! Background position-buffer computation.
//!
//! Converting sample arrays into vertex buffers is CPU-bound and can take
//! tens of milliseconds for long, dense channels; running it on the UI
//! thread causes visible stuttering during zoom. The pool offloads the work
//! to a fixed set of threads:
//!
//! 1. The UI sends a [`BufferRequest`] tagged with the channel's current
//!    generation
//! 2. An idle worker picks it up from the shared channel and runs
//!    [`build_position_buffer`]
//! 3. The UI polls [`PositionBufferPool::try_recv`] from its tick handler
//!    and applies responses whose generation is still current
//!
//! The pool is an explicitly owned resource: the application constructs it
//! at startup and passes it by reference to whoever submits work. There is
//! no process-global instance.
//!
//! Responses are not guaranteed to arrive in issue order. Stale responses
//! (older generation than the channel's current one) are discarded by the
//! receiver; there is no cancellation or retry.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use thiserror::Error;

use crate::buffer::{build_position_buffer, PositionBufferParams};

/// Worker count used when hardware parallelism cannot be determined.
pub const FALLBACK_WORKER_COUNT: usize = 4;

/// A request to convert one data segment into a position buffer.
#[derive(Debug, Clone)]
pub struct BufferRequest {
    /// Scoped id of the requesting channel renderer
    pub channel_id: String,
    /// Key identifying the data segment within the channel
    pub segment_key: String,
    /// The channel's generation at request time
    pub generation: u64,
    /// Conversion inputs
    pub params: PositionBufferParams,
}

/// A completed conversion.
#[derive(Debug, Clone)]
pub struct BufferResponse {
    pub channel_id: String,
    pub segment_key: String,
    /// Generation copied from the request, for staleness checks
    pub generation: u64,
    /// Interleaved (x, y, z) vertices
    pub positions: Vec<f32>,
}

/// The request side of the pool has shut down.
#[derive(Debug, Error)]
#[error("position-buffer workers disconnected")]
pub struct PoolDisconnected;

/// A fixed pool of worker threads converting sample arrays into position
/// buffers.
pub struct PositionBufferPool {
    tx: Sender<BufferRequest>,
    rx: Receiver<BufferResponse>,
    workers: Vec<JoinHandle<()>>,
}

impl PositionBufferPool {
    /// Spawn a pool sized to the available hardware parallelism, falling
    /// back to [`FALLBACK_WORKER_COUNT`] when it cannot be determined.
    pub fn spawn() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(FALLBACK_WORKER_COUNT);
        Self::with_workers(workers)
    }

    /// Spawn a pool with an explicit worker count (minimum one).
    pub fn with_workers(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (request_tx, request_rx) = channel::unbounded::<BufferRequest>();
        let (result_tx, result_rx) = channel::unbounded::<BufferResponse>();

        let workers = (0..worker_count)
            .map(|i| {
                let rx = request_rx.clone();
                let tx = result_tx.clone();
                thread::Builder::new()
                    .name(format!("position-buffer-{i}"))
                    .spawn(move || worker_loop(rx, tx))
                    .expect("failed to spawn position-buffer worker")
            })
            .collect();

        log::info!("position-buffer pool started with {worker_count} workers");

        Self {
            tx: request_tx,
            rx: result_rx,
            workers,
        }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Submit a conversion request (non-blocking). The response will be
    /// available via [`try_recv`](Self::try_recv) once a worker finishes.
    pub fn submit(&self, request: BufferRequest) -> Result<(), PoolDisconnected> {
        self.tx.send(request).map_err(|_| PoolDisconnected)
    }

    /// Try to receive one completed conversion (non-blocking). Call from
    /// the UI tick handler until it returns `None`.
    pub fn try_recv(&self) -> Option<BufferResponse> {
        match self.rx.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("position-buffer workers disconnected unexpectedly");
                None
            }
        }
    }
}

fn worker_loop(rx: Receiver<BufferRequest>, tx: Sender<BufferResponse>) {
    while let Ok(request) = rx.recv() {
        let positions = build_position_buffer(&request.params);
        log::debug!(
            "position buffer built: channel={} segment={} generation={} vertices={}",
            request.channel_id,
            request.segment_key,
            request.generation,
            positions.len() / 3
        );
        let response = BufferResponse {
            channel_id: request.channel_id,
            segment_key: request.segment_key,
            generation: request.generation,
            positions,
        };
        if tx.send(response).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn request(generation: u64) -> BufferRequest {
        BufferRequest {
            channel_id: "main:STA01/SHZ".into(),
            segment_key: "seg-0".into(),
            generation,
            params: PositionBufferParams {
                samples: vec![0.0, 1.0, -1.0, 0.5],
                start_time_secs: 0.0,
                sample_rate: 1.0,
                display_start_time_secs: 0.0,
                display_end_time_secs: 4.0,
                gl_min: 0.0,
                gl_max: 100.0,
            },
        }
    }

    fn recv_blocking(pool: &PositionBufferPool) -> BufferResponse {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(response) = pool.try_recv() {
                return response;
            }
            assert!(Instant::now() < deadline, "timed out waiting for worker");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn pool_spawns_at_least_one_worker() {
        let pool = PositionBufferPool::spawn();
        assert!(pool.worker_count() >= 1);
        assert!(pool.try_recv().is_none());
    }

    #[test]
    fn round_trip_produces_vertices() {
        let pool = PositionBufferPool::with_workers(2);
        pool.submit(request(1)).unwrap();
        let response = recv_blocking(&pool);
        assert_eq!(response.generation, 1);
        assert_eq!(response.positions.len(), 12);
        assert_eq!(response.positions[0], 0.0);
        assert_eq!(response.positions[4], 1.0);
    }

    #[test]
    fn responses_carry_their_request_generation() {
        let pool = PositionBufferPool::with_workers(1);
        pool.submit(request(3)).unwrap();
        pool.submit(request(4)).unwrap();
        let mut generations = vec![recv_blocking(&pool).generation, recv_blocking(&pool).generation];
        generations.sort_unstable();
        assert_eq!(generations, vec![3, 4]);
    }
}
