//! Worker pools for independent, order-preserving batch jobs.
//!
//! A pool is created by the caller and passed into the recovery routines.
//! Every job receives its input index so it can derive its own random
//! stream; no RNG state is shared between jobs.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{DdmError, DdmResult};

pub trait WorkerPool {
    /// Number of parallel workers.
    fn workers(&self) -> usize;

    /// Run `task` once per input and return the results in input order.
    ///
    /// Blocks until the batch is done. If any task fails the whole batch
    /// fails and no partial results are returned.
    fn map<T, R, F>(&self, inputs: &[T], task: F) -> DdmResult<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> DdmResult<R> + Sync + Send;
}

/// Fixed-size pool of dedicated rayon threads, released on drop.
pub struct RayonPool {
    pool: ThreadPool,
}

impl RayonPool {
    pub fn new(num_workers: usize) -> DdmResult<Self> {
        if num_workers == 0 {
            return Err(DdmError::Configuration(
                "worker pool needs at least one worker".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|idx| format!("ddm-worker-{idx}"))
            .build()?;
        Ok(Self { pool })
    }
}

impl WorkerPool for RayonPool {
    fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn map<T, R, F>(&self, inputs: &[T], task: F) -> DdmResult<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> DdmResult<R> + Sync + Send,
    {
        self.pool.install(|| {
            inputs
                .par_iter()
                .enumerate()
                .map(|(idx, input)| task(idx, input))
                .collect()
        })
    }
}

/// Runs every task on the calling thread, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPool;

impl WorkerPool for SerialPool {
    fn workers(&self) -> usize {
        1
    }

    fn map<T, R, F>(&self, inputs: &[T], task: F) -> DdmResult<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> DdmResult<R> + Sync + Send,
    {
        inputs
            .iter()
            .enumerate()
            .map(|(idx, input)| task(idx, input))
            .collect()
    }
}

/// Random stream `stream` of the generator family seeded with `seed`.
///
/// Streams of one seed never overlap, so jobs that each take their own
/// stream draw independently no matter which worker runs them.
pub fn task_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}
