// multi-pass frame pipeline over a persistent worker pool.
//
// Every pass dispatches one render task per worker; tasks partition
// the output rows and a barrier closes the pass before the next one
// observes its frame. Between init and barrier nothing else touches
// the frames, which is what permits handing raw frame views to the
// pool (see frame.rs for the row-disjointness contract).

use std::mem;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use crate::frame::{FrameData, FrameOwned};

#[cfg(test)]
#[path = "./process_test.rs"]
mod process_test;

/// identifies one worker's slice of a dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderContext {
    pub thread_idx: usize,
    pub num_threads: usize,
}

impl RenderContext {
    /// disjoint, exhaustive row range for this worker
    pub fn rows(&self, height: i32) -> (i32, i32) {
        let begin_row = (height as i64 * self.thread_idx as i64 / self.num_threads as i64) as i32;
        let end_row =
            (height as i64 * (self.thread_idx as i64 + 1) / self.num_threads as i64) as i32;

        (begin_row, end_row)
    }
}

/// one stage of the pipeline.
///
/// `init` runs single-threaded before each dispatch and shapes the
/// output frame (or flags the pass as producing none); `render` is
/// then invoked once per worker with disjoint row ranges.
pub trait PassImpl: Send + Sync {
    fn init(&mut self, input: &FrameData, state: &mut PassState);
    fn render(&self, input: &FrameData, out: &FrameData, ctx: &RenderContext);
}

pub struct PassState {
    pub frame: FrameOwned,
    /// consume-only pass: the next pass keeps reading this pass's input
    pub no_output: bool,
}

pub struct RenderPass {
    imp: Box<dyn PassImpl>,
    pub state: PassState,
}

impl RenderPass {
    pub fn new(imp: Box<dyn PassImpl>) -> Self {
        RenderPass {
            imp,
            state: PassState {
                frame: FrameOwned::new(),
                no_output: false,
            },
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// raw pointer that may cross into the pool; validity is guaranteed
/// by the dispatch barrier keeping the referent alive and unmoved
struct SendPtr<T: ?Sized>(*const T);

unsafe impl<T: ?Sized> Send for SendPtr<T> {}

pub struct ParallelProcess {
    pub render_passes: Vec<RenderPass>,
    job_tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    barrier: Arc<(Mutex<usize>, Condvar)>,
}

impl ParallelProcess {
    pub fn new() -> Self {
        let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::with_threads(threads)
    }

    pub fn with_threads(thread_count: usize) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(thread_count);

        for _ in 0..thread_count {
            let job_rx = job_rx.clone();
            workers.push(thread::spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    job();
                }
            }));
        }

        ParallelProcess {
            render_passes: Vec::new(),
            job_tx: Some(job_tx),
            workers,
            barrier: Arc::new((Mutex::new(0), Condvar::new())),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// run every pass over `input`, leaving the last pass's output in
    /// `out`
    pub fn apply(&mut self, input: &FrameData, out: &mut FrameOwned) {
        let num_threads = self.workers.len();
        let pass_count = self.render_passes.len();
        let mut current: *const FrameData = input;

        for idx in 0..pass_count {
            let last = idx + 1 == pass_count;

            // the final pass renders straight into the caller's frame;
            // swapping the storage back afterwards keeps the pass's
            // buffer its own
            if last {
                mem::swap(&mut self.render_passes[idx].state.frame, out);
            }

            {
                let pass = &mut self.render_passes[idx];
                let input_ref = unsafe { &*current };
                pass.imp.init(input_ref, &mut pass.state);
            }

            {
                let pass = &self.render_passes[idx];
                let imp: *const dyn PassImpl = pass.imp.as_ref();
                let out_frame: *const FrameData = &*pass.state.frame;

                let (working, cv) = &*self.barrier;
                *working.lock().unwrap() = num_threads;

                let job_tx = self.job_tx.as_ref().expect("worker pool already shut down");
                for thread_idx in 0..num_threads {
                    let ctx = RenderContext {
                        thread_idx,
                        num_threads,
                    };
                    let imp = SendPtr(imp);
                    let input = SendPtr(current);
                    let out_frame = SendPtr(out_frame);
                    let barrier = Arc::clone(&self.barrier);

                    let job: Job = Box::new(move || {
                        unsafe { (*imp.0).render(&*input.0, &*out_frame.0, &ctx) };

                        let (working, cv) = &*barrier;
                        let mut left = working.lock().unwrap();
                        *left -= 1;
                        if *left == 0 {
                            cv.notify_one();
                        }
                    });

                    job_tx.send(job).expect("worker pool disconnected");
                }

                let mut left = working.lock().unwrap();
                while *left != 0 {
                    left = cv.wait(left).unwrap();
                }
            }

            if last {
                mem::swap(&mut self.render_passes[idx].state.frame, out);
            }

            let pass = &self.render_passes[idx];
            if !pass.state.no_output {
                current = if last {
                    &**out
                } else {
                    &*pass.state.frame
                };
            }
        }
    }
}

impl Default for ParallelProcess {
    fn default() -> Self {
        ParallelProcess::new()
    }
}

impl Drop for ParallelProcess {
    fn drop(&mut self) {
        self.job_tx.take();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
