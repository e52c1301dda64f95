use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crate::dec::{OutputStatus, PictureDecoder};
use crate::def::*;
use crate::frame::Frame;
use crate::restrictions::Restrictions;

/* Picture-parallel decoder pipeline.
 *
 * Workers pull the first pending item whose dependencies have all left the
 * Processing state, decode it, make its reconstruction visible, post-process
 * and push it onto the finished queue. The host drains finished work in
 * completion order through the wait functions.
 *
 * Note: completion callbacks are invoked while the pool mutex is held. A
 * callback must not block and must not call back into the pool; what it may
 * do is update picture output state that other workers inspect. */

pub struct WorkItem {
    pub segment_header: Arc<SegmentHeader>,
    pub prev_segment_header: Arc<SegmentHeader>,
    pub pic_dec: Arc<PictureDecoder>,
    pub inter_dependencies: Vec<Arc<PictureDecoder>>,
    pub nal: Vec<u8>,
    pub nal_offset: usize,
    pub success: bool,
}

struct PoolState {
    pending_work: VecDeque<WorkItem>,
    finished_work: VecDeque<WorkItem>,
    jobs_in_flight: usize,
    running: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    wait_work_cond: Condvar,
    work_done_cond: Condvar,
}

pub struct ThreadDecoder {
    shared: Arc<Shared>,
    worker_threads: Vec<thread::JoinHandle<()>>,
}

impl ThreadDecoder {
    /* negative thread count picks the machine's hardware concurrency */
    pub fn new(num_threads: i32) -> Self {
        let num_threads = if num_threads < 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            num_threads as usize
        };
        /* need at least one thread to work */
        let num_threads = num_threads.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                pending_work: VecDeque::new(),
                finished_work: VecDeque::new(),
                jobs_in_flight: 0,
                running: true,
            }),
            wait_work_cond: Condvar::new(),
            work_done_cond: Condvar::new(),
        });
        let mut worker_threads = Vec::with_capacity(num_threads);
        while worker_threads.len() < num_threads {
            let shared = Arc::clone(&shared);
            worker_threads.push(thread::spawn(move || worker_main(&shared)));
        }
        ThreadDecoder {
            shared,
            worker_threads,
        }
    }

    pub fn stop_all(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.running = false;
            self.shared.wait_work_cond.notify_all(); /* wakeup all */
        }
        for thread in self.worker_threads.drain(..) {
            let _ = thread.join();
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn decode_async(&self, segment_header: Arc<SegmentHeader>,
                        prev_segment_header: Arc<SegmentHeader>,
                        pic_dec: Arc<PictureDecoder>,
                        deps: Vec<Arc<PictureDecoder>>, nal: Vec<u8>, nal_offset: usize) {
        /* prepare work for thread */
        let work = WorkItem {
            segment_header,
            prev_segment_header,
            pic_dec,
            inter_dependencies: deps,
            nal,
            nal_offset,
            success: false,
        };
        /* signal one worker thread to begin processing */
        let mut state = self.shared.state.lock().unwrap();
        state.pending_work.push_back(work);
        state.jobs_in_flight += 1;
        self.shared.wait_work_cond.notify_one();
    }

    pub fn wait_for_picture<F>(&self, pic: &Arc<PictureDecoder>, callback: &mut F)
    where
        F: FnMut(&Arc<PictureDecoder>, bool, &[Arc<PictureDecoder>]),
    {
        while pic.get_output_status() != OutputStatus::HasNotBeenOutput {
            self.wait_one(callback);
        }
    }

    pub fn wait_one<F>(&self, callback: &mut F)
    where
        F: FnMut(&Arc<PictureDecoder>, bool, &[Arc<PictureDecoder>]),
    {
        let mut state = self.shared.state.lock().unwrap();
        while state.finished_work.is_empty() {
            state = self.shared.work_done_cond.wait(state).unwrap();
        }
        let work = state.finished_work.pop_front().unwrap();
        state.jobs_in_flight -= 1;
        /* note! callback invoked while lock is being held */
        callback(&work.pic_dec, work.success, &work.inter_dependencies);
    }

    pub fn wait_all<F>(&self, callback: &mut F)
    where
        F: FnMut(&Arc<PictureDecoder>, bool, &[Arc<PictureDecoder>]),
    {
        let mut state = self.shared.state.lock().unwrap();
        while state.jobs_in_flight > 0 {
            while state.finished_work.is_empty() {
                state = self.shared.work_done_cond.wait(state).unwrap();
            }
            let work = state.finished_work.pop_front().unwrap();
            state.jobs_in_flight -= 1;
            /* note! callback invoked while lock is held */
            callback(&work.pic_dec, work.success, &work.inter_dependencies);
        }
    }
}

impl Drop for ThreadDecoder {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn worker_main(shared: &Shared) {
    thread_local! {
        /* soc of the segment whose restrictions this thread reflects */
        static RESTRICTION_SOC: Cell<SegmentNum> = Cell::new(SegmentNum::MAX);
    }
    let mut lock = shared.state.lock().unwrap();
    loop {
        /* find one picture that can be decoded now */
        let mut work = loop {
            if !lock.running {
                return;
            }
            /* verify all dependencies are satisfied before taking work */
            let runnable = lock.pending_work.iter().position(|work| {
                work.inter_dependencies
                    .iter()
                    .all(|dep| dep.get_output_status() != OutputStatus::Processing)
            });
            if let Some(idx) = runnable {
                break lock.pending_work.remove(idx).unwrap();
            }
            lock = shared.wait_work_cond.wait(lock).unwrap();
        };
        drop(lock);

        /* load restriction flags for current thread unless already done */
        RESTRICTION_SOC.with(|soc| {
            if soc.get() != work.segment_header.soc {
                Restrictions::set_current(work.segment_header.restrictions);
                soc.set(work.segment_header.soc);
            }
        });

        /* decode picture */
        let refs: Vec<Arc<Frame>> = work
            .inter_dependencies
            .iter()
            .filter_map(|dep| dep.get_reconstruction())
            .collect();
        work.success = work.pic_dec.decode(&work.segment_header, &work.prev_segment_header,
                                           &work.nal, work.nal_offset, &refs);
        work.pic_dec.set_output_status(OutputStatus::PostProcessing);

        /* notify all workers that a dependency might be ready */
        lock = shared.state.lock().unwrap();
        shared.wait_work_cond.notify_all();
        drop(lock);

        /* verify checksum and prepare output picture */
        work.success &= work.pic_dec.postprocess(&work.segment_header, &work.nal);
        work.pic_dec.set_output_status(OutputStatus::FinishedProcessing);

        /* notify main thread that picture is fully decoded */
        lock = shared.state.lock().unwrap();
        lock.finished_work.push_back(work);
        shared.work_done_cond.notify_all();
    }
}
