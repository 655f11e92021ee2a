//! Sequencing thread abstraction.
//!
//! All registry mutation and navigation-lock handling is confined to one
//! designated thread. Deferred work is handed to that thread through a
//! [`Sequencer`].

use crate::config::SequencerConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, warn};

/// Unit of deferred work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Designated sequencing thread
pub trait Sequencer: Send + Sync {
    /// Queue a task for execution on the sequencing thread
    fn post(&self, task: Task);

    /// Whether the caller is running on the sequencing thread
    fn is_current(&self) -> bool;
}

/// Sequencer backed by a dedicated worker thread
pub struct ThreadSequencer {
    sender: Mutex<Option<Sender<Task>>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadSequencer {
    /// Spawn the worker thread
    pub fn spawn(name: &str) -> std::io::Result<Arc<Self>> {
        let (sender, receiver) = channel::<Task>();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            while let Ok(task) = receiver.recv() {
                task();
            }
        })?;
        debug!(thread = name, "Sequencer thread started");

        Ok(Arc::new(ThreadSequencer {
            sender: Mutex::new(Some(sender)),
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        }))
    }

    /// Spawn the worker thread named by the configuration
    pub fn from_config(config: &SequencerConfig) -> std::io::Result<Arc<Self>> {
        Self::spawn(&config.thread_name)
    }

    /// Stop accepting tasks and wait for queued ones to finish
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if thread::current().id() == self.thread_id {
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("Sequencer thread panicked");
            }
        }
    }
}

impl Sequencer for ThreadSequencer {
    fn post(&self, task: Task) {
        let guard = self.sender.lock();
        match guard.as_ref() {
            Some(sender) => {
                if sender.send(task).is_err() {
                    warn!("Sequencer thread gone; dropping task");
                }
            }
            None => warn!("Sequencer shut down; dropping task"),
        }
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for ThreadSequencer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sequencer whose tasks run when the owning thread drains it
///
/// The thread that creates it is the sequencing thread.
pub struct ManualSequencer {
    owner: ThreadId,
    queue: Mutex<VecDeque<Task>>,
}

impl ManualSequencer {
    pub fn new() -> Arc<Self> {
        Arc::new(ManualSequencer {
            owner: thread::current().id(),
            queue: Mutex::new(VecDeque::new()),
        })
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued tasks, including ones posted while draining, until the
    /// queue is empty. Returns the number of tasks executed.
    pub fn run_until_idle(&self) -> usize {
        debug_assert!(self.is_current(), "run_until_idle called off the sequencing thread");
        let mut executed = 0;
        loop {
            let task = self.queue.lock().pop_front();
            match task {
                Some(task) => {
                    task();
                    executed += 1;
                }
                None => return executed,
            }
        }
    }
}

impl Sequencer for ManualSequencer {
    fn post(&self, task: Task) {
        self.queue.lock().push_back(task);
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }
}
