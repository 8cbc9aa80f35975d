//! In-process transport: one worker per thread, one mailbox per worker.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::{Communicator, Payload, Tag, TAG_SPLIT};

const WORLD_CONTEXT: i32 = 0;
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const POISONED_MESSAGE: &str = "a peer worker panicked";

struct Envelope {
    context: i32,
    source: usize,
    tag: Tag,
    payload: Box<dyn Any + Send>,
}

#[derive(Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    arrived: Condvar,
}

struct Fabric {
    mailboxes: Vec<Mailbox>,
    next_context: AtomicI32,
    poisoned: AtomicBool,
}

impl Fabric {
    fn new(workers: usize) -> Self {
        Self {
            mailboxes: (0..workers).map(|_| Mailbox::default()).collect(),
            next_context: AtomicI32::new(WORLD_CONTEXT + 1),
            poisoned: AtomicBool::new(false),
        }
    }

    fn poison(&self) {
        self.poisoned.store(true, Ordering::Release);
        for mailbox in &self.mailboxes {
            mailbox.arrived.notify_all();
        }
    }
}

/// Marks the fabric poisoned when its worker unwinds.
struct PoisonOnPanic<'a>(&'a Fabric);

impl Drop for PoisonOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.poison();
        }
    }
}

/// Communicator over the workers of a [`ThreadUniverse`].
#[derive(Clone)]
pub struct ThreadComm {
    fabric: Arc<Fabric>,
    context: i32,
    rank: usize,
    /// Universe rank of each member, indexed by rank in this group.
    members: Arc<[usize]>,
}

impl fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadComm")
            .field("context", &self.context)
            .field("rank", &self.rank)
            .field("size", &self.members.len())
            .finish()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.members.len()
    }

    fn context(&self) -> i32 {
        self.context
    }

    fn send<T: Payload>(&self, dest: usize, tag: Tag, data: Vec<T>) {
        let mailbox = &self.fabric.mailboxes[self.members[dest]];
        mailbox.queue.lock().push_back(Envelope {
            context: self.context,
            source: self.rank,
            tag,
            payload: Box::new(data),
        });
        mailbox.arrived.notify_all();
    }

    fn recv<T: Payload>(&self, source: usize, tag: Tag) -> Vec<T> {
        let mailbox = &self.fabric.mailboxes[self.members[self.rank]];
        let mut queue = mailbox.queue.lock();
        loop {
            let pos = queue
                .iter()
                .position(|e| e.context == self.context && e.source == source && e.tag == tag);
            if let Some(envelope) = pos.and_then(|pos| queue.remove(pos)) {
                drop(queue);
                return match envelope.payload.downcast::<Vec<T>>() {
                    Ok(data) => *data,
                    Err(_) => panic!(
                        "message from rank {source} with tag {tag:#x} has an unexpected element type"
                    ),
                };
            }
            if self.fabric.poisoned.load(Ordering::Acquire) {
                panic!("{POISONED_MESSAGE}; abandoning receive from rank {source}");
            }
            mailbox.arrived.wait_for(&mut queue, POLL_INTERVAL);
        }
    }

    fn split(&self, members: &[usize]) -> Option<Self> {
        let context = if self.rank == 0 {
            let id = self.fabric.next_context.fetch_add(1, Ordering::Relaxed);
            for p in 1..self.size() {
                self.send(p, TAG_SPLIT, vec![id]);
            }
            id
        } else {
            self.recv::<i32>(0, TAG_SPLIT)[0]
        };
        let rank = members.iter().position(|&m| m == self.rank)?;
        Some(ThreadComm {
            fabric: Arc::clone(&self.fabric),
            context,
            rank,
            members: members.iter().map(|&m| self.members[m]).collect(),
        })
    }
}

/// Entry point for in-process runs.
pub struct ThreadUniverse;

impl ThreadUniverse {
    /// Run `body` on `workers` threads, each with its own world
    /// communicator, and return the results in rank order.
    ///
    /// If any worker panics the others are released from their blocking
    /// receives and the original panic is resumed on the caller.
    pub fn run<R, F>(workers: usize, body: F) -> Vec<R>
    where
        R: Send,
        F: Fn(ThreadComm) -> R + Sync,
    {
        assert!(workers > 0, "a universe needs at least one worker");
        let fabric = Arc::new(Fabric::new(workers));
        let members: Arc<[usize]> = (0..workers).collect();
        let outcomes: Vec<std::thread::Result<R>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|rank| {
                    let comm = ThreadComm {
                        fabric: Arc::clone(&fabric),
                        context: WORLD_CONTEXT,
                        rank,
                        members: Arc::clone(&members),
                    };
                    let body = &body;
                    let fabric = &*fabric;
                    std::thread::Builder::new()
                        .name(format!("distmat-worker-{rank}"))
                        .spawn_scoped(scope, move || {
                            let _guard = PoisonOnPanic(fabric);
                            body(comm)
                        })
                        .unwrap_or_else(|e| panic!("failed to spawn worker {rank}: {e}"))
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        if outcomes.iter().any(|o| o.is_err()) {
            let mut first = None;
            for outcome in outcomes {
                if let Err(payload) = outcome {
                    let secondary = panic_message(&*payload)
                        .is_some_and(|msg| msg.starts_with(POISONED_MESSAGE));
                    if !secondary {
                        std::panic::resume_unwind(payload);
                    }
                    first.get_or_insert(payload);
                }
            }
            match first {
                Some(payload) => std::panic::resume_unwind(payload),
                None => unreachable!("an errored outcome was recorded"),
            }
        }
        outcomes.into_iter().filter_map(Result::ok).collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
}
