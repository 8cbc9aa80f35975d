//! Message passing between the workers of a process grid.
//!
//! Every distributed operation talks to its peers through
//! [`Communicator`]: buffered point-to-point messages tagged by a
//! context id plus a handful of collectives built on top of them.
//! [`ThreadComm`] runs one worker per OS thread inside a single process;
//! with the `mpi` feature, `MpiComm` runs one worker per MPI rank.

mod exchange;
#[cfg(feature = "mpi")]
mod mpi_comm;
mod thread;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use exchange::{Exchange, Received};
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;
pub use thread::{ThreadComm, ThreadUniverse};

/// Message tag. Messages with equal `(context, source, tag)` are
/// delivered in the order they were sent.
pub type Tag = u32;

pub(crate) const TAG_REDISTRIBUTE: Tag = 1;
pub(crate) const TAG_EXTRACT_ROWS: Tag = 2;
pub(crate) const TAG_EXTRACT_COLS: Tag = 3;

const TAG_BARRIER: Tag = 0xFFFF_FF01;
const TAG_BROADCAST: Tag = 0xFFFF_FF02;
const TAG_GATHER: Tag = 0xFFFF_FF03;
pub(crate) const TAG_SPLIT: Tag = 0xFFFF_FF04;

/// Anything that can travel between workers. In-process transports move
/// the values; process-to-process transports serialise them.
pub trait Payload: Serialize + DeserializeOwned + Send + 'static {}

impl<T: Serialize + DeserializeOwned + Send + 'static> Payload for T {}

/// A group of workers that can exchange messages.
///
/// Collective methods must be called by every member in the same order.
pub trait Communicator: Clone + Sized {
    /// Rank of this worker within the group.
    fn rank(&self) -> usize;

    /// Number of workers in the group.
    fn size(&self) -> usize;

    /// Identifier of this group, identical on all members and distinct
    /// from every other group built from the same universe.
    fn context(&self) -> i32;

    /// Queue `data` for `dest`. Never blocks.
    fn send<T: Payload>(&self, dest: usize, tag: Tag, data: Vec<T>);

    /// Block until a message from `source` with `tag` arrives.
    fn recv<T: Payload>(&self, source: usize, tag: Tag) -> Vec<T>;

    /// Collective: build a new group from `members` (ranks of `self`, in
    /// the order that defines their new ranks). Workers not listed get
    /// `None`.
    fn split(&self, members: &[usize]) -> Option<Self>;

    fn barrier(&self) {
        if self.rank() == 0 {
            for p in 1..self.size() {
                let _: Vec<u8> = self.recv(p, TAG_BARRIER);
            }
            for p in 1..self.size() {
                self.send::<u8>(p, TAG_BARRIER, Vec::new());
            }
        } else {
            self.send::<u8>(0, TAG_BARRIER, Vec::new());
            let _: Vec<u8> = self.recv(0, TAG_BARRIER);
        }
    }

    /// Collective: every member returns the `data` passed by `root`.
    fn broadcast<T: Payload + Clone>(&self, root: usize, data: Vec<T>) -> Vec<T> {
        if self.rank() == root {
            for p in (0..self.size()).filter(|&p| p != root) {
                self.send(p, TAG_BROADCAST, data.clone());
            }
            data
        } else {
            self.recv(root, TAG_BROADCAST)
        }
    }

    /// Collective: `root` receives every member's contribution in rank
    /// order.
    fn gather<T: Payload>(&self, root: usize, data: Vec<T>) -> Option<Vec<Vec<T>>> {
        if self.rank() != root {
            self.send(root, TAG_GATHER, data);
            return None;
        }
        let mut own = Some(data);
        let parts = (0..self.size())
            .map(|p| {
                if p == root {
                    own.take().unwrap_or_default()
                } else {
                    self.recv(p, TAG_GATHER)
                }
            })
            .collect();
        Some(parts)
    }

    /// Collective: every member receives every contribution in rank order.
    fn all_gather<T: Payload + Clone>(&self, data: Vec<T>) -> Vec<Vec<T>> {
        let parts = self.gather(0, data).unwrap_or_default();
        self.broadcast(0, parts)
    }

    /// Collective: fold every member's `value` with `op` in rank order.
    /// All members get the same bits back.
    fn all_reduce<T, F>(&self, value: T, op: F) -> T
    where
        T: Payload + Clone,
        F: Fn(T, T) -> T,
    {
        let reduced: Vec<T> = match self.gather(0, vec![value]) {
            Some(parts) => parts.into_iter().flatten().reduce(&op).into_iter().collect(),
            None => Vec::new(),
        };
        match self.broadcast(0, reduced).pop() {
            Some(v) => v,
            None => panic!("all_reduce: root broadcast carried no value"),
        }
    }

    /// Element-wise sum of equally sized vectors.
    fn all_reduce_sum<T>(&self, values: Vec<T>) -> Vec<T>
    where
        T: Payload + Clone + std::ops::Add<Output = T>,
    {
        self.all_reduce(values, |mut acc, other| {
            assert_eq!(acc.len(), other.len(), "all_reduce_sum: length mismatch");
            for (a, b) in acc.iter_mut().zip(other) {
                *a = a.clone() + b;
            }
            acc
        })
    }
}
