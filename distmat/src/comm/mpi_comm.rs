//! Multi-process transport over MPI.
//!
//! Payloads travel as `bincode` byte messages. Sends are posted as
//! immediate requests so that [`Communicator::send`] never blocks; each
//! buffer is released once its request has completed.
//!
//! ```ignore
//! let (_universe, world) = MpiComm::initialize().expect("MPI already initialised");
//! let grid = ProcessGrid::square(&world)?;
//! ```

use std::cell::{Cell, RefCell};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use mpi::environment::Universe;
use mpi::point_to_point::{Destination, Source};
use mpi::request::{Request, StaticScope};
use mpi::topology::{Color, SimpleCommunicator};
use mpi::traits::Communicator as _;

use super::{Communicator, Payload, Tag};

const WORLD_CONTEXT: i32 = 0;
/// Library tags above this value belong to the collectives.
const RESERVED_TAG_BASE: Tag = 0xFFFF_FF00;
/// MPI guarantees tags up to 32767; collectives use the top 255.
const MPI_RESERVED_TAG_BASE: i32 = 32_512;

fn mpi_tag(tag: Tag) -> i32 {
    if tag > RESERVED_TAG_BASE {
        return MPI_RESERVED_TAG_BASE + (tag - RESERVED_TAG_BASE) as i32;
    }
    match i32::try_from(tag) {
        Ok(t) if t <= MPI_RESERVED_TAG_BASE => t,
        _ => panic!("tag {tag:#x} does not fit the MPI tag range"),
    }
}

/// A posted send and the buffer it reads from.
struct PendingSend {
    request: Request<'static, [u8], StaticScope>,
    buffer: *mut [u8],
}

fn release(buffer: *mut [u8]) {
    // SAFETY: `buffer` comes from `Box::into_raw` in `send` and the only
    // borrow of it, held by the request, has completed.
    drop(unsafe { Box::from_raw(buffer) });
}

struct Shared {
    comm: SimpleCommunicator,
    context: i32,
    splits: Cell<u64>,
    pending: RefCell<Vec<PendingSend>>,
}

impl Shared {
    /// Release the buffers of every completed send.
    fn progress(&self) {
        let posted = std::mem::take(&mut *self.pending.borrow_mut());
        let mut still = Vec::with_capacity(posted.len());
        for PendingSend { request, buffer } in posted {
            match request.test() {
                Ok(_) => release(buffer),
                Err(request) => still.push(PendingSend { request, buffer }),
            }
        }
        self.pending.borrow_mut().extend(still);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for PendingSend { request, buffer } in self.pending.get_mut().drain(..) {
            request.wait();
            release(buffer);
        }
    }
}

/// Communicator over the ranks of an MPI communicator.
///
/// Clones share the underlying MPI communicator and its queue of posted
/// sends. The [`Universe`] it was built from must outlive it.
#[derive(Clone)]
pub struct MpiComm {
    shared: Rc<Shared>,
    rank: usize,
    size: usize,
}

impl MpiComm {
    /// Initialise MPI and wrap its world communicator. `None` if MPI was
    /// already initialised in this process.
    pub fn initialize() -> Option<(Universe, Self)> {
        let universe = mpi::initialize()?;
        let world = Self::world(&universe);
        Some((universe, world))
    }

    pub fn world(universe: &Universe) -> Self {
        Self::from_parts(universe.world(), WORLD_CONTEXT)
    }

    fn from_parts(comm: SimpleCommunicator, context: i32) -> Self {
        let rank = comm.rank() as usize;
        let size = comm.size() as usize;
        tracing::debug!(context, rank, size, "MPI communicator ready");
        Self {
            shared: Rc::new(Shared {
                comm,
                context,
                splits: Cell::new(0),
                pending: RefCell::new(Vec::new()),
            }),
            rank,
            size,
        }
    }

    /// Sends still in flight.
    pub fn pending_sends(&self) -> usize {
        self.shared.progress();
        self.shared.pending.borrow().len()
    }
}

impl fmt::Debug for MpiComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpiComm")
            .field("context", &self.shared.context)
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn context(&self) -> i32 {
        self.shared.context
    }

    fn send<T: Payload>(&self, dest: usize, tag: Tag, data: Vec<T>) {
        let bytes = bincode::serialize(&data)
            .unwrap_or_else(|e| panic!("failed to encode message for rank {dest} with tag {tag:#x}: {e}"));
        let buffer = Box::into_raw(bytes.into_boxed_slice());
        // SAFETY: the allocation is freed only by `release`, after the
        // request reading from it has completed.
        let view: &'static [u8] = unsafe { &*buffer };
        let request = self
            .shared
            .comm
            .process_at_rank(dest as i32)
            .immediate_send_with_tag(StaticScope, view, mpi_tag(tag));
        self.shared.pending.borrow_mut().push(PendingSend { request, buffer });
    }

    fn recv<T: Payload>(&self, source: usize, tag: Tag) -> Vec<T> {
        self.shared.progress();
        let (bytes, _status) = self
            .shared
            .comm
            .process_at_rank(source as i32)
            .receive_vec_with_tag::<u8>(mpi_tag(tag));
        bincode::deserialize(&bytes)
            .unwrap_or_else(|e| panic!("message from rank {source} with tag {tag:#x} does not decode: {e}"))
    }

    fn split(&self, members: &[usize]) -> Option<Self> {
        // every member calls split in the same order, so the sequence
        // number and therefore the derived context agree across ranks
        let seq = self.shared.splits.get();
        self.shared.splits.set(seq + 1);
        let mut hasher = DefaultHasher::new();
        (self.shared.context, seq, members).hash(&mut hasher);
        let context = (hasher.finish() & 0x3FFF_FFFF) as i32 + 1;

        let position = members.iter().position(|&m| m == self.rank);
        let color = match position {
            Some(_) => Color::with_value(0),
            None => Color::undefined(),
        };
        let key = position.unwrap_or(0) as i32;
        let sub = self.shared.comm.split_by_color_with_key(color, key)?;
        Some(Self::from_parts(sub, context))
    }

    fn barrier(&self) {
        self.shared.progress();
        self.shared.comm.barrier();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_map_into_mpi_range() {
        assert_eq!(mpi_tag(1), 1);
        assert_eq!(mpi_tag(0xFFFF_FF01), 32_513);
        assert_eq!(mpi_tag(0xFFFF_FFFF), 32_767);
    }

    #[test]
    #[should_panic(expected = "does not fit the MPI tag range")]
    fn test_oversized_user_tag_panics() {
        mpi_tag(40_000);
    }
}
