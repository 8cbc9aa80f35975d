//! Bucketed all-to-some exchange.
//!
//! Values are pushed into one bucket per destination rank, every
//! non-empty bucket is sent as a single message, then each expected
//! message is received and checked against its announced size.

use super::{Communicator, Payload, Tag};

pub struct Exchange<T> {
    me: usize,
    outgoing: Vec<Vec<T>>,
    expected: Vec<usize>,
}

impl<T: Payload> Exchange<T> {
    pub fn new<C: Communicator>(comm: &C) -> Self {
        let size = comm.size();
        Self {
            me: comm.rank(),
            outgoing: (0..size).map(|_| Vec::new()).collect(),
            expected: vec![0; size],
        }
    }

    /// Append `value` to the message for `peer`. Values addressed to the
    /// calling rank stay local.
    #[inline]
    pub fn push(&mut self, peer: usize, value: T) {
        self.outgoing[peer].push(value);
    }

    /// Announce `count` more values from `peer`.
    #[inline]
    pub fn expect(&mut self, peer: usize, count: usize) {
        self.expected[peer] += count;
    }

    /// Post all sends, then receive all expected messages.
    ///
    /// # Panics
    ///
    /// If a message (or the local bucket) does not carry exactly the
    /// announced number of values.
    pub fn run<C: Communicator>(self, comm: &C, tag: Tag) -> Received<T> {
        let Self {
            me,
            mut outgoing,
            expected,
        } = self;
        let mut local = Some(std::mem::take(&mut outgoing[me]));

        let mut sent = 0usize;
        let mut peers = 0usize;
        for (peer, buf) in outgoing.into_iter().enumerate() {
            if peer != me && !buf.is_empty() {
                sent += buf.len();
                peers += 1;
                comm.send(peer, tag, buf);
            }
        }

        let incoming = expected
            .iter()
            .enumerate()
            .map(|(peer, &count)| {
                let buf = if peer == me {
                    local.take().unwrap_or_default()
                } else if count == 0 {
                    Vec::new()
                } else {
                    comm.recv(peer, tag)
                };
                assert_eq!(
                    buf.len(),
                    count,
                    "message size mismatch: expected {count} values from rank {peer}, got {}",
                    buf.len()
                );
                buf.into_iter()
            })
            .collect();

        tracing::debug!(
            tag,
            rank = me,
            peers,
            sent,
            received = expected.iter().sum::<usize>(),
            "exchange complete"
        );
        Received { incoming }
    }
}

/// Messages delivered by [`Exchange::run`], consumed in send order.
pub struct Received<T> {
    incoming: Vec<std::vec::IntoIter<T>>,
}

impl<T> Received<T> {
    #[inline]
    pub fn next_from(&mut self, peer: usize) -> T {
        match self.incoming[peer].next() {
            Some(v) => v,
            None => panic!("message from rank {peer} exhausted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::ThreadUniverse;

    #[test]
    fn test_ring_exchange() {
        let out = ThreadUniverse::run(3, |comm| {
            let me = comm.rank();
            let next = (me + 1) % 3;
            let prev = (me + 2) % 3;
            let mut ex = Exchange::new(&comm);
            ex.push(next, me * 10);
            ex.push(next, me * 10 + 1);
            ex.push(me, 99);
            ex.expect(prev, 2);
            ex.expect(me, 1);
            let mut rx = ex.run(&comm, 11);
            (rx.next_from(prev), rx.next_from(prev), rx.next_from(me))
        });
        assert_eq!(out, vec![(20, 21, 99), (0, 1, 99), (10, 11, 99)]);
    }

    #[test]
    #[should_panic(expected = "message size mismatch")]
    fn test_size_mismatch_panics() {
        ThreadUniverse::run(2, |comm| {
            let mut ex = Exchange::new(&comm);
            let other = 1 - comm.rank();
            ex.push(other, 1.0f64);
            ex.expect(other, 2);
            ex.run(&comm, 12);
        });
    }
}
