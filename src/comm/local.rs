//! In-process communicator backed by a global mailbox.
//!
//! Ranks are plain values handed to threads; messages travel through a
//! process-wide table of condvar-guarded FIFO slots keyed by
//! `(world, src, dst, tag)`. Each [`ThreadComm::split`] call allocates a
//! fresh world id so concurrently running groups (e.g. parallel test
//! binaries' threads) never see each other's traffic.

use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::comm::{Communicator, Wait};

type Key = (u64, usize, usize, u16); // (world, src, dst, tag)

#[derive(Default)]
struct Slot {
    q: VecDeque<Vec<u8>>,
}

static MAILBOX: Lazy<Mutex<HashMap<Key, Arc<(Mutex<Slot>, Condvar)>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static NEXT_WORLD: AtomicU64 = AtomicU64::new(1);

fn mailbox_entry(key: Key) -> Arc<(Mutex<Slot>, Condvar)> {
    let mut g = MAILBOX.lock().expect("mailbox poisoned");
    g.entry(key)
        .or_insert_with(|| Arc::new((Mutex::new(Slot::default()), Condvar::new())))
        .clone()
}

pub struct LocalSendHandle;

impl Wait for LocalSendHandle {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

pub struct LocalRecvHandle {
    cell: Arc<(Mutex<Slot>, Condvar)>,
    want_len: usize,
}

impl Wait for LocalRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let (lock, cv) = &*self.cell;
        let mut slot = lock.lock().expect("slot poisoned");
        while slot.q.is_empty() {
            slot = cv.wait(slot).expect("condvar poisoned");
        }
        let mut msg = slot.q.pop_front().expect("queue non-empty");
        msg.truncate(self.want_len.min(msg.len()));
        Some(msg)
    }
}

/// One rank of an in-process group.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    world: u64,
    rank: usize,
    size: usize,
    barrier: Arc<EpochBarrier>,
}

impl ThreadComm {
    /// Create a fresh group of `size` ranks sharing one world id.
    pub fn split(size: usize) -> Vec<ThreadComm> {
        assert!(size > 0, "group size must be at least 1");
        let world = NEXT_WORLD.fetch_add(1, Ordering::Relaxed);
        let barrier = Arc::new(EpochBarrier::new(size));
        (0..size)
            .map(|rank| ThreadComm {
                world,
                rank,
                size,
                barrier: barrier.clone(),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    type SendHandle = LocalSendHandle;
    type RecvHandle = LocalRecvHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let entry = mailbox_entry((self.world, self.rank, peer, tag));
        let (lock, cv) = &*entry;
        {
            let mut slot = lock.lock().expect("slot poisoned");
            slot.q.push_back(buf.to_vec());
        }
        cv.notify_all();
        LocalSendHandle
    }

    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle {
        LocalRecvHandle {
            cell: mailbox_entry((self.world, peer, self.rank, tag)),
            want_len: len,
        }
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

/// Reusable counting barrier; each full arrival flips the epoch.
#[derive(Debug)]
struct EpochBarrier {
    state: Mutex<(usize, usize)>, // (arrived, epoch)
    cv: Condvar,
    size: usize,
}

impl EpochBarrier {
    fn new(size: usize) -> Self {
        Self {
            state: Mutex::new((0, 0)),
            cv: Condvar::new(),
            size,
        }
    }

    fn wait(&self) {
        let mut st = self.state.lock().expect("barrier poisoned");
        let epoch = st.1;
        st.0 += 1;
        if st.0 == self.size {
            st.0 = 0;
            st.1 += 1;
            self.cv.notify_all();
        } else {
            while st.1 == epoch {
                st = self.cv.wait(st).expect("barrier condvar poisoned");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let comms = ThreadComm::split(2);
        let msg = b"hello";
        let _ = comms[0].isend(1, 0x10, msg);
        let got = comms[1].irecv(0, 0x10, msg.len()).wait().unwrap();
        assert_eq!(&got, msg);
    }

    #[test]
    fn fifo_order() {
        let comms = ThreadComm::split(2);
        for i in 0..10u8 {
            let _ = comms[0].isend(1, 0x11, &[i]);
        }
        let mut out = Vec::new();
        for _ in 0..10 {
            out.push(comms[1].irecv(0, 0x11, 1).wait().unwrap()[0]);
        }
        assert_eq!(out, (0u8..10).collect::<Vec<_>>());
    }

    #[test]
    fn worlds_are_isolated() {
        let a = ThreadComm::split(2);
        let b = ThreadComm::split(2);
        let _ = a[0].isend(1, 0x12, b"from-a");
        let _ = b[0].isend(1, 0x12, b"from-b");
        let got = b[1].irecv(0, 0x12, 6).wait().unwrap();
        assert_eq!(&got, b"from-b");
    }

    #[test]
    fn gather_across_threads() {
        let comms = ThreadComm::split(3);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                std::thread::spawn(move || {
                    let all = c.all_gather_u64(10 + c.rank() as u64);
                    assert_eq!(all, vec![10, 11, 12]);
                    c.all_reduce_sum(1)
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 3);
        }
    }
}
