//! Size-1 communicator for the serial pipeline and unit tests.

use crate::comm::Communicator;

/// Single-process group: rank 0 of 1, trivial collectives, no transport.
#[derive(Clone, Debug, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: u16, _len: usize) {}
}
