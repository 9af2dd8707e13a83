//! Single-decree Paxos roles.
//!
//! Each role is a plain state machine: messages go in, messages (or a
//! decided value) come out. None of the roles perform I/O or hold clocks.
mod acceptor;
mod learner;
mod messages;
mod proposer;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub use self::acceptor::Acceptor;
pub use self::learner::Learner;
pub use self::messages::*;
pub use self::proposer::{Proposer, ProposerStatus};

/// A `NodeId` is a unique value that identifies a process within its role.
pub type NodeId = u32;

/// Ballot numbering is an increasing number in order to order proposals
/// across multiple proposers. The proposer identifier is part of the ballot,
/// so two proposers can never pick the same ballot.
#[derive(Serialize, Deserialize, PartialEq, Hash, Eq, Clone, Copy, Debug)]
pub struct Ballot(pub u32, pub NodeId);

impl Ballot {
    /// Generates a ballot that is greater than `self` for a given node.
    /// Returns `None` once the ballot numerals are exhausted.
    pub fn higher_for(&self, n: NodeId) -> Option<Ballot> {
        // slight optimization to not increase ballot numeral unnecessarily
        if self.1 < n {
            Some(Ballot(self.0, n))
        } else {
            self.0.checked_add(1).map(|numeral| Ballot(numeral, n))
        }
    }
}

impl PartialOrd for Ballot {
    fn partial_cmp(&self, other: &Ballot) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ballot {
    fn cmp(&self, other: &Ballot) -> Ordering {
        match self.0.cmp(&other.0) {
            Ordering::Equal => self.1.cmp(&other.1),
            o => o,
        }
    }
}

/// Number of acceptors that constitutes a majority of `acceptors`.
pub fn quorum_size(acceptors: usize) -> usize {
    acceptors / 2 + 1
}

/// `QuorumSet` tracks nodes that have sent certain messages and will
/// detect when quorum is reached. Duplicates are treated as a single
/// message to determine quorum.
///
/// Once the `QuorumSet` has quorum, additional nodes will not be added.
/// The purpose of the datastructure is to track _when_ quorum is
/// reached rather than being a general purpose set.
#[derive(Clone, Debug)]
pub(crate) struct QuorumSet {
    // Slots are kept sorted with the empty slots at the end, so
    // quorum is reached exactly when the last slot is filled.
    values: Box<[Option<NodeId>]>,
}

impl QuorumSet {
    /// Creates a QuorumSet with a given size for quorum.
    pub fn with_size(size: usize) -> QuorumSet {
        assert!(size > 0);
        QuorumSet {
            values: vec![None; size].into_boxed_slice(),
        }
    }

    /// Flag indicating whether quorum has been reached.
    pub fn has_quorum(&self) -> bool {
        let s = &self.values;
        s[s.len() - 1].is_some()
    }

    #[inline]
    fn binary_search(&self, n: NodeId) -> Result<usize, usize> {
        self.values.binary_search_by(move |v| match *v {
            Some(v) => v.cmp(&n),
            None => Ordering::Greater,
        })
    }

    /// Inserts a node into the set. Returns `false` if the node was
    /// already present or quorum was already reached.
    pub fn insert(&mut self, n: NodeId) -> bool {
        if self.has_quorum() {
            return false;
        }

        match self.binary_search(n) {
            Ok(_) => false,
            Err(loc) => {
                // shift the occupants right to open a hole at `loc`
                if self.values[loc].is_some() {
                    let len = self.values.len();
                    for i in (loc..len - 1).rev() {
                        self.values.swap(i, i + 1);
                    }
                }

                self.values[loc] = Some(n);
                true
            }
        }
    }

    /// Flag indicating whether the set contains a given node
    pub fn contains(&self, n: NodeId) -> bool {
        self.binary_search(n).is_ok()
    }

    /// Number of nodes in the set
    pub fn len(&self) -> usize {
        self.values.iter().take_while(|v| v.is_some()).count()
    }

    /// Flag indicating whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.values[0].is_none()
    }
}
