use super::messages::*;
use super::{Ballot, QuorumSet};
use bytes::Bytes;
use std::collections::HashMap;

/// Tracking of the acceptances of a single ballot
#[derive(Debug)]
struct BallotStatus {
    /// Set of acceptors that have sent PHASE 2B for the ballot
    acceptors: QuorumSet,
    /// Value accepted in the ballot (the invariant is that all
    /// acceptors will send the same value for a given ballot)
    value: Bytes,
}

/// State machine for the learner
#[derive(Debug)]
enum LearnerState {
    /// The learner is waiting for PHASE 2B messages from the acceptors
    /// to meet quorum in any ballot
    AwaitQuorum {
        /// maps ballots to status (for quorum tracking). acceptors may
        /// accept in several ballots before one of them gathers a quorum
        ballots: HashMap<Ballot, BallotStatus>,
    },
    /// A final value has been chosen
    Final {
        /// Ballot that reached quorum, unknown when the decision came
        /// from a DECIDE message
        accepted: Option<Ballot>,
        /// Chosen value
        value: Bytes,
    },
}

/// A Paxos learner listens for PHASE 2B messages in order to determine
/// quorum for the final value. It may also take the word of a proposer
/// that sends a DECIDE message, which skips the quorum check and trusts
/// the proposer's own counting.
#[derive(Debug)]
pub struct Learner {
    /// state of the learner (AwaitQuorum or Final)
    state: LearnerState,
    /// Size of quorum
    quorum: usize,
    /// Whether DECIDE messages are taken at face value
    trust_decide: bool,
}

impl Learner {
    /// Creates a learner with the given quorum size.
    pub fn new(quorum: usize, trust_decide: bool) -> Learner {
        Learner {
            state: LearnerState::AwaitQuorum {
                ballots: HashMap::new(),
            },
            quorum,
            trust_decide,
        }
    }

    /// The decided value, if any
    pub fn decided(&self) -> Option<&Bytes> {
        match self.state {
            LearnerState::Final { ref value, .. } => Some(value),
            LearnerState::AwaitQuorum { .. } => None,
        }
    }

    /// Ballot that reached quorum, if known
    pub fn decided_ballot(&self) -> Option<Ballot> {
        match self.state {
            LearnerState::Final { accepted, .. } => accepted,
            LearnerState::AwaitQuorum { .. } => None,
        }
    }

    /// Handles PHASE 2B messages from acceptors. The value is returned only
    /// when the message completes the first quorum.
    pub fn receive_phase2b(&mut self, msg: Phase2B) -> Option<Bytes> {
        let Phase2B {
            acceptor,
            rnd,
            value,
        } = msg;

        let quorum = self.quorum;
        let resolved = match self.state {
            LearnerState::AwaitQuorum { ref mut ballots } => {
                let status = ballots.entry(rnd).or_insert_with(|| BallotStatus {
                    acceptors: QuorumSet::with_size(quorum),
                    value: value.clone(),
                });

                assert!(
                    status.value == value,
                    "Acceptor {} accepted a different value in {:?}",
                    acceptor,
                    rnd
                );

                if !status.acceptors.insert(acceptor) {
                    trace!("Ignoring repeated PHASE 2B from acceptor {}", acceptor);
                    return None;
                }
                trace!("Acceptor {} accepted {:?}", acceptor, rnd);

                if !status.acceptors.has_quorum() {
                    return None;
                }
                status.value.clone()
            }
            LearnerState::Final { ref value, .. } => {
                trace!("Already decided {:?}, ignoring PHASE 2B", value);
                return None;
            }
        };

        debug!("Quorum reached for Phase 2 {:?}", rnd);

        self.state = LearnerState::Final {
            accepted: Some(rnd),
            value: resolved.clone(),
        };
        Some(resolved)
    }

    /// Handles a DECIDE message from a proposer. Ignored unless the learner
    /// trusts proposers.
    pub fn receive_decide(&mut self, msg: Decide) -> Option<Bytes> {
        let Decide(value) = msg;

        if !self.trust_decide {
            trace!("Ignoring DECIDE, waiting for quorum of acceptors");
            return None;
        }

        if let LearnerState::Final { value: ref decided, .. } = self.state {
            if *decided != value {
                error!(
                    "DECIDE for {:?} contradicts decided value {:?}",
                    value, decided
                );
            }
            return None;
        }

        debug!("Decided by proposer");
        self.state = LearnerState::Final {
            accepted: None,
            value: value.clone(),
        };
        Some(value)
    }
}
