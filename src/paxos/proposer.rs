use super::messages::*;
use super::{Ballot, NodeId, QuorumSet};
use bytes::Bytes;
use std::mem;

/// Encoding of the Proposer role's state machine
#[derive(Debug)]
enum ProposerState {
    /// No candidate value has been received yet
    Idle,
    /// Proposer has sent out Phase 1a messages to acceptors.
    Preparing {
        /// The ballot sent out with the PHASE 1A message
        proposal: Ballot,
        /// Tracking the PHASE 1B messages received by acceptors.
        promises: QuorumSet,
        /// Accepted value from the promise with the highest ballot seen.
        highest_accepted: Option<PromiseValue>,
    },
    /// Proposer has received quorum of promises and sent PHASE 2A messages.
    Proposing {
        /// The ballot sent with the PHASE 2A message
        proposal: Ballot,
        /// Value sent with the PHASE 2A message
        value: Bytes,
        /// Tracking of the PHASE 2B messages received by acceptors.
        accepts: QuorumSet,
    },
    /// A quorum of acceptors accepted the value.
    Decided {
        /// Ballot the value was chosen in
        proposal: Ballot,
        /// Chosen value
        value: Bytes,
    },
}

/// Coarse view of the proposer's state
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProposerStatus {
    Idle,
    Preparing,
    Proposing,
    Decided,
}

/// The proposer coordinates a single consensus attempt. It runs Phase 1
/// with a ballot higher than any it has observed, and once a quorum of
/// acceptors promised it moves to Phase 2 with the value of the highest
/// accepted ballot reported in those promises (key to the Paxos algorithm),
/// falling back to the client's candidate.
#[derive(Debug)]
pub struct Proposer {
    /// State of the proposer state machine
    state: ProposerState,
    /// Value supplied by the client. Retries start over from this value.
    candidate: Option<Bytes>,
    /// First value decided. It outlives the `Decided` state while the
    /// decision is being confirmed again.
    chosen: Option<Bytes>,
    /// Highest seen ballot thus far from any peer
    highest: Option<Ballot>,
    /// Node ID of the current node (used to construct ballots)
    current: NodeId,
    /// Number of acceptors for quorum
    quorum: usize,
}

impl Proposer {
    /// Creates new proposer state with the node identifier and the quorum size
    pub fn new(node: NodeId, quorum: usize) -> Proposer {
        Proposer {
            state: ProposerState::Idle,
            candidate: None,
            chosen: None,
            highest: None,
            current: node,
            quorum,
        }
    }

    /// Returns the proposer's status
    pub fn status(&self) -> ProposerStatus {
        match self.state {
            ProposerState::Idle => ProposerStatus::Idle,
            ProposerState::Preparing { .. } => ProposerStatus::Preparing,
            ProposerState::Proposing { .. } => ProposerStatus::Proposing,
            ProposerState::Decided { .. } => ProposerStatus::Decided,
        }
    }

    /// Ballot of the current attempt
    pub fn ballot(&self) -> Option<Ballot> {
        match self.state {
            ProposerState::Idle => None,
            ProposerState::Preparing { proposal, .. }
            | ProposerState::Proposing { proposal, .. }
            | ProposerState::Decided { proposal, .. } => Some(proposal),
        }
    }

    /// The chosen value, once decided
    pub fn decided(&self) -> Option<&Bytes> {
        self.chosen.as_ref()
    }

    /// Highest ballot that the proposer has seen
    pub fn highest_observed_ballot(&self) -> Option<Ballot> {
        self.highest
    }

    /// Overrides the highest seen value, if ballot is the highest seen
    pub fn observe_ballot(&mut self, ballot: Ballot) {
        if self.highest < Some(ballot) {
            trace!("Proposer observed higher {:?}", ballot);
            self.highest = Some(ballot);
        }
    }

    /// Receives a candidate value from a client. Phase 1 is started if the
    /// proposer is idle; otherwise the attempt in flight keeps its value.
    ///
    /// Once decided, a new proposal runs the protocol again with a higher
    /// ballot. The promises recover the chosen value, so acceptors accept
    /// it once more and learners that missed the first acceptances can
    /// count the new ones.
    pub fn propose_value(&mut self, v: Bytes) -> Option<Phase1A> {
        match self.state {
            ProposerState::Idle => {
                self.candidate = Some(v);
                self.prepare()
            }
            ProposerState::Decided { proposal, .. } => {
                debug!(
                    "Proposer {} confirming the value decided in {:?}",
                    self.current, proposal
                );
                self.candidate = self.chosen.clone();
                self.prepare()
            }
            _ => {
                debug!(
                    "Proposer {} ignoring proposal while {:?}",
                    self.current,
                    self.status()
                );
                None
            }
        }
    }

    /// Abandons the attempt in flight and restarts Phase 1 with a higher
    /// ballot. Nothing happens once decided or while idle.
    pub fn retry(&mut self) -> Option<Phase1A> {
        match self.state {
            ProposerState::Preparing { proposal, .. } | ProposerState::Proposing { proposal, .. } => {
                info!(
                    "Proposer {} abandoning {:?} without quorum",
                    self.current, proposal
                );
                self.prepare()
            }
            _ => None,
        }
    }

    /// Prepare sets state to preparing and begins to track promises.
    /// Nothing changes when no higher ballot is left.
    fn prepare(&mut self) -> Option<Phase1A> {
        let new_ballot = match self.highest {
            Some(highest) => match highest.higher_for(self.current) {
                Some(ballot) => ballot,
                None => {
                    error!(
                        "Proposer {} has no ballot above {:?}",
                        self.current, highest
                    );
                    return None;
                }
            },
            None => Ballot(1, self.current),
        };

        self.highest = Some(new_ballot);
        self.state = ProposerState::Preparing {
            proposal: new_ballot,
            promises: QuorumSet::with_size(self.quorum),
            highest_accepted: None,
        };

        debug!("Starting prepare with {:?}", new_ballot);

        Some(Phase1A(new_ballot))
    }

    /// Note a promise from an acceptor. A PHASE 2A message is returned if
    /// quorum is detected.
    pub fn receive_phase1b(&mut self, msg: Phase1B) -> Option<Phase2A> {
        let Phase1B {
            acceptor,
            rnd,
            accepted,
        } = msg;
        debug!("Received PHASE 1B for {:?} from acceptor {}", rnd, acceptor);

        self.observe_ballot(rnd);
        if let Some(PromiseValue(bal, _)) = accepted {
            self.observe_ballot(bal);
        }

        match self.state {
            // only allow matching proposals (we could have restarted Phase 1) and only
            // update when we see a new promise from a new acceptor
            ProposerState::Preparing {
                proposal,
                ref mut promises,
                ref mut highest_accepted,
            } if proposal == rnd && !promises.contains(acceptor) => {
                trace!("New promise from acceptor received");
                promises.insert(acceptor);

                if let Some(PromiseValue(bal, v)) = accepted {
                    match *highest_accepted {
                        Some(PromiseValue(highest, ref value)) if highest == bal => {
                            assert!(
                                *value == v,
                                "Acceptors reported different values accepted in {:?}",
                                bal
                            );
                        }
                        Some(PromiseValue(highest, _)) if highest > bal => {}
                        _ => {
                            trace!("Acceptor has the highest accepted value thus far");
                            *highest_accepted = Some(PromiseValue(bal, v));
                        }
                    }
                }

                if !promises.has_quorum() {
                    return None;
                }
            }
            _ => return None,
        }

        debug!("Quorum reached for Phase 1 of {:?}", rnd);

        let s = mem::replace(&mut self.state, ProposerState::Idle);
        match s {
            ProposerState::Preparing {
                proposal,
                highest_accepted,
                ..
            } => {
                // the value of the highest accepted ballot is the only safe
                // choice, the client's candidate is used when there is none
                let value = match (highest_accepted, self.candidate.clone()) {
                    (Some(PromiseValue(bal, v)), _) => {
                        debug!("Recovered value accepted in {:?}", bal);
                        v
                    }
                    (None, Some(v)) => v,
                    (None, None) => unreachable!("Preparing without a candidate value"),
                };

                self.state = ProposerState::Proposing {
                    proposal,
                    value: value.clone(),
                    accepts: QuorumSet::with_size(self.quorum),
                };

                Some(Phase2A(proposal, value))
            }
            _ => unreachable!("Already know its preparing"),
        }
    }

    /// Note an acceptance from an acceptor. A DECIDE message is returned
    /// the first time quorum is detected.
    pub fn receive_phase2b(&mut self, msg: Phase2B) -> Option<Decide> {
        let Phase2B {
            acceptor,
            rnd,
            value: accepted,
        } = msg;
        debug!("Received PHASE 2B for {:?} from acceptor {}", rnd, acceptor);

        self.observe_ballot(rnd);

        let value = match self.state {
            ProposerState::Proposing {
                proposal,
                ref value,
                ref mut accepts,
            } if proposal == rnd && !accepts.contains(acceptor) => {
                assert!(
                    *value == accepted,
                    "Acceptor {} accepted a different value in {:?}",
                    acceptor,
                    rnd
                );
                accepts.insert(acceptor);
                if !accepts.has_quorum() {
                    return None;
                }
                value.clone()
            }
            _ => return None,
        };

        debug!("Quorum reached for Phase 2 of {:?}", rnd);
        if let Some(ref chosen) = self.chosen {
            assert!(
                *chosen == value,
                "Quorum accepted a different value in {:?} after a decision",
                rnd
            );
        }
        self.chosen = Some(value.clone());
        self.state = ProposerState::Decided {
            proposal: rnd,
            value: value.clone(),
        };
        self.candidate = None;

        Some(Decide(value))
    }

    /// Number of distinct acceptors counted towards the current phase
    pub fn votes(&self) -> usize {
        match self.state {
            ProposerState::Preparing { ref promises, .. } => promises.len(),
            ProposerState::Proposing { ref accepts, .. } => accepts.len(),
            _ => 0,
        }
    }
}
