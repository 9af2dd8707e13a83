use super::messages::*;
use super::{Ballot, NodeId};

/// Encoding of the Acceptor role. The acceptor's memory is volatile; a
/// restarted acceptor starts over without promises.
#[derive(Debug)]
pub struct Acceptor {
    /// Identifier sent along with replies so that proposers and learners
    /// can tell acceptors apart
    id: NodeId,
    /// last promised ballot
    promised: Option<Ballot>,
    /// last accepted ballot/value pair
    accepted: Option<PromiseValue>,
}

impl Acceptor {
    /// New acceptor that has neither promised nor accepted anything.
    pub fn new(id: NodeId) -> Acceptor {
        Acceptor {
            id,
            promised: None,
            accepted: None,
        }
    }

    /// Identifier of the acceptor
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Ballot of the last promise
    pub fn promised(&self) -> Option<Ballot> {
        self.promised
    }

    /// Last accepted ballot and value
    pub fn accepted(&self) -> Option<&PromiseValue> {
        self.accepted.as_ref()
    }

    /// Handler for a PHASE 1A message sent from a proposer. A promise is
    /// only made for ballots strictly higher than the last promise, otherwise
    /// the message is ignored and the proposer will eventually time out.
    pub fn receive_phase1a(&mut self, msg: Phase1A) -> Option<Phase1B> {
        let Phase1A(proposal) = msg;

        if self.promised.filter(|b| *b >= proposal).is_some() {
            debug!(
                "Acceptor {} ignoring PHASE 1A for {:?}, promised {:?}",
                self.id, proposal, self.promised
            );
            return None;
        }

        debug!("Acceptor {} promising {:?}", self.id, proposal);
        self.promised = Some(proposal);

        Some(Phase1B {
            acceptor: self.id,
            rnd: proposal,
            accepted: self.accepted.clone(),
        })
    }

    /// Handler for a PHASE 2A message, which is sent from a proposer when a
    /// quorum for Phase 1 has been made. Ballots below the last promise are
    /// ignored.
    pub fn receive_phase2a(&mut self, msg: Phase2A) -> Option<Phase2B> {
        let Phase2A(proposal, value) = msg;

        if self.promised.filter(|b| *b > proposal).is_some() {
            debug!(
                "Acceptor {} ignoring PHASE 2A for {:?}, promised {:?}",
                self.id, proposal, self.promised
            );
            return None;
        }

        match self.accepted {
            Some(PromiseValue(bal, ref v)) if bal == proposal && *v == value => {
                trace!("Acceptor {} already accepted {:?}", self.id, proposal);
                return None;
            }
            Some(PromiseValue(bal, _)) if bal == proposal => {
                warn!(
                    "Acceptor {} received a second value for {:?}",
                    self.id, proposal
                );
            }
            _ => {}
        }

        debug!("Acceptor {} accepting {:?}", self.id, proposal);

        // an acceptor may miss the PHASE 1A and still take part in the
        // Phase 2 quorum, so the promise follows the accepted ballot
        self.promised = Some(proposal);
        self.accepted = Some(PromiseValue(proposal, value.clone()));

        Some(Phase2B {
            acceptor: self.id,
            rnd: proposal,
            value,
        })
    }
}
