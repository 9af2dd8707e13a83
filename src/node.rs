//! Roles wired to the broadcast channels.
//!
//! A node wraps one of the Paxos roles, feeds it the messages that arrive on
//! the role's channel and turns its replies into [`Action`]s: messages to
//! publish on a channel, or a decided value to report. Nodes do not perform
//! any I/O themselves.
use crate::config::{Channel, Configuration};
use crate::paxos::*;
use crate::timer::RetryTimer;
use bytes::Bytes;
use std::time::Instant;

/// Effect requested by a node
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Action {
    /// Publish a message to every subscriber of a channel
    Send(Channel, Message),
    /// Report a decided value to the user
    Report(Bytes),
}

/// Receiver of Paxos messages.
pub trait Receiver {
    /// Receives a message and reacts accordingly
    fn receive(&mut self, message: Message) -> Vec<Action>;

    /// Time at which [`Receiver::timeout`] should be called, if any
    fn deadline(&self) -> Option<Instant> {
        None
    }

    /// Invoked once the deadline has passed
    fn timeout(&mut self) -> Vec<Action> {
        Vec::new()
    }
}

/// Acceptor process
#[derive(Debug)]
pub struct AcceptorNode {
    acceptor: Acceptor,
}

impl AcceptorNode {
    pub fn new(id: NodeId) -> AcceptorNode {
        AcceptorNode {
            acceptor: Acceptor::new(id),
        }
    }

    pub fn acceptor(&self) -> &Acceptor {
        &self.acceptor
    }
}

impl Receiver for AcceptorNode {
    fn receive(&mut self, message: Message) -> Vec<Action> {
        match message {
            Message::Phase1A(msg) => self
                .acceptor
                .receive_phase1a(msg)
                .map(|promise| Action::Send(Channel::Proposers, promise.into()))
                .into_iter()
                .collect(),
            Message::Phase2A(msg) => match self.acceptor.receive_phase2a(msg) {
                // proposers count acceptances as well as the learners
                Some(accepted) => vec![
                    Action::Send(Channel::Learners, accepted.clone().into()),
                    Action::Send(Channel::Proposers, accepted.into()),
                ],
                None => Vec::new(),
            },
            msg => {
                debug!(
                    "Acceptor {} ignoring {:?} message",
                    self.acceptor.id(),
                    msg.kind()
                );
                Vec::new()
            }
        }
    }
}

/// Proposer process. An attempt that does not gather a quorum before its
/// deadline is abandoned and restarted with a higher ballot.
#[derive(Debug)]
pub struct ProposerNode {
    id: NodeId,
    proposer: Proposer,
    timer: RetryTimer,
}

impl ProposerNode {
    pub fn new(id: NodeId, config: &Configuration) -> ProposerNode {
        ProposerNode {
            id,
            proposer: Proposer::new(id, config.quorum_size()),
            timer: RetryTimer::new(config.phase_timeout(), config.max_backoff()),
        }
    }

    pub fn proposer(&self) -> &Proposer {
        &self.proposer
    }

    fn prepare(&self, prepare: Phase1A) -> Vec<Action> {
        vec![Action::Send(Channel::Acceptors, prepare.into())]
    }
}

impl Receiver for ProposerNode {
    fn receive(&mut self, message: Message) -> Vec<Action> {
        match message {
            Message::Proposal(Proposal(value)) => {
                // once decided, a proposal confirms the decision for learners
                // that missed it
                match self.proposer.propose_value(value) {
                    Some(prepare) => {
                        self.timer.schedule(Instant::now());
                        self.prepare(prepare)
                    }
                    None => Vec::new(),
                }
            }
            Message::Phase1B(msg) => match self.proposer.receive_phase1b(msg) {
                Some(accept) => {
                    // a fresh wait for Phase 2
                    self.timer.schedule(Instant::now());
                    vec![Action::Send(Channel::Acceptors, accept.into())]
                }
                None => Vec::new(),
            },
            Message::Phase2B(msg) => {
                let confirming = self.proposer.decided().is_some();
                match self.proposer.receive_phase2b(msg) {
                    Some(decide) if confirming => {
                        self.timer.reset();
                        debug!("Proposer {}: decision confirmed", self.id);
                        vec![Action::Send(Channel::Learners, decide.into())]
                    }
                    Some(decide) => {
                        self.timer.reset();
                        info!("Proposer {}: value {:?} accepted by quorum", self.id, decide.0);
                        vec![
                            Action::Send(Channel::Learners, decide.clone().into()),
                            Action::Report(decide.0),
                        ]
                    }
                    None => Vec::new(),
                }
            }
            msg => {
                debug!("Proposer {} ignoring {:?} message", self.id, msg.kind());
                Vec::new()
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        match self.proposer.status() {
            ProposerStatus::Preparing | ProposerStatus::Proposing => self.timer.deadline(),
            _ => None,
        }
    }

    fn timeout(&mut self) -> Vec<Action> {
        match self.proposer.retry() {
            Some(prepare) => {
                self.timer.schedule_retry(Instant::now());
                self.prepare(prepare)
            }
            None => {
                self.timer.reset();
                Vec::new()
            }
        }
    }
}

/// Learner process
#[derive(Debug)]
pub struct LearnerNode {
    id: NodeId,
    learner: Learner,
}

impl LearnerNode {
    pub fn new(id: NodeId, config: &Configuration) -> LearnerNode {
        LearnerNode {
            id,
            learner: Learner::new(config.quorum_size(), config.trust_decide()),
        }
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }
}

impl Receiver for LearnerNode {
    fn receive(&mut self, message: Message) -> Vec<Action> {
        let learned = match message {
            Message::Phase2B(msg) => self.learner.receive_phase2b(msg),
            Message::Decide(msg) => self.learner.receive_decide(msg),
            msg => {
                debug!("Learner {} ignoring {:?} message", self.id, msg.kind());
                None
            }
        };

        learned
            .map(|value| {
                info!("Learner {} learned value {:?}", self.id, value);
                Action::Report(value)
            })
            .into_iter()
            .collect()
    }
}
