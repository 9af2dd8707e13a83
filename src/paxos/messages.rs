use super::{Ballot, NodeId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// `PHASE 1A` (prepare) message from a proposer sent to acceptors to
/// receive agreement to not accept ballots of lower value.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Phase1A(pub Ballot);

/// Pair containing the ballot an acceptor last accepted and the
/// bytes of the accepted value.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct PromiseValue(pub Ballot, pub Bytes);

/// `PHASE 1B` (promise) is sent from acceptors in reply to a `PHASE 1A`.
/// The ballot denotes that the acceptor will not accept ballots less
/// than the promised ballot.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Phase1B {
    /// Acceptor that made the promise
    pub acceptor: NodeId,
    /// Promised ballot, equal to the ballot of the `PHASE 1A`
    pub rnd: Ballot,
    /// Last accepted ballot/value pair of the acceptor, if any
    pub accepted: Option<PromiseValue>,
}

/// `PHASE 2A` (accept) message from a proposer sent to acceptors to
/// accept a value. It is predicated on the proposer receiving quorum
/// from Phase 1.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Phase2A(pub Ballot, pub Bytes);

/// `PHASE 2B` (accepted) is broadcast from acceptors denoting acceptance
/// of a value.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Phase2B {
    /// Acceptor that accepted the value
    pub acceptor: NodeId,
    /// Ballot the value was accepted in
    pub rnd: Ballot,
    /// Accepted value
    pub value: Bytes,
}

/// `DECIDE` is sent by a proposer once a quorum of acceptors accepted
/// its value.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Decide(pub Bytes);

/// Candidate value submitted by a client to the proposers.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Proposal(pub Bytes);

/// Any message exchanged on the broadcast channels.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Message {
    Phase1A(Phase1A),
    Phase1B(Phase1B),
    Phase2A(Phase2A),
    Phase2B(Phase2B),
    Decide(Decide),
    Proposal(Proposal),
}

macro_rules! message_from {
    ($($kind:ident),*) => {
        $(
            impl From<$kind> for Message {
                fn from(msg: $kind) -> Message {
                    Message::$kind(msg)
                }
            }
        )*
    };
}

message_from!(Phase1A, Phase1B, Phase2A, Phase2B, Decide, Proposal);
