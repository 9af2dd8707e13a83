//! Single-decree Paxos over broadcast channels.
//!
//! Processes play one of three roles. Proposers drive consensus on a value
//! supplied by a client, acceptors vote on the proposers' ballots and
//! learners find out which value was chosen. Every role listens on its own
//! channel (`acceptors`, `proposers` or `learners`), a UDP multicast group
//! shared by all processes of the role.
//!
//! The roles themselves are I/O-free state machines (see [`Acceptor`],
//! [`Proposer`] and [`Learner`]); the [`node`] layer routes their messages to
//! channels and the [`server`] loop moves datagrams through a [`Transport`].
//!
//! # Examples
//!
//! ```rust,no_run
//! # use synod::{AcceptorNode, Configuration, UdpTransport, Channel};
//! # async fn run() -> synod::Result<()> {
//! let config = Configuration::from_path("paxos.conf")?;
//! let mut transport = UdpTransport::new(config, Some(Channel::Acceptors))?;
//! let mut node = AcceptorNode::new(1);
//! synod::server::serve(&mut transport, &mut node, |_| {}).await
//! # }
//! ```
#[cfg(test)]
#[macro_use]
extern crate assert_matches;
#[macro_use]
extern crate log;

pub mod codec;
pub mod config;
mod error;
pub mod net;
pub mod node;
mod paxos;
pub mod server;
mod timer;

pub use codec::CodecError;
pub use config::{Channel, ConfigError, Configuration, Identity, Role};
pub use error::{Error, Result};
pub use net::{Transport, UdpTransport};
pub use node::{AcceptorNode, Action, LearnerNode, ProposerNode, Receiver};
pub use paxos::*;
pub use timer::RetryTimer;
