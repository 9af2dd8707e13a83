//! Receive loop of a process.
use crate::config::Channel;
use crate::error::Result;
use crate::net::Transport;
use crate::node::{Action, Receiver};
use crate::paxos::{Message, Proposal};
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{self, Instant};

/// Drives a node from the datagrams of its channel. The node's timeout is
/// fired whenever its deadline passes without a datagram arriving. Decided
/// values are handed to `report`.
///
/// Returns only when the transport fails.
pub async fn serve<T, R, F>(transport: &mut T, node: &mut R, mut report: F) -> Result<()>
where
    T: Transport,
    R: Receiver,
    F: FnMut(Bytes),
{
    loop {
        let datagram = match node.deadline() {
            Some(deadline) => {
                match time::timeout_at(Instant::from_std(deadline), transport.recv()).await {
                    Ok(res) => Some(res?),
                    Err(_) => None,
                }
            }
            None => Some(transport.recv().await?),
        };

        let actions = match datagram {
            Some(datagram) => match Message::decode(&datagram) {
                Ok(msg) => {
                    trace!("Received {:?}", msg);
                    node.receive(msg)
                }
                Err(e) => {
                    warn!("Dropping datagram of {} bytes: {}", datagram.len(), e);
                    continue;
                }
            },
            None => node.timeout(),
        };

        execute(transport, actions, &mut report).await;
    }
}

async fn execute<T, F>(transport: &mut T, actions: Vec<Action>, report: &mut F)
where
    T: Transport,
    F: FnMut(Bytes),
{
    for action in actions {
        match action {
            Action::Send(channel, msg) => {
                let payload = match msg.encode() {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!("Unable to encode {:?}: {}", msg.kind(), e);
                        continue;
                    }
                };
                // lost datagrams are recovered by retries
                if let Err(e) = transport.send(channel, payload).await {
                    warn!("Unable to send to {}: {}", channel, e);
                }
            }
            Action::Report(value) => report(value),
        }
    }
}

/// Publishes every non-empty line as a proposal. Lines too long for a
/// datagram are skipped with a warning.
pub async fn run_client<T, L>(transport: &mut T, input: L) -> Result<()>
where
    T: Transport,
    L: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let value = line.trim();
        if value.is_empty() {
            continue;
        }

        let msg = Message::from(Proposal(Bytes::copy_from_slice(value.as_bytes())));
        let payload = match msg.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Skipping a line of {} bytes: {}", value.len(), e);
                continue;
            }
        };
        info!("sending {}", value);
        transport.send(Channel::Proposers, payload).await?;
    }
    info!("done");
    Ok(())
}
