//! Datagram transport of the channels.
use crate::codec::MAX_DATAGRAM_SIZE;
use crate::config::{Channel, Configuration};
use bytes::{Bytes, BytesMut};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;

/// Publishes datagrams on channels and receives the datagrams published on
/// the channel of the local process.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Publish a datagram to every subscriber of a channel
    async fn send(&mut self, channel: Channel, payload: Bytes) -> io::Result<()>;

    /// Wait for the next datagram on the subscribed channel
    async fn recv(&mut self) -> io::Result<Bytes>;
}

/// UDP transport. Channels configured with a multicast group are joined,
/// so several processes of the same role on one host share the port.
pub struct UdpTransport {
    config: Configuration,
    sender: UdpSocket,
    receiver: Option<UdpSocket>,
    buf: BytesMut,
}

impl UdpTransport {
    /// Creates the transport of a process subscribed to `channel`. Processes
    /// that only publish (clients) pass `None`.
    pub fn new(config: Configuration, channel: Option<Channel>) -> io::Result<UdpTransport> {
        let sender = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        sender.set_multicast_loop_v4(true)?;
        sender.set_nonblocking(true)?;
        let sender = UdpSocket::from_std(sender)?;

        let receiver = match channel {
            Some(channel) => Some(subscribe(config.address(channel))?),
            None => None,
        };

        Ok(UdpTransport {
            config,
            sender,
            receiver,
            buf: BytesMut::zeroed(MAX_DATAGRAM_SIZE),
        })
    }
}

fn subscribe(addr: SocketAddr) -> io::Result<UdpSocket> {
    let group = match addr {
        SocketAddr::V4(v4) => *v4.ip(),
        SocketAddr::V6(_) => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "only IPv4 channels are supported",
            ))
        }
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    if group.is_multicast() {
        let bind = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, addr.port());
        socket.bind(&SockAddr::from(bind))?;
        socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
        debug!("Joined multicast group {}", addr);
    } else {
        socket.bind(&SockAddr::from(addr))?;
        debug!("Listening on {}", addr);
    }

    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

impl Transport for UdpTransport {
    async fn send(&mut self, channel: Channel, payload: Bytes) -> io::Result<()> {
        let addr = self.config.address(channel);
        trace!("Sending {} bytes to {} ({})", payload.len(), channel, addr);
        self.sender.send_to(&payload, addr).await?;
        Ok(())
    }

    async fn recv(&mut self) -> io::Result<Bytes> {
        let receiver = match self.receiver {
            Some(ref receiver) => receiver,
            None => return std::future::pending().await,
        };

        let (len, from) = receiver.recv_from(&mut self.buf).await?;
        trace!("Received {} bytes from {}", len, from);
        Ok(Bytes::copy_from_slice(&self.buf[..len]))
    }
}
