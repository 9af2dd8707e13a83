use crate::paxos::{self, NodeId};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default number of acceptors
pub const DEFAULT_ACCEPTORS: usize = 3;
/// Default time a proposer waits for a quorum before retrying
pub const DEFAULT_PHASE_TIMEOUT_MS: u64 = 500;
/// Default cap of the proposer's retry backoff
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5000;

/// Broadcast channel shared by all processes of a role.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Channel {
    Acceptors,
    Proposers,
    Learners,
}

impl Channel {
    /// All channels, in configuration file order
    pub const ALL: [Channel; 3] = [Channel::Acceptors, Channel::Proposers, Channel::Learners];

    /// Name of the channel within the configuration file
    pub fn name(self) -> &'static str {
        match self {
            Channel::Acceptors => "acceptors",
            Channel::Proposers => "proposers",
            Channel::Learners => "learners",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Channel, ConfigError> {
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| ConfigError::UnknownChannel(s.to_string()))
    }
}

/// Role a process plays.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Acceptor,
    Proposer,
    Learner,
    Client,
}

impl Role {
    /// Channel the role listens on. Clients only publish.
    pub fn channel(self) -> Option<Channel> {
        match self {
            Role::Acceptor => Some(Channel::Acceptors),
            Role::Proposer => Some(Channel::Proposers),
            Role::Learner => Some(Channel::Learners),
            Role::Client => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Role::Acceptor => "acceptor",
            Role::Proposer => "proposer",
            Role::Learner => "learner",
            Role::Client => "client",
        })
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Role, ConfigError> {
        match s {
            "acceptor" => Ok(Role::Acceptor),
            "proposer" => Ok(Role::Proposer),
            "learner" => Ok(Role::Learner),
            "client" => Ok(Role::Client),
            _ => Err(ConfigError::UnknownRole(s.to_string())),
        }
    }
}

/// Errors reading the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected `<channel> <host> <port>`")]
    Malformed { line: usize },
    #[error("line {line}: invalid address {addr}")]
    InvalidAddress { line: usize, addr: String },
    #[error("unknown channel `{0}`")]
    UnknownChannel(String),
    #[error("unknown role `{0}`")]
    UnknownRole(String),
    #[error("no address configured for channel `{0}`")]
    MissingChannel(Channel),
    #[error("at least one acceptor is required")]
    NoAcceptors,
    #[error("the phase timeout must be positive")]
    ZeroTimeout,
}

/// Configuration holds the channel addresses and the size of the
/// acceptor set, along with the timing of proposer retries.
#[derive(Clone, Debug)]
pub struct Configuration {
    channels: HashMap<Channel, SocketAddr>,
    acceptors: usize,
    phase_timeout: Duration,
    max_backoff: Duration,
    trust_decide: bool,
}

impl Configuration {
    /// Creates a configuration from channel addresses. Every channel
    /// must have an address.
    pub fn new<I>(channels: I) -> Result<Configuration, ConfigError>
    where
        I: IntoIterator<Item = (Channel, SocketAddr)>,
    {
        let channels: HashMap<Channel, SocketAddr> = channels.into_iter().collect();
        if let Some(missing) = Channel::ALL.iter().find(|c| !channels.contains_key(*c)) {
            return Err(ConfigError::MissingChannel(*missing));
        }

        Ok(Configuration {
            channels,
            acceptors: DEFAULT_ACCEPTORS,
            phase_timeout: Duration::from_millis(DEFAULT_PHASE_TIMEOUT_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            trust_decide: true,
        })
    }

    /// Reads a configuration file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Configuration, ConfigError> {
        fs::read_to_string(path)?.parse()
    }

    /// Sets the number of acceptors
    pub fn with_acceptors(mut self, acceptors: usize) -> Result<Configuration, ConfigError> {
        if acceptors == 0 {
            return Err(ConfigError::NoAcceptors);
        }
        self.acceptors = acceptors;
        Ok(self)
    }

    /// Sets the initial time a proposer waits for a quorum
    pub fn with_phase_timeout(mut self, timeout: Duration) -> Result<Configuration, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.phase_timeout = timeout;
        Ok(self)
    }

    /// Sets the cap of the proposer's retry backoff
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Configuration {
        self.max_backoff = max_backoff;
        self
    }

    /// Sets whether learners take DECIDE messages at face value
    pub fn with_trust_decide(mut self, trust_decide: bool) -> Configuration {
        self.trust_decide = trust_decide;
        self
    }

    /// Address of a channel
    pub fn address(&self, channel: Channel) -> SocketAddr {
        self.channels[&channel]
    }

    /// Number of acceptors
    pub fn acceptors(&self) -> usize {
        self.acceptors
    }

    /// Size of quorum
    pub fn quorum_size(&self) -> usize {
        paxos::quorum_size(self.acceptors)
    }

    /// Initial time a proposer waits for a quorum
    pub fn phase_timeout(&self) -> Duration {
        self.phase_timeout
    }

    /// Cap of the proposer's retry backoff
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Whether learners take DECIDE messages at face value
    pub fn trust_decide(&self) -> bool {
        self.trust_decide
    }
}

impl FromStr for Configuration {
    type Err = ConfigError;

    /// Parses lines of `<channel> <host> <port>`. Blank lines and lines
    /// starting with `#` are skipped.
    fn from_str(s: &str) -> Result<Configuration, ConfigError> {
        let mut channels = Vec::new();
        for (i, line) in s.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts = line.split_whitespace().collect::<Vec<_>>();
            let (channel, host, port) = match parts[..] {
                [channel, host, port] => (channel, host, port),
                _ => return Err(ConfigError::Malformed { line: line_no }),
            };

            let channel = channel.parse::<Channel>()?;
            let invalid = || ConfigError::InvalidAddress {
                line: line_no,
                addr: format!("{}:{}", host, port),
            };
            let port = port.parse::<u16>().map_err(|_| invalid())?;
            let addr = (host, port)
                .to_socket_addrs()
                .map_err(|_| invalid())?
                .find(SocketAddr::is_ipv4)
                .ok_or_else(invalid)?;
            channels.push((channel, addr));
        }

        Configuration::new(channels)
    }
}

/// Identity of a process: its role and number.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Identity {
    pub role: Role,
    pub id: NodeId,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.role, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "
        # multicast groups
        acceptors 239.0.0.1 5000
        proposers 239.0.0.1 6000

        learners 239.0.0.1 7000
    ";

    #[test]
    fn parse() {
        let config: Configuration = CONFIG.parse().unwrap();
        assert_eq!(
            "239.0.0.1:5000".parse::<SocketAddr>().unwrap(),
            config.address(Channel::Acceptors)
        );
        assert_eq!(
            "239.0.0.1:6000".parse::<SocketAddr>().unwrap(),
            config.address(Channel::Proposers)
        );
        assert_eq!(
            "239.0.0.1:7000".parse::<SocketAddr>().unwrap(),
            config.address(Channel::Learners)
        );
        assert_eq!(DEFAULT_ACCEPTORS, config.acceptors());
        assert_eq!(2, config.quorum_size());
        assert!(config.trust_decide());
    }

    #[test]
    fn quorum_follows_acceptor_count() {
        let config: Configuration = CONFIG.parse().unwrap();
        assert_eq!(3, config.clone().with_acceptors(5).unwrap().quorum_size());
        assert_eq!(1, config.clone().with_acceptors(1).unwrap().quorum_size());
        assert_matches!(config.with_acceptors(0), Err(ConfigError::NoAcceptors));
    }

    #[test]
    fn phase_timeout_must_be_positive() {
        let config: Configuration = CONFIG.parse().unwrap();
        assert_matches!(
            config.clone().with_phase_timeout(Duration::ZERO),
            Err(ConfigError::ZeroTimeout)
        );
        let config = config.with_phase_timeout(Duration::from_millis(1)).unwrap();
        assert_eq!(Duration::from_millis(1), config.phase_timeout());
    }

    #[test]
    fn parse_errors() {
        assert_matches!(
            "acceptors 239.0.0.1".parse::<Configuration>(),
            Err(ConfigError::Malformed { line: 1 })
        );
        assert_matches!(
            "acceptors 239.0.0.1 port".parse::<Configuration>(),
            Err(ConfigError::InvalidAddress { line: 1, .. })
        );
        assert_matches!(
            "replicas 239.0.0.1 5000".parse::<Configuration>(),
            Err(ConfigError::UnknownChannel(ref c)) if c == "replicas"
        );
        assert_matches!(
            "acceptors 239.0.0.1 5000\nlearners 239.0.0.1 7000".parse::<Configuration>(),
            Err(ConfigError::MissingChannel(Channel::Proposers))
        );
    }

    #[test]
    fn roles() {
        assert_eq!(Some(Role::Acceptor), "acceptor".parse::<Role>().ok());
        assert_eq!(Some(Role::Client), "client".parse::<Role>().ok());
        assert!("leader".parse::<Role>().is_err());
        assert_eq!(Some(Channel::Proposers), Role::Proposer.channel());
        assert_eq!(None, Role::Client.channel());
        assert_eq!(
            "learner 3",
            Identity {
                role: Role::Learner,
                id: 3
            }
            .to_string()
        );
    }
}
