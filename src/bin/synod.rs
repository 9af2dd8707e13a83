#[macro_use]
extern crate log;

use clap::{value_parser, Arg, ArgAction, Command};
use std::time::Duration;
use synod::config::{DEFAULT_ACCEPTORS, DEFAULT_MAX_BACKOFF_MS, DEFAULT_PHASE_TIMEOUT_MS};
use synod::server::{run_client, serve};
use synod::{
    AcceptorNode, Configuration, Identity, LearnerNode, NodeId, ProposerNode, Receiver, Role,
    UdpTransport,
};
use tokio::io::{stdin, BufReader};

fn cli() -> Command {
    Command::new("synod")
        .version("0.1")
        .about("Runs one process of a single-decree Paxos deployment")
        .arg(
            Arg::new("CONFIG")
                .required(true)
                .help("Configuration file with the channel addresses"),
        )
        .arg(
            Arg::new("ROLE")
                .required(true)
                .value_parser(["acceptor", "proposer", "learner", "client"])
                .help("Role of the process"),
        )
        .arg(
            Arg::new("ID")
                .required(true)
                .value_parser(value_parser!(NodeId))
                .help("Identifier of the process within its role"),
        )
        .arg(
            Arg::new("acceptors")
                .long("acceptors")
                .value_parser(value_parser!(usize))
                .help(format!(
                    "Number of acceptors in the deployment [default: {}]",
                    DEFAULT_ACCEPTORS
                )),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_parser(value_parser!(u64))
                .help(format!(
                    "Time a proposer waits for a quorum before retrying [default: {}]",
                    DEFAULT_PHASE_TIMEOUT_MS
                )),
        )
        .arg(
            Arg::new("max-backoff-ms")
                .long("max-backoff-ms")
                .value_parser(value_parser!(u64))
                .help(format!(
                    "Cap of the proposer's retry backoff [default: {}]",
                    DEFAULT_MAX_BACKOFF_MS
                )),
        )
        .arg(
            Arg::new("no-trust-decide")
                .long("no-trust-decide")
                .action(ArgAction::SetTrue)
                .help("Learners wait for a quorum of acceptors instead of DECIDE"),
        )
}

async fn run_node<R: Receiver>(
    config: Configuration,
    identity: Identity,
    mut node: R,
) -> synod::Result<()> {
    let mut transport = UdpTransport::new(config, identity.role.channel())?;
    info!("{} started", identity);
    serve(&mut transport, &mut node, |value| {
        let value = String::from_utf8_lossy(&value);
        println!("{} decided {}", identity, value);
    })
    .await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();

    // required arguments are enforced by clap
    let path = matches.get_one::<String>("CONFIG").cloned().unwrap_or_default();
    let role = matches
        .get_one::<String>("ROLE")
        .map(String::as_str)
        .unwrap_or_default()
        .parse::<Role>()?;
    let id = matches.get_one::<NodeId>("ID").copied().unwrap_or_default();

    // options left out keep the defaults of the configuration
    let mut config = Configuration::from_path(&path)?
        .with_trust_decide(!matches.get_flag("no-trust-decide"));
    if let Some(&acceptors) = matches.get_one::<usize>("acceptors") {
        config = config.with_acceptors(acceptors)?;
    }
    if let Some(&timeout) = matches.get_one::<u64>("timeout-ms") {
        config = config.with_phase_timeout(Duration::from_millis(timeout))?;
    }
    if let Some(&max_backoff) = matches.get_one::<u64>("max-backoff-ms") {
        config = config.with_max_backoff(Duration::from_millis(max_backoff));
    }
    debug!("{:?}", config);

    let identity = Identity { role, id };
    match role {
        Role::Acceptor => run_node(config, identity, AcceptorNode::new(id)).await?,
        Role::Proposer => {
            let node = ProposerNode::new(id, &config);
            run_node(config, identity, node).await?
        }
        Role::Learner => {
            let node = LearnerNode::new(id, &config);
            run_node(config, identity, node).await?
        }
        Role::Client => {
            let mut transport = UdpTransport::new(config, None)?;
            run_client(&mut transport, BufReader::new(stdin())).await?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn cli_defaults() {
        let matches = cli().get_matches_from(["synod", "paxos.conf", "proposer", "2"]);
        assert_eq!(Some(&2), matches.get_one::<NodeId>("ID"));
        assert_eq!(None, matches.get_one::<usize>("acceptors"));
        assert_eq!(None, matches.get_one::<u64>("timeout-ms"));
        assert!(!matches.get_flag("no-trust-decide"));

        let matches = cli().get_matches_from([
            "synod",
            "paxos.conf",
            "learner",
            "1",
            "--acceptors",
            "5",
            "--timeout-ms",
            "50",
            "--no-trust-decide",
        ]);
        assert_eq!(Some(&5), matches.get_one::<usize>("acceptors"));
        assert_eq!(Some(&50), matches.get_one::<u64>("timeout-ms"));
        assert!(matches.get_flag("no-trust-decide"));

        assert!(cli()
            .try_get_matches_from(["synod", "paxos.conf", "leader", "2"])
            .is_err());
    }
}
