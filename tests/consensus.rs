//! Whole-protocol runs over a simulated broadcast network that reorders,
//! duplicates and drops messages. Every run is seeded so failures replay.
#[macro_use]
extern crate lazy_static;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use synod::*;

lazy_static! {
    static ref CONFIG: Configuration = "
        acceptors 239.0.0.1 5000
        proposers 239.0.0.1 6000
        learners 239.0.0.1 7000
    "
    .parse::<Configuration>()
    .unwrap()
    .with_phase_timeout(Duration::from_millis(10))
    .unwrap();
}

const MAX_DELIVERIES: usize = 100_000;

struct Network {
    rng: StdRng,
    in_flight: Vec<(Channel, Message)>,
    loss: f64,
    duplication: f64,
    /// learners drop everything while set
    deaf_learners: bool,
    acceptors: Vec<AcceptorNode>,
    alive: Vec<bool>,
    proposers: Vec<ProposerNode>,
    learners: Vec<LearnerNode>,
    /// values reported by each learner
    learned: Vec<Vec<Bytes>>,
    /// values reported by each proposer
    chosen: Vec<Vec<Bytes>>,
}

impl Network {
    fn new(seed: u64, config: &Configuration, proposers: u32, learners: u32) -> Network {
        let acceptors = config.acceptors() as u32;
        Network {
            rng: StdRng::seed_from_u64(seed),
            in_flight: Vec::new(),
            loss: 0.0,
            duplication: 0.0,
            deaf_learners: false,
            acceptors: (1..=acceptors).map(AcceptorNode::new).collect(),
            alive: vec![true; acceptors as usize],
            proposers: (1..=proposers)
                .map(|id| ProposerNode::new(id, config))
                .collect(),
            learners: (1..=learners)
                .map(|id| LearnerNode::new(id, config))
                .collect(),
            learned: vec![Vec::new(); learners as usize],
            chosen: vec![Vec::new(); proposers as usize],
        }
    }

    fn propose(&mut self, value: &str) {
        let value = Bytes::copy_from_slice(value.as_bytes());
        self.in_flight
            .push((Channel::Proposers, Proposal(value).into()));
    }

    fn dispatch(in_flight: &mut Vec<(Channel, Message)>, actions: Vec<Action>) -> Vec<Bytes> {
        let mut reported = Vec::new();
        for action in actions {
            match action {
                Action::Send(channel, msg) => in_flight.push((channel, msg)),
                Action::Report(value) => reported.push(value),
            }
        }
        reported
    }

    /// Delivers one random message in flight. Returns `false` once nothing
    /// is left to deliver.
    fn step(&mut self) -> bool {
        if self.in_flight.is_empty() {
            return false;
        }

        let i = self.rng.random_range(0..self.in_flight.len());
        let (channel, msg) = self.in_flight.swap_remove(i);
        if self.rng.random_bool(self.loss) {
            return true;
        }
        if self.rng.random_bool(self.duplication) {
            self.in_flight.push((channel, msg.clone()));
        }

        match channel {
            Channel::Acceptors => {
                for (node, alive) in self.acceptors.iter_mut().zip(&self.alive) {
                    if !*alive {
                        continue;
                    }

                    let promised = node.acceptor().promised();
                    let actions = node.receive(msg.clone());

                    // acceptors never go back on a promise
                    let acceptor = node.acceptor();
                    assert!(acceptor.promised() >= promised);
                    if let Some(PromiseValue(bal, _)) = acceptor.accepted() {
                        assert!(Some(*bal) <= acceptor.promised());
                    }

                    let reported = Network::dispatch(&mut self.in_flight, actions);
                    assert!(reported.is_empty());
                }
            }
            Channel::Proposers => {
                for (node, chosen) in self.proposers.iter_mut().zip(&mut self.chosen) {
                    let actions = node.receive(msg.clone());
                    chosen.extend(Network::dispatch(&mut self.in_flight, actions));
                }
            }
            Channel::Learners if self.deaf_learners => {}
            Channel::Learners => {
                for (node, learned) in self.learners.iter_mut().zip(&mut self.learned) {
                    let actions = node.receive(msg.clone());
                    learned.extend(Network::dispatch(&mut self.in_flight, actions));
                }
            }
        }
        true
    }

    fn drain(&mut self) {
        for _ in 0..MAX_DELIVERIES {
            if !self.step() {
                return;
            }
        }
        panic!("network never went quiet");
    }

    /// Times out the attempt of a random proposer, if one is in flight.
    fn tick(&mut self) {
        let waiting = self
            .proposers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.deadline().is_some())
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        if waiting.is_empty() {
            return;
        }

        let i = waiting[self.rng.random_range(0..waiting.len())];
        let actions = self.proposers[i].timeout();
        let reported = Network::dispatch(&mut self.in_flight, actions);
        assert!(reported.is_empty());
    }

    /// Runs with the configured loss for a while, timing out attempts at
    /// random points.
    fn chaos(&mut self, deliveries: usize) {
        for _ in 0..deliveries {
            if self.rng.random_bool(0.05) {
                self.tick();
            }
            if !self.step() {
                self.tick();
            }
        }
    }

    /// Reliable delivery from here on: clients re-send their values and
    /// stalled attempts are retried one at a time.
    fn stabilize(&mut self, values: &[&str]) {
        self.loss = 0.0;
        for _ in 0..200 {
            self.drain();
            if self.learned.iter().all(|l| !l.is_empty()) {
                return;
            }
            for value in values {
                self.propose(value);
            }
            self.drain();
            self.tick();
        }
    }

    fn all_reports(&self) -> Vec<&Bytes> {
        self.learned.iter().chain(&self.chosen).flatten().collect()
    }

    fn assert_agreement(&self, values: &[&str]) {
        let reports = self.all_reports();
        for v in &reports {
            assert_eq!(reports[0], *v, "processes decided different values");
            assert!(values.iter().any(|value| **v == value.as_bytes()));
        }

        // reported at most once per process
        for reports in self.learned.iter().chain(&self.chosen) {
            assert!(reports.len() <= 1);
        }
    }
}

#[test]
fn happy_path() {
    let mut net = Network::new(0, &CONFIG, 1, 2);
    net.propose("X");
    net.drain();

    assert_eq!(vec![vec![Bytes::from("X")]; 2], net.learned);
    assert_eq!(vec![vec![Bytes::from("X")]], net.chosen);
    assert_eq!(Some(Ballot(1, 1)), net.proposers[0].proposer().ballot());
}

#[test]
fn duplicated_and_reordered_messages() {
    for seed in 0..50 {
        let mut net = Network::new(seed, &CONFIG, 1, 3);
        net.duplication = 0.3;
        net.propose("X");
        net.drain();

        net.assert_agreement(&["X"]);
        assert!(net.learned.iter().all(|l| l.len() == 1));
    }
}

#[test]
fn concurrent_proposers_agree() {
    let values = ["A", "B"];
    for seed in 0..100 {
        let config = CONFIG.clone().with_acceptors(5).unwrap();
        let mut net = Network::new(seed, &config, 2, 3);
        net.loss = 0.2;
        net.duplication = 0.1;
        for value in &values {
            net.propose(value);
        }

        net.chaos(500);
        net.assert_agreement(&values);

        net.stabilize(&values);
        net.assert_agreement(&values);
        assert!(
            net.learned.iter().all(|l| l.len() == 1),
            "seed {} never decided",
            seed
        );
    }
}

#[test]
fn learners_count_acceptances() {
    let values = ["A", "B", "C"];
    for seed in 0..50 {
        let config = CONFIG.clone().with_trust_decide(false);
        let mut net = Network::new(seed, &config, 3, 2);
        net.loss = 0.2;
        net.duplication = 0.2;
        for value in &values {
            net.propose(value);
        }

        net.chaos(300);
        net.assert_agreement(&values);

        net.stabilize(&values);
        net.assert_agreement(&values);
        assert!(
            net.learned.iter().all(|l| l.len() == 1),
            "seed {} left a learner behind",
            seed
        );
        assert!(net
            .learners
            .iter()
            .all(|l| l.learner().decided_ballot().is_some()));
    }
}

#[test]
fn late_learner_catches_up_without_trusting_decide() {
    for seed in 0..20 {
        let config = CONFIG.clone().with_trust_decide(false);
        let mut net = Network::new(seed, &config, 1, 2);
        net.deaf_learners = true;
        net.propose("X");
        net.drain();

        assert_eq!(vec![vec![Bytes::from("X")]], net.chosen);
        assert!(net.learned.iter().all(|l| l.is_empty()));
        assert_eq!(None, net.proposers[0].deadline());

        // a client re-sending its value makes the proposer confirm the
        // decision in a new round
        net.deaf_learners = false;
        net.stabilize(&["X"]);
        assert_eq!(vec![vec![Bytes::from("X")]; 2], net.learned);
        assert_eq!(vec![vec![Bytes::from("X")]], net.chosen);
        assert!(net.proposers[0].proposer().ballot().unwrap() > Ballot(1, 1));
    }
}

#[test]
fn minority_of_acceptors_down() {
    for seed in 0..20 {
        let config = CONFIG.clone().with_acceptors(5).unwrap();
        let mut net = Network::new(seed, &config, 2, 2);
        net.alive[0] = false;
        net.alive[3] = false;
        net.propose("X");
        net.propose("Y");

        net.stabilize(&["X", "Y"]);
        net.assert_agreement(&["X", "Y"]);
        assert!(net.learned.iter().all(|l| l.len() == 1));
    }
}

#[test]
fn majority_of_acceptors_down() {
    let mut net = Network::new(7, &CONFIG, 1, 2);
    net.alive[0] = false;
    net.alive[2] = false;
    net.propose("X");

    net.stabilize(&["X"]);
    assert!(net.all_reports().is_empty());

    // the proposer keeps trying with ever higher ballots
    let ballot = net.proposers[0].proposer().ballot().unwrap();
    assert!(ballot > Ballot(1, 1));
    assert!(net.proposers[0].deadline().is_some());
}
