//! # Cluster Harness
//!
//! Builds a register served by `validators` engines. Every engine has its
//! own registry, election, mempool and event bus; the ledger and network
//! are shared, the way independent validators share an external ledger
//! service.
//!
//! All validators are registered from the start. A validator that has not
//! been started (or was crashed) is simply unreachable.

use dc_01_registry::{
    ConsensusConfig, GenesisConfigProvider, RegistrationMode, StaticGovernanceSource,
    ValidatorRegistry, VersionedConfig,
};
use dc_02_mempool::{Mempool, MempoolConfig, TxLocation};
use dc_03_chain_validation::{
    ActionDefinition, Definition, DefinitionCache, Participant, StaticDefinitionProvider,
};
use dc_04_leader_election::LeaderElection;
use dc_05_docket_consensus::{
    DocketEngine, Ed25519Signer, EngineConfig, EngineDependencies, InMemoryLedger,
    InMemoryNetwork, PeerEnvelope, TokioClock,
};
use serde_json::json;
use shared_bus::{ConsensusEvent, EventFilter, InMemoryEventBus, Subscription};
use shared_crypto::{Ed25519KeyPair, Ed25519Verifier, SignatureVerifier};
use shared_types::{Docket, RegisterId, TimeSource, Transaction, TransactionKind, ValidatorId};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub const REGISTER: &str = "loans";

/// Wall-clock origin of the paused test clock.
pub const GENESIS_MS: u64 = 1_700_000_000_000;

pub fn validator(index: usize) -> ValidatorId {
    format!("v{index}")
}

pub fn validator_key(index: usize) -> Ed25519KeyPair {
    Ed25519KeyPair::from_seed([index as u8 + 1; 32])
}

fn admin_key() -> Ed25519KeyPair {
    Ed25519KeyPair::from_seed([0xAD; 32])
}

fn alice_key() -> Ed25519KeyPair {
    Ed25519KeyPair::from_seed([0xA1; 32])
}

fn signed(mut tx: Transaction, key: &Ed25519KeyPair) -> Transaction {
    tx.signature = key.sign(&tx.signing_hash()).to_vec();
    tx.with_computed_id()
}

/// A running (or crashed) validator.
pub struct ClusterNode {
    pub id: ValidatorId,
    pub engine: Arc<DocketEngine>,
    pub bus: Arc<InMemoryEventBus>,
    inbox: Option<mpsc::Receiver<PeerEnvelope>>,
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl ClusterNode {
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe(EventFilter::all().for_register(REGISTER))
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }
}

pub struct Cluster {
    pub ledger: Arc<InMemoryLedger>,
    pub network: Arc<InMemoryNetwork>,
    pub definitions: Arc<StaticDefinitionProvider>,
    pub clock: Arc<TokioClock>,
    pub consensus: ConsensusConfig,
    anchor: Transaction,
    validators: usize,
    nodes: BTreeMap<usize, ClusterNode>,
}

impl Cluster {
    /// A register with `validators` registered validators, none started.
    ///
    /// Consensus runs with the test configuration: thresholds 3 of 5 and
    /// a 30 second docket timeout.
    pub fn new(validators: usize) -> Self {
        dc_telemetry::init_test_logging();

        let ledger = Arc::new(InMemoryLedger::new());
        let anchor = signed(
            Transaction {
                id: [0u8; 32],
                kind: TransactionKind::GenesisAnchor,
                register_id: REGISTER.into(),
                definition_id: String::new(),
                action_id: None,
                instance_id: None,
                previous_id: None,
                sender: "admin".into(),
                data: json!({ "name": REGISTER }),
                previous_data: None,
                signature: vec![],
                timestamp: GENESIS_MS,
                nonce: 0,
            },
            &admin_key(),
        );
        ledger.insert_transaction(anchor.clone());
        ledger.set_sender_key(
            REGISTER,
            "admin",
            admin_key().public_key().as_bytes().to_vec(),
        );

        let definitions = Arc::new(StaticDefinitionProvider::new());
        definitions.publish(Definition {
            id: "loan".into(),
            version: 1,
            register_id: REGISTER.into(),
            participants: vec![Participant {
                id: "alice".into(),
                public_key: alice_key().public_key().as_bytes().to_vec(),
            }],
            actions: vec![ActionDefinition {
                id: 1,
                title: "Apply".into(),
                senders: vec![],
                data_schema: None,
                condition: None,
                disclosures: vec![],
            }],
        });

        Self {
            ledger,
            network: InMemoryNetwork::new(),
            definitions,
            clock: Arc::new(TokioClock::starting_at(GENESIS_MS)),
            consensus: ConsensusConfig::for_testing(),
            anchor,
            validators,
            nodes: BTreeMap::new(),
        }
    }

    /// Build the engine of validator `index` without starting any task.
    pub fn build(&mut self, index: usize) -> &ClusterNode {
        let id = validator(index);
        let governance = Arc::new(StaticGovernanceSource::new());
        governance.set_config(REGISTER, VersionedConfig::new(1, self.consensus.clone()));

        let bus = Arc::new(InMemoryEventBus::new());
        let registry = Arc::new(ValidatorRegistry::new(
            governance.clone(),
            self.clock.clone(),
        ));
        for i in 0..self.validators {
            let registered = registry.register_validator(
                REGISTER,
                validator(i),
                validator_key(i).public_key().as_bytes().to_vec(),
                format!("mem://{}", validator(i)),
                RegistrationMode::Public,
            );
            assert!(registered.is_ok(), "registering {} failed", validator(i));
        }
        let configs = Arc::new(GenesisConfigProvider::new(
            governance,
            self.clock.clone(),
            bus.clone(),
            Duration::from_secs(60),
        ));
        let election = Arc::new(LeaderElection::new(id.clone(), registry.clone(), bus.clone()));
        let inbox = self.network.register(id.clone(), 256);

        let deps = EngineDependencies {
            registry,
            configs,
            election,
            mempool: Arc::new(Mempool::new(MempoolConfig::for_testing(), self.clock.clone())),
            definitions: Arc::new(DefinitionCache::new(
                self.definitions.clone(),
                self.clock.clone(),
                Duration::from_secs(60),
                16,
            )),
            ledger: self.ledger.clone(),
            chain: self.ledger.clone(),
            signer: Arc::new(Ed25519Signer::new(id.clone(), validator_key(index))),
            verifier: Arc::new(Ed25519Verifier),
            transport: Arc::new(self.network.transport(id.clone())),
            event_bus: bus.clone(),
            time_source: self.clock.clone(),
        };
        let engine = match DocketEngine::new(EngineConfig::for_testing(id.clone()), deps) {
            Ok(engine) => Arc::new(engine),
            Err(e) => panic!("engine for {id} rejected: {e}"),
        };

        let (shutdown, _) = watch::channel(false);
        self.network.heal(&id);
        self.nodes.insert(
            index,
            ClusterNode {
                id,
                engine,
                bus,
                inbox: Some(inbox),
                handles: Vec::new(),
                shutdown,
            },
        );
        self.node(index)
    }

    /// Build validator `index` and run every engine task.
    pub fn start(&mut self, index: usize) -> &ClusterNode {
        self.build(index);
        let node = self.node_mut(index);
        let Some(inbox) = node.inbox.take() else {
            panic!("{} already started", node.id);
        };
        node.handles = node
            .engine
            .spawn(&[RegisterId::from(REGISTER)], inbox, node.shutdown.subscribe());
        self.node(index)
    }

    /// Build validator `index` and run only its inbound task, so build
    /// cycles and elections are driven by the test.
    pub fn start_inbound(&mut self, index: usize) -> &ClusterNode {
        self.build(index);
        let node = self.node_mut(index);
        let Some(inbox) = node.inbox.take() else {
            panic!("{} already started", node.id);
        };
        let task = node.engine.clone().run_inbound(inbox, node.shutdown.subscribe());
        node.handles = vec![tokio::spawn(task)];
        self.node(index)
    }

    pub fn start_all(&mut self) {
        for index in 0..self.validators {
            self.start(index);
        }
    }

    /// Stop validator `index` abruptly; in-flight work is lost with it.
    pub fn crash(&mut self, index: usize) {
        let node = self.node_mut(index);
        let _ = node.shutdown.send(true);
        for handle in node.handles.drain(..) {
            handle.abort();
        }
        let id = node.id.clone();
        self.network.isolate(&id);
    }

    /// Graceful stop of every started validator.
    pub async fn shutdown(&mut self) {
        for node in self.nodes.values_mut() {
            let _ = node.shutdown.send(true);
            for handle in node.handles.drain(..) {
                handle.abort();
                let _ = handle.await;
            }
        }
    }

    pub fn node(&self, index: usize) -> &ClusterNode {
        match self.nodes.get(&index) {
            Some(node) => node,
            None => panic!("validator {index} was never built"),
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut ClusterNode {
        match self.nodes.get_mut(&index) {
            Some(node) => node,
            None => panic!("validator {index} was never built"),
        }
    }

    pub fn engine(&self, index: usize) -> Arc<DocketEngine> {
        self.node(index).engine.clone()
    }

    pub fn running(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.values().filter(|node| node.is_running())
    }

    /// Hand a transaction to validator `index`.
    pub fn submit(&self, index: usize, tx: Transaction) {
        let result = self.node(index).engine.mempool().enqueue(tx, 0);
        assert!(result.is_ok(), "enqueue on {} failed: {result:?}", validator(index));
    }

    /// Hand a transaction to every running validator, as a client
    /// broadcasting to the register would.
    pub fn broadcast(&self, tx: &Transaction) {
        for node in self.running() {
            let result = node.engine.mempool().enqueue(tx.clone(), 0);
            assert!(result.is_ok(), "enqueue on {} failed: {result:?}", node.id);
        }
    }

    pub fn location(&self, index: usize, tx: &Transaction) -> TxLocation {
        self.node(index).engine.mempool().location(&tx.id)
    }

    /// A definition publication chained to the register anchor.
    pub fn publication(&self, nonce: u64) -> Transaction {
        signed(
            Transaction {
                id: [0u8; 32],
                kind: TransactionKind::DefinitionPublication,
                register_id: REGISTER.into(),
                definition_id: "loan".into(),
                action_id: None,
                instance_id: None,
                previous_id: Some(self.anchor.id),
                sender: "admin".into(),
                data: json!({ "revision": nonce }),
                previous_data: None,
                signature: vec![],
                timestamp: self.clock.now(),
                nonce,
            },
            &admin_key(),
        )
    }

    /// An action whose previous transaction was never committed.
    pub fn broken_chain_action(&self, nonce: u64) -> Transaction {
        signed(
            Transaction {
                id: [0u8; 32],
                kind: TransactionKind::Action,
                register_id: REGISTER.into(),
                definition_id: "loan".into(),
                action_id: Some(1),
                instance_id: Some("loan-1".into()),
                previous_id: Some([0xEE; 32]),
                sender: "alice".into(),
                data: json!({ "amount": 100 }),
                previous_data: None,
                signature: vec![],
                timestamp: self.clock.now(),
                nonce,
            },
            &alice_key(),
        )
    }

    pub fn committed(&self) -> Vec<Docket> {
        self.ledger.dockets(REGISTER)
    }

    /// Distinct registered validators whose signature over the docket id
    /// verifies.
    pub fn valid_signers(&self, docket: &Docket) -> HashSet<ValidatorId> {
        let verifier = Ed25519Verifier;
        docket
            .signatures
            .iter()
            .filter(|sig| {
                (0..self.validators).any(|i| {
                    validator(i) == sig.validator_id
                        && verifier.verify(
                            &docket.id,
                            &sig.signature,
                            validator_key(i).public_key().as_bytes(),
                        )
                })
            })
            .map(|sig| sig.validator_id.clone())
            .collect()
    }
}

/// Wait up to `within` for an event matching `matches`.
pub async fn wait_for_event<F>(
    events: &mut Subscription,
    within: Duration,
    mut matches: F,
) -> Option<ConsensusEvent>
where
    F: FnMut(&ConsensusEvent) -> bool,
{
    tokio::time::timeout(within, async {
        while let Some(event) = events.recv().await {
            if matches(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Poll `condition` every 10ms for up to `within`.
pub async fn wait_until<F>(within: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn is_commit(event: &ConsensusEvent) -> bool {
    matches!(event, ConsensusEvent::DocketCommitted { .. })
}

pub fn is_abandon(event: &ConsensusEvent) -> bool {
    matches!(event, ConsensusEvent::DocketAbandoned { .. })
}
