use cmd_lib::*;
use serde::Deserialize;
use std::io::Error;
use std::time::{Duration, Instant};

use crate::ontap::{ClusterPeerCreate, OntapClient, SvmPeerCreate, SvmPeerState};

const DEFAULT_SETTLE_SECS: u64 = 5;
const SVM_PEER_ACCEPT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
pub struct PeeringConfig {
    pub passphrase: String,
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    pub source: ClusterConfig,
    pub destination: ClusterConfig,
}

#[derive(Debug, Deserialize)]
pub struct ClusterConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    pub svm: String,
    pub intercluster_lifs: Vec<String>,
    /// Name the other cluster uses for this one in its peer relationship.
    #[serde(default)]
    pub peer_name: Option<String>,
}

fn default_settle_secs() -> u64 {
    DEFAULT_SETTLE_SECS
}

fn default_verify_ssl() -> bool {
    true
}

impl PeeringConfig {
    pub fn load(path: &str) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::other(format!("Failed to read peering config {path}: {e}")))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, Error> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::other(format!("TOML parse error: {e}")))?;
        for (side, cluster) in [("source", &config.source), ("destination", &config.destination)] {
            if cluster.intercluster_lifs.is_empty() {
                return Err(Error::other(format!(
                    "{side}.intercluster_lifs must not be empty"
                )));
            }
        }
        Ok(config)
    }

    pub fn source_peer_name(&self) -> &str {
        self.source.peer_name.as_deref().unwrap_or("source_cluster")
    }

    pub fn destination_peer_name(&self) -> &str {
        self.destination.peer_name.as_deref().unwrap_or("dest_cluster")
    }
}

impl ClusterConfig {
    fn client(&self) -> Result<OntapClient, Error> {
        OntapClient::new(&self.hostname, &self.username, &self.password, self.verify_ssl)
    }
}

pub fn run_cmd_peer(config_path: &str) -> CmdResult {
    let config = PeeringConfig::load(config_path)?;
    let source = config.source.client()?;
    let destination = config.destination.client()?;
    let settle = Duration::from_secs(config.settle_secs);

    let src_peer_name = config.source_peer_name();
    let dst_peer_name = config.destination_peer_name();

    let req = ClusterPeerCreate::new(
        dst_peer_name,
        &config.destination.intercluster_lifs,
        &config.passphrase,
    );
    source.create_cluster_peer(&req).map_err(|e| {
        Error::other(format!("Error creating cluster peer on source cluster: {e}"))
    })?;
    info!("Cluster peer created on source cluster: {dst_peer_name}");
    std::thread::sleep(settle);

    let req = ClusterPeerCreate::new(
        src_peer_name,
        &config.source.intercluster_lifs,
        &config.passphrase,
    );
    destination.create_cluster_peer(&req).map_err(|e| {
        Error::other(format!(
            "Error creating cluster peer on destination cluster: {e}"
        ))
    })?;
    info!("Cluster peer created on destination cluster: {src_peer_name}");
    std::thread::sleep(settle);

    let src_svm = &config.source.svm;
    let dst_svm = &config.destination.svm;
    let req = SvmPeerCreate::snapmirror(src_svm, dst_svm, dst_peer_name);
    source
        .create_svm_peer(&req)
        .map_err(|e| Error::other(format!("Error initiating SVM peering: {e}")))?;
    info!("SVM peering initiated for {src_svm} to {dst_svm}.");

    accept_svm_peer(&destination, dst_svm, src_svm, settle)?;
    info!("Cluster and SVM peering successfully established.");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum PeerAcceptStep {
    Done,
    Accept,
    Wait,
    Fail,
}

/// What to do with the destination's view of the SVM peer relationship.
/// `None` covers both a missing record and a state we don't recognize.
fn next_step(state: Option<SvmPeerState>) -> PeerAcceptStep {
    match state {
        Some(SvmPeerState::Peered) => PeerAcceptStep::Done,
        Some(SvmPeerState::Pending) => PeerAcceptStep::Accept,
        Some(SvmPeerState::Initializing | SvmPeerState::Initiated) | None => PeerAcceptStep::Wait,
        Some(SvmPeerState::Rejected | SvmPeerState::Suspended) => PeerAcceptStep::Fail,
    }
}

/// Waits for the relationship to reach `pending` on the destination and
/// accepts it.
fn accept_svm_peer(
    destination: &OntapClient,
    svm: &str,
    peer_svm: &str,
    poll: Duration,
) -> CmdResult {
    let start_time = Instant::now();
    let timeout = Duration::from_secs(SVM_PEER_ACCEPT_TIMEOUT_SECS);
    loop {
        let peer = destination.find_svm_peer(svm, peer_svm)?;
        let state = peer.as_ref().and_then(|p| p.state.as_deref()).unwrap_or("absent");
        match (next_step(peer.as_ref().and_then(|p| p.peer_state())), peer.as_ref()) {
            (PeerAcceptStep::Done, _) => {
                info!("SVM peering for {svm} to {peer_svm} is already peered.");
                return Ok(());
            }
            (PeerAcceptStep::Accept, Some(peer)) => {
                destination.accept_svm_peer(&peer.uuid).map_err(|e| {
                    Error::other(format!("Error accepting SVM peering: {e}"))
                })?;
                info!("SVM peering accepted for {svm} to {peer_svm}.");
                return Ok(());
            }
            (PeerAcceptStep::Fail, _) => {
                return Err(Error::other(format!(
                    "SVM peer {svm} -> {peer_svm} on {} is {state}, not accepting",
                    destination.host()
                )));
            }
            _ => {
                if start_time.elapsed() > timeout {
                    return Err(Error::other(format!(
                        "SVM peer {svm} -> {peer_svm} not pending on {} after {SVM_PEER_ACCEPT_TIMEOUT_SECS}s (state: {state})",
                        destination.host()
                    )));
                }
                info!("SVM peer {svm} -> {peer_svm} is {state}, retrying...");
                std::thread::sleep(poll.max(Duration::from_secs(1)));
            }
        }
    }
}
