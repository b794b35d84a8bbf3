use std::sync::{Arc, atomic::AtomicBool};

use crate::{args::ControllerArgs, cache::Cache, reconcile::Backoff, writer::ClusterWriter};

pub struct Context {
    pub args: ControllerArgs,
    pub cache: Cache,
    pub writer: Arc<dyn ClusterWriter>,
    pub is_leader: Arc<AtomicBool>,
    pub hostname: String,
    pub backoff: Backoff,
}

impl Context {
    pub fn new(
        args: ControllerArgs,
        cache: Cache,
        writer: Arc<dyn ClusterWriter>,
        hostname: String,
    ) -> Self {
        // Without leader election every replica acts as the leader.
        let is_leader = Arc::new(AtomicBool::new(!args.leader_election));
        Context {
            args,
            cache,
            writer,
            is_leader,
            hostname,
            backoff: Backoff::default(),
        }
    }
}

/// Host name identifying this replica in leases and events.
pub fn hostname() -> anyhow::Result<String> {
    Ok(std::env::var("HOSTNAME").or_else(|_| std::env::var("HOST"))?)
}
