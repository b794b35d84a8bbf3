use std::{sync::Arc, time::Duration};

use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    Api,
    runtime::{Controller, controller, watcher},
};

use crate::{args::ControllerArgs, cache::Cache, istio::VirtualService, writer::KubeWriter};

mod args;
mod cache;
mod consts;
mod ctx;
mod eligibility;
mod err;
mod gateways;
mod istio;
mod matchers;
mod ports;
mod reconcile;
mod status;
mod translate;
mod utils;
mod writer;

#[cfg(test)]
mod test_utils;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

async fn lease_renew(ctx: Arc<ctx::Context>, client: kube::Client) {
    let leadership = kube_leader_election::LeaseLock::new(
        client.clone(),
        client.default_namespace(),
        kube_leader_election::LeaseLockParams {
            holder_id: ctx.hostname.clone(),
            lease_name: ctx.args.lease_name.clone(),
            lease_ttl: Duration::from_secs(15),
        },
    );
    loop {
        match leadership.try_acquire_or_renew().await {
            Ok(lease) => {
                let was_leader = ctx
                    .is_leader
                    .swap(lease.acquired_lease, std::sync::atomic::Ordering::Relaxed);
                if lease.acquired_lease && !was_leader {
                    tracing::info!("Acquired leadership lease");
                } else if !lease.acquired_lease && was_leader {
                    tracing::warn!("Lost leadership lease");
                }
            }
            Err(err) => {
                tracing::warn!("Failed to acquire or renew lease: {}", err);
            }
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = ControllerArgs::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();
    tracing::info!(
        "Starting {} {}",
        consts::CONTROLLER_NAME,
        consts::CONTROLLER_VERSION
    );
    tracing::info!("CLI argument: {:?}", args);

    let client = kube::Client::try_default().await?;
    let hostname = ctx::hostname()?;

    let ingress_controller = Controller::new(
        Api::<Ingress>::all(client.clone()),
        watcher::Config::default(),
    )
    .owns(
        Api::<VirtualService>::all(client.clone()),
        watcher::Config::default(),
    )
    .with_config(controller::Config::default().concurrency(args.workers))
    .shutdown_on_signal();

    let cache = Cache::start(&client, ingress_controller.store());
    tracing::info!("Waiting for caches to sync");
    cache.wait_until_ready().await?;

    let writer = Arc::new(KubeWriter::new(client.clone(), &hostname));
    let leader_election = args.leader_election;
    let ctx = Arc::new(ctx::Context::new(args, cache, writer, hostname));

    tracing::info!("Starting workers");
    let ingress_controller = ingress_controller
        .run(reconcile::reconcile, reconcile::on_error, ctx.clone())
        .for_each(|_| futures::future::ready(()));

    if !leader_election {
        ingress_controller.await;
        tracing::info!("Shutting down workers");
        return Ok(());
    }

    tokio::select! {
        _ = lease_renew(ctx.clone(), client) => {
            tracing::error!("Lease renewer task exited unexpectedly");
        },
        _ = ingress_controller => {
            tracing::info!("Shutting down workers");
        },
    }

    Ok(())
}
