use k8s_openapi::api::{
    core::v1::LoadBalancerIngress,
    networking::v1::{
        Ingress, IngressLoadBalancerIngress, IngressLoadBalancerStatus, IngressPortStatus,
    },
};
use kube::ResourceExt;

use crate::{
    ctx::Context,
    err::{ControllerError, ControllerResult},
    gateways,
    istio::VirtualService,
    translate::object_key,
};

/// Load balancer addresses of the services behind the gateways `vs` is attached to.
///
/// Addresses are collected gateway by gateway without deduplication.
pub fn load_balancer_addresses(
    ctx: &Context,
    vs: &VirtualService,
) -> ControllerResult<Vec<IngressLoadBalancerIngress>> {
    let namespace = vs
        .namespace()
        .ok_or(ControllerError::MissingField("metadata.namespace"))?;
    let attached = gateways::gateways_by_name(&ctx.cache, &vs.spec.gateways, &namespace)?;

    let mut addresses = vec![];
    for gateway in &attached {
        for svc in gateways::services_for_gateway(&ctx.cache, gateway, ctx.args.scoped_gateways) {
            let lb_ingress = svc
                .status
                .as_ref()
                .and_then(|status| status.load_balancer.as_ref())
                .and_then(|lb| lb.ingress.as_ref());
            addresses.extend(lb_ingress.into_iter().flatten().map(to_ingress_address));
        }
    }
    Ok(addresses)
}

fn to_ingress_address(lb: &LoadBalancerIngress) -> IngressLoadBalancerIngress {
    IngressLoadBalancerIngress {
        hostname: lb.hostname.clone(),
        ip: lb.ip.clone(),
        ports: lb.ports.as_ref().map(|ports| {
            ports
                .iter()
                .map(|port| IngressPortStatus {
                    error: port.error.clone(),
                    port: port.port,
                    protocol: port.protocol.clone(),
                })
                .collect()
        }),
    }
}

fn current_addresses(ingress: &Ingress) -> &[IngressLoadBalancerIngress] {
    ingress
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_deref())
        .unwrap_or_default()
}

/// Brings the ingress status in line with the gateways of `vs`.
/// Nothing is written when the addresses didn't change.
///
/// Returns whether the status was written.
pub async fn sync_ingress_status(
    ctx: &Context,
    ingress: &Ingress,
    vs: &VirtualService,
) -> ControllerResult<bool> {
    let addresses = load_balancer_addresses(ctx, vs)?;
    if current_addresses(ingress) == addresses.as_slice() {
        return Ok(false);
    }

    tracing::info!("Updating ingress status for {}", object_key(ingress));
    let namespace = ingress
        .namespace()
        .ok_or(ControllerError::MissingField("metadata.namespace"))?;
    ctx.writer
        .update_ingress_status(
            &namespace,
            &ingress.name_any(),
            &IngressLoadBalancerStatus {
                ingress: Some(addresses),
            },
        )
        .await?;
    Ok(true)
}
