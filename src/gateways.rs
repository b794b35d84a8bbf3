use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;

use crate::{
    cache::{self, Cache},
    err::{ControllerError, ControllerResult},
    istio::Gateway,
};

/// Resolves gateway identifiers (`name` or `namespace/name`) relative to
/// `current_namespace`.
///
/// Gateways that don't exist are skipped with a warning so a dangling
/// reference doesn't block the ingress. Resolved gateways keep input order.
pub fn gateways_by_name(
    cache: &Cache,
    gateway_ids: &[String],
    current_namespace: &str,
) -> ControllerResult<Vec<Arc<Gateway>>> {
    let mut gateways = Vec::with_capacity(gateway_ids.len());
    for gateway_id in gateway_ids {
        let parts = gateway_id.split('/').collect::<Vec<_>>();
        let (namespace, name) = match parts.as_slice() {
            [name] if !name.is_empty() => (current_namespace, *name),
            [namespace, name] if !namespace.is_empty() && !name.is_empty() => (*namespace, *name),
            _ => {
                return Err(ControllerError::InvalidGatewayId {
                    id: gateway_id.clone(),
                    parts: parts.len(),
                });
            }
        };
        match cache::get(&cache.gateways, Some(namespace), name) {
            Some(gateway) => gateways.push(gateway),
            None => tracing::warn!("Failed to load gateway {gateway_id:?}, skipping"),
        }
    }
    Ok(gateways)
}

/// Ports of the gateways' servers that don't redirect to HTTPS,
/// deduplicated in first-seen order.
pub fn non_redirect_ports(gateways: &[Arc<Gateway>]) -> Vec<u32> {
    let mut ports = vec![];
    for server in gateways.iter().flat_map(|gw| gw.spec.servers.iter()) {
        if !server.redirects_to_https() && !ports.contains(&server.port.number) {
            ports.push(server.port.number);
        }
    }
    ports
}

/// Services backing a gateway's proxy workload, selected by the gateway's
/// selector. With `scoped` only the gateway's own namespace is searched.
pub fn services_for_gateway(cache: &Cache, gateway: &Gateway, scoped: bool) -> Vec<Arc<Service>> {
    let namespace = gateway.namespace();
    let namespace = if scoped { namespace.as_deref() } else { None };
    cache::list(&cache.services, namespace, &gateway.spec.selector)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::err::ErrorKind;
    use crate::test_utils::{CacheBuilder, gateway, service};

    fn cache() -> Cache {
        let servers = [(80, false), (443, false)];
        let local_servers = [(80, true), (8080, false)];
        let labels = [("istio", "ingressgateway")];
        let shared = gateway("istio-system", "ingress", "ingressgateway", &servers);
        let local = gateway("test-ns", "local", "local", &local_servers);
        let shared_svc = service("istio-system", "gw-svc", &labels, &["10.0.0.1"]);
        let local_svc = service("test-ns", "gw-svc", &labels, &["10.0.0.2"]);
        CacheBuilder::default()
            .gateway(shared)
            .gateway(local)
            .service(shared_svc)
            .service(local_svc)
            .build()
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case(&["istio-system/ingress"], &["istio-system/ingress"])]
    #[case(&["local"], &["test-ns/local"])]
    #[case(&["local", "istio-system/ingress"], &["test-ns/local", "istio-system/ingress"])]
    #[case(&["istio-system/ingress", "istio-system/missing"], &["istio-system/ingress"])]
    #[case(&["missing"], &[])]
    fn resolves(#[case] raw: &[&str], #[case] expected: &[&str]) {
        let resolved = gateways_by_name(&cache(), &ids(raw), "test-ns").unwrap();
        let found = resolved
            .iter()
            .map(|gw| format!("{}/{}", gw.namespace().unwrap(), gw.name_any()))
            .collect::<Vec<_>>();
        assert_eq!(found, expected);
    }

    #[rstest]
    #[case("a/b/c")]
    #[case("")]
    #[case("/ingress")]
    #[case("istio-system/")]
    fn malformed_ids(#[case] raw: &str) {
        let err = gateways_by_name(&cache(), &ids(&[raw]), "test-ns").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn ports_skip_redirects_and_duplicates() {
        let cache = cache();
        let wanted = ids(&["istio-system/ingress", "test-ns/local"]);
        let gws = gateways_by_name(&cache, &wanted, "test-ns").unwrap();
        assert_eq!(non_redirect_ports(&gws), vec![80, 443, 8080]);
    }

    #[rstest]
    #[case(false, 2)]
    #[case(true, 1)]
    fn gateway_services(#[case] scoped: bool, #[case] expected: usize) {
        let cache = cache();
        let gw = cache::get(&cache.gateways, Some("istio-system"), "ingress").unwrap();
        assert_eq!(services_for_gateway(&cache, &gw, scoped).len(), expected);
    }
}
