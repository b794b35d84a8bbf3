//! Fixtures shared by the unit tests.

use std::{collections::BTreeMap, sync::Arc, sync::atomic::AtomicBool};

use k8s_openapi::api::{
    core::v1::Service,
    networking::v1::{Ingress, IngressClass},
};
use kube::{
    Resource,
    api::ObjectMeta,
    runtime::{reflector::store::Writer, watcher},
};
use serde_json::json;

use crate::{
    args::ControllerArgs,
    cache::Cache,
    ctx::Context,
    istio::{Gateway, GatewaySpec, Server, ServerPort, ServerTLSSettings},
    reconcile::Backoff,
    writer::ClusterWriter,
};

pub fn args() -> ControllerArgs {
    ControllerArgs {
        cluster_domain: "cluster.local".to_string(),
        default_gateway: "istio-system/ingress".to_string(),
        scoped_gateways: false,
        ingress_class: "istio".to_string(),
        default_weight: 100,
        workers: 1,
        resync_interval: 30,
        leader_election: false,
        lease_name: "test-lock".to_string(),
        log_level: tracing::level_filters::LevelFilter::DEBUG,
    }
}

pub fn context(cache: Cache, writer: impl ClusterWriter + 'static) -> Context {
    Context {
        args: args(),
        cache,
        writer: Arc::new(writer),
        is_leader: Arc::new(AtomicBool::new(true)),
        hostname: "test".to_string(),
        backoff: Backoff::default(),
    }
}

#[derive(Default)]
pub struct CacheBuilder {
    ingresses: Writer<Ingress>,
    ingress_classes: Writer<IngressClass>,
    services: Writer<Service>,
    virtual_services: Writer<crate::istio::VirtualService>,
    gateways: Writer<Gateway>,
}

fn apply<K>(writer: &mut Writer<K>, obj: K)
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    writer.apply_watcher_event(&watcher::Event::Apply(obj));
}

impl CacheBuilder {
    pub fn ingress(mut self, obj: Ingress) -> Self {
        apply(&mut self.ingresses, obj);
        self
    }

    pub fn ingress_class(mut self, obj: IngressClass) -> Self {
        apply(&mut self.ingress_classes, obj);
        self
    }

    pub fn service(mut self, obj: Service) -> Self {
        apply(&mut self.services, obj);
        self
    }

    pub fn virtual_service(mut self, obj: crate::istio::VirtualService) -> Self {
        apply(&mut self.virtual_services, obj);
        self
    }

    pub fn gateway(mut self, obj: Gateway) -> Self {
        apply(&mut self.gateways, obj);
        self
    }

    pub fn build(self) -> Cache {
        Cache {
            ingresses: self.ingresses.as_reader(),
            ingress_classes: self.ingress_classes.as_reader(),
            services: self.services.as_reader(),
            virtual_services: self.virtual_services.as_reader(),
            gateways: self.gateways.as_reader(),
        }
    }
}

/// `test-ns/test-ing` with a single `example.ca` rule pointing at `test-svc`.
pub fn ingress(port: serde_json::Value) -> Ingress {
    serde_json::from_value(json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {
            "name": "test-ing",
            "namespace": "test-ns",
            "uid": "test-ing-uid",
            "annotations": {"kubernetes.io/ingress.class": "istio"}
        },
        "spec": {
            "rules": [{
                "host": "example.ca",
                "http": {"paths": [{
                    "pathType": "ImplementationSpecific",
                    "backend": {"service": {"name": "test-svc", "port": port}}
                }]}
            }]
        }
    }))
    .unwrap()
}

pub fn ingress_class(name: &str, controller: &str) -> IngressClass {
    serde_json::from_value(json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "IngressClass",
        "metadata": {"name": name},
        "spec": {"controller": controller}
    }))
    .unwrap()
}

/// Service with `labels`, named ports and load balancer addresses (IPs).
pub fn service(namespace: &str, name: &str, labels: &[(&str, &str)], lb_ips: &[&str]) -> Service {
    let labels = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>();
    let ingress = lb_ips
        .iter()
        .map(|ip| json!({"ip": ip}))
        .collect::<Vec<_>>();
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": name, "namespace": namespace, "labels": labels},
        "spec": {"ports": [{"name": "http", "port": 80}, {"name": "https", "port": 443}]},
        "status": {"loadBalancer": {"ingress": ingress}}
    }))
    .unwrap()
}

/// Gateway selecting `istio=<selector>` with one server per `(port, https_redirect)`.
pub fn gateway(namespace: &str, name: &str, selector: &str, servers: &[(u32, bool)]) -> Gateway {
    let mut gw = Gateway::new(
        name,
        GatewaySpec {
            selector: BTreeMap::from([("istio".to_string(), selector.to_string())]),
            servers: servers
                .iter()
                .map(|(number, redirect)| Server {
                    port: ServerPort {
                        number: *number,
                        name: format!("http-{number}"),
                        protocol: "HTTP".to_string(),
                    },
                    hosts: vec!["*".to_string()],
                    tls: redirect.then(|| ServerTLSSettings {
                        https_redirect: true,
                        ..Default::default()
                    }),
                })
                .collect(),
        },
    );
    gw.metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    };
    gw
}
