//! Translation of an ingress into the VirtualService that implements it.

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{HTTPIngressPath, Ingress};
use kube::{Resource, ResourceExt, api::ObjectMeta};

use crate::{
    args::ControllerArgs,
    cache::Cache,
    consts,
    err::{ControllerError, ControllerResult},
    gateways,
    istio::{
        Destination, HTTPMatchRequest, HTTPRoute, HTTPRouteDestination, PortSelector,
        VirtualService, VirtualServiceSpec,
    },
    matchers, ports,
    utils::{self, ObjectMetaControllerExt},
};

pub struct Translator<'a> {
    pub cache: &'a Cache,
    pub args: &'a ControllerArgs,
}

/// `namespace/name` of an object, for messages.
pub fn object_key<K: Resource>(obj: &K) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Gateways to attach: the override annotation if present, else the default gateway.
pub fn gateway_ids(ingress: &Ingress, default_gateway: &str) -> Vec<String> {
    match ingress.annotations().get(consts::GATEWAYS_ANNOTATION) {
        Some(value) => {
            let ids = utils::split_list(value);
            tracing::info!("Using override gateways: {ids:?}");
            ids
        }
        None => vec![default_gateway.to_string()],
    }
}

/// Labels and annotations of the generated object.
///
/// Existing values are kept, the ingress's own values override them and the
/// controller identity overrides everything.
pub fn object_metadata(
    ingress: &Ingress,
    existing: Option<&VirtualService>,
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut labels = existing.map(|vs| vs.labels().clone()).unwrap_or_default();
    let mut annotations = existing
        .map(|vs| vs.annotations().clone())
        .unwrap_or_default();

    labels.extend(ingress.labels().clone());
    annotations.extend(ingress.annotations().clone());

    labels.insert(
        consts::MANAGED_BY_LABEL.to_string(),
        consts::CONTROLLER_NAME.to_string(),
    );
    labels.insert(
        consts::CREATED_BY_LABEL.to_string(),
        consts::CONTROLLER_NAME.to_string(),
    );
    annotations.insert(
        consts::VERSION_ANNOTATION.to_string(),
        consts::CONTROLLER_VERSION.to_string(),
    );
    (labels, annotations)
}

impl Translator<'_> {
    /// Builds the desired VirtualService for `ingress`.
    ///
    /// The first invalid rule fails the whole ingress. An `existing` object
    /// must be controlled by the ingress.
    pub fn virtual_service(
        &self,
        ingress: &Ingress,
        existing: Option<&VirtualService>,
        gateway_ids: &[String],
    ) -> ControllerResult<VirtualService> {
        let ingress_key = object_key(ingress);
        let namespace = ingress
            .namespace()
            .ok_or(ControllerError::MissingField("metadata.namespace"))?;
        if let Some(existing) = existing {
            if !existing.meta().is_controlled_by(ingress) {
                return Err(ControllerError::Conflict(object_key(existing), ingress_key));
            }
        }

        let (labels, annotations) = object_metadata(ingress, existing);
        let mut metadata = ObjectMeta {
            name: Some(ingress.name_any()),
            namespace: Some(namespace.clone()),
            labels: Some(labels),
            annotations: Some(annotations),
            ..Default::default()
        };
        metadata.set_controller_owner(ingress)?;

        let attached = gateways::gateways_by_name(self.cache, gateway_ids, &namespace)?;
        let ports = gateways::non_redirect_ports(&attached);

        let mut spec = VirtualServiceSpec {
            gateways: gateway_ids.to_vec(),
            hosts: vec![],
            http: vec![],
        };
        let rules = ingress
            .spec
            .as_ref()
            .and_then(|spec| spec.rules.as_ref())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for rule in rules {
            let Some(http) = &rule.http else {
                return Err(ControllerError::MissingHttp(ingress_key));
            };
            let host = match rule.host.as_deref() {
                None | Some("") => "*",
                Some(host) => host,
            };
            if !spec.hosts.iter().any(|h| h == host) {
                spec.hosts.push(host.to_string());
            }
            for path in &http.paths {
                spec.http
                    .extend(self.routes_for_path(&namespace, host, path, &ports)?);
            }
        }

        Ok(VirtualService { metadata, spec })
    }

    fn routes_for_path(
        &self,
        namespace: &str,
        host: &str,
        path: &HTTPIngressPath,
        ports: &[u32],
    ) -> ControllerResult<Vec<HTTPRoute>> {
        let Some(backend) = &path.backend.service else {
            return Err(ControllerError::UnsupportedBackend(
                "only service backends are supported".to_string(),
            ));
        };
        let port = ports::resolve_service_port(self.cache, namespace, backend)?;
        let uri = matchers::path_match(path);
        let destination = HTTPRouteDestination {
            destination: Destination {
                host: format!(
                    "{}.{namespace}.svc.{}",
                    backend.name, self.args.cluster_domain
                ),
                port: Some(PortSelector { number: port }),
            },
            weight: Some(self.args.default_weight),
        };

        Ok(matchers::authority_matches(host, ports)?
            .into_iter()
            .map(|authority| HTTPRoute {
                r#match: vec![HTTPMatchRequest {
                    authority: Some(authority),
                    uri: uri.clone(),
                }],
                route: vec![destination.clone()],
            })
            .collect())
    }
}
