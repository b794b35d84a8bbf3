//! Point-in-time views of the cluster objects the controller reads.
//!
//! Every read during a reconciliation is served from these reflector stores,
//! never from the API server.

use std::{collections::BTreeMap, fmt::Debug, hash::Hash, sync::Arc};

use futures::StreamExt;
use k8s_openapi::api::{
    core::v1::Service,
    networking::v1::{Ingress, IngressClass},
};
use kube::{
    Api, Client, Resource, ResourceExt,
    runtime::{
        WatchStreamExt,
        reflector::{self, ObjectRef, Store},
        watcher,
    },
};
use serde::de::DeserializeOwned;

use crate::istio::{Gateway, VirtualService};

#[derive(Clone)]
pub struct Cache {
    pub ingresses: Store<Ingress>,
    pub ingress_classes: Store<IngressClass>,
    pub services: Store<Service>,
    pub virtual_services: Store<VirtualService>,
    pub gateways: Store<Gateway>,
}

impl Cache {
    /// Starts reflectors for everything but ingresses,
    /// whose store is owned by the controller.
    pub fn start(client: &Client, ingresses: Store<Ingress>) -> Self {
        Cache {
            ingresses,
            ingress_classes: spawn_reflector(Api::all(client.clone())),
            services: spawn_reflector(Api::all(client.clone())),
            virtual_services: spawn_reflector(Api::all(client.clone())),
            gateways: spawn_reflector(Api::all(client.clone())),
        }
    }

    /// Waits for the initial listing of the reflectors started by [`Cache::start`].
    pub async fn wait_until_ready(&self) -> anyhow::Result<()> {
        self.ingress_classes.wait_until_ready().await?;
        self.services.wait_until_ready().await?;
        self.virtual_services.wait_until_ready().await?;
        self.gateways.wait_until_ready().await?;
        Ok(())
    }
}

fn spawn_reflector<K>(api: Api<K>) -> Store<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    let (reader, writer) = reflector::store();
    let kind = K::kind(&K::DynamicType::default()).to_string();
    let stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .for_each(move |res| {
            if let Err(err) = res {
                tracing::warn!("{kind} watch failed: {err}");
            }
            futures::future::ready(())
        });
    tokio::spawn(stream);
    reader
}

/// Looks up a single object. `namespace` is `None` for cluster scoped kinds.
pub fn get<K>(store: &Store<K>, namespace: Option<&str>, name: &str) -> Option<Arc<K>>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    let mut key = ObjectRef::new(name);
    if let Some(namespace) = namespace {
        key = key.within(namespace);
    }
    store.get(&key)
}

/// Lists objects whose labels contain every pair of `selector`,
/// within `namespace` or across all namespaces.
///
/// Results are ordered by namespace and name.
pub fn list<K>(
    store: &Store<K>,
    namespace: Option<&str>,
    selector: &BTreeMap<String, String>,
) -> Vec<Arc<K>>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    let mut objects = store
        .state()
        .into_iter()
        .filter(|obj| namespace.is_none() || obj.namespace().as_deref() == namespace)
        .filter(|obj| {
            let labels = obj.labels();
            selector.iter().all(|(k, v)| labels.get(k) == Some(v))
        })
        .collect::<Vec<_>>();
    objects.sort_by_key(|obj| (obj.namespace(), obj.name_any()));
    objects
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::test_utils::{CacheBuilder, service};

    use super::*;

    #[test]
    fn get_is_namespace_aware() {
        let cache = CacheBuilder::default()
            .service(service("a", "svc", &[], &[]))
            .build();
        assert!(get(&cache.services, Some("a"), "svc").is_some());
        assert!(get(&cache.services, Some("b"), "svc").is_none());
    }

    #[test]
    fn list_filters_by_selector_and_namespace() {
        let mut gw_labels = BTreeMap::new();
        gw_labels.insert("istio".to_string(), "ingressgateway".to_string());
        let gw = [("istio", "ingressgateway")];
        let extra = [("istio", "ingressgateway"), ("x", "y")];
        let pilot = [("istio", "pilot")];
        let cache = CacheBuilder::default()
            .service(service("istio-system", "gw", &gw, &[]))
            .service(service("other", "gw", &extra, &[]))
            .service(service("istio-system", "unrelated", &pilot, &[]))
            .build();

        let all = list(&cache.services, None, &gw_labels);
        assert_eq!(
            all.iter().map(|s| s.namespace().unwrap()).collect::<Vec<_>>(),
            vec!["istio-system", "other"]
        );
        let scoped = list(&cache.services, Some("istio-system"), &gw_labels);
        assert_eq!(scoped.len(), 1);
        assert_eq!(list(&cache.services, None, &BTreeMap::new()).len(), 3);
    }
}
