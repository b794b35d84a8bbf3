//! Writes against the API server.
//!
//! Reconciliation only writes through [`ClusterWriter`], so tests can swap the
//! API server for a mock.

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::{Ingress, IngressLoadBalancerStatus};
use kube::{
    Api, Client, Resource, ResourceExt,
    api::{DeleteParams, Patch, PatchParams, PostParams},
    runtime::events::{Event, Recorder, Reporter},
};
use serde_json::json;

use crate::{consts, err::ControllerResult, istio::VirtualService};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterWriter: Send + Sync {
    async fn create_virtual_service(
        &self,
        vs: &VirtualService,
    ) -> ControllerResult<VirtualService>;

    /// Replaces a stored VirtualService. `vs` must carry the stored resource version.
    async fn update_virtual_service(
        &self,
        vs: &VirtualService,
    ) -> ControllerResult<VirtualService>;

    async fn delete_virtual_service(&self, namespace: &str, name: &str) -> ControllerResult<()>;

    /// Writes the status subresource only.
    async fn update_ingress_status(
        &self,
        namespace: &str,
        name: &str,
        status: &IngressLoadBalancerStatus,
    ) -> ControllerResult<Ingress>;

    /// Attaches an audit event to the ingress.
    async fn publish_event(&self, ingress: &Ingress, event: Event) -> ControllerResult<()>;
}

pub struct KubeWriter {
    client: Client,
    recorder: Recorder,
}

impl KubeWriter {
    pub fn new(client: Client, hostname: &str) -> Self {
        let reporter = Reporter {
            controller: consts::CONTROLLER_NAME.to_string(),
            instance: Some(hostname.to_string()),
        };
        KubeWriter {
            recorder: Recorder::new(client.clone(), reporter),
            client,
        }
    }

    fn virtual_services(&self, namespace: &str) -> Api<VirtualService> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(consts::CONTROLLER_NAME.to_string()),
            ..PostParams::default()
        }
    }
}

#[async_trait]
impl ClusterWriter for KubeWriter {
    async fn create_virtual_service(
        &self,
        vs: &VirtualService,
    ) -> ControllerResult<VirtualService> {
        let namespace = vs.namespace().unwrap_or_default();
        Ok(self
            .virtual_services(&namespace)
            .create(&Self::post_params(), vs)
            .await?)
    }

    async fn update_virtual_service(
        &self,
        vs: &VirtualService,
    ) -> ControllerResult<VirtualService> {
        let namespace = vs.namespace().unwrap_or_default();
        Ok(self
            .virtual_services(&namespace)
            .replace(&vs.name_any(), &Self::post_params(), vs)
            .await?)
    }

    async fn delete_virtual_service(&self, namespace: &str, name: &str) -> ControllerResult<()> {
        self.virtual_services(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn update_ingress_status(
        &self,
        namespace: &str,
        name: &str,
        status: &IngressLoadBalancerStatus,
    ) -> ControllerResult<Ingress> {
        let patch = json!({
            "status": {
                "loadBalancer": {
                    "ingress": status.ingress.clone().unwrap_or_default()
                }
            }
        });
        Ok(Api::<Ingress>::namespaced(self.client.clone(), namespace)
            .patch_status(
                name,
                &PatchParams {
                    field_manager: Some(consts::CONTROLLER_NAME.to_string()),
                    ..PatchParams::default()
                },
                &Patch::Merge(patch),
            )
            .await?)
    }

    async fn publish_event(&self, ingress: &Ingress, event: Event) -> ControllerResult<()> {
        self.recorder
            .publish(&event, &ingress.object_ref(&()))
            .await?;
        Ok(())
    }
}
