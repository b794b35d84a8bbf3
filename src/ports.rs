use k8s_openapi::api::networking::v1::IngressServiceBackend;

use crate::{
    cache::{self, Cache},
    err::{ControllerError, ControllerResult},
};

/// Resolves the numeric port of a backend. Numbered ports are returned as is,
/// named ports are looked up on the service in `namespace`.
pub fn resolve_service_port(
    cache: &Cache,
    namespace: &str,
    backend: &IngressServiceBackend,
) -> ControllerResult<u32> {
    let port_def = backend.port.as_ref();
    if let Some(number) = port_def.and_then(|p| p.number).filter(|n| *n > 0) {
        return Ok(number as u32);
    }
    let Some(port_name) = port_def
        .and_then(|p| p.name.as_ref())
        .filter(|n| !n.is_empty())
    else {
        return Err(ControllerError::UnsupportedBackend(format!(
            "service {} has neither a port number nor a port name",
            backend.name
        )));
    };

    let svc = cache::get(&cache.services, Some(namespace), &backend.name).ok_or_else(|| {
        ControllerError::NotFound {
            kind: "Service",
            name: format!("{namespace}/{}", backend.name),
        }
    })?;
    svc.spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| {
            ports
                .iter()
                .find(|port| port.name.as_ref() == Some(port_name))
        })
        .map(|port| port.port as u32)
        .ok_or_else(|| {
            tracing::warn!("Service {} has no port named {port_name}", backend.name);
            ControllerError::UnknownPortName {
                service: format!("{namespace}/{}", backend.name),
                port: port_name.clone(),
            }
        })
}
