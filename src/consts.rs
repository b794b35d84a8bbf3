/// Name the controller reports itself with, in labels, events and field managers.
pub const CONTROLLER_NAME: &str = "ingress-istio-controller";

pub const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Deprecated class annotation. When set, it takes precedence over
/// `spec.ingressClassName`. The configured ingress class is expected as its value.
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Boolean annotation excluding an ingress from being handled.
pub const IGNORE_ANNOTATION: &str = "ingress.statcan.gc.ca/ignore";

/// Comma separated list of gateways in `<namespace>/<name>` or `<name>` form.
pub const GATEWAYS_ANNOTATION: &str = "ingress.statcan.gc.ca/gateways";

/// Value expected in `IngressClass.spec.controller`.
pub const INGRESS_CLASS_CONTROLLER: &str = "ingress.statcan.gc.ca/ingress-istio-controller";

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const CREATED_BY_LABEL: &str = "app.kubernetes.io/created-by";
pub const VERSION_ANNOTATION: &str = "meta.statcan.gc.ca/version";
