#[derive(clap::Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
/// Ingress to Istio controller.
///
/// Watches ingresses and keeps an Istio VirtualService in sync
/// with each one it handles, reflecting the gateway's load balancer
/// addresses back onto the ingress status.
pub struct ControllerArgs {
    /// Cluster domain used to build destination FQDNs.
    #[arg(long, default_value = "cluster.local", env = "IIC_CLUSTER_DOMAIN")]
    pub cluster_domain: String,

    /// Gateway attached to generated VirtualServices unless
    /// the ingress overrides it with the gateways annotation.
    #[arg(
        long,
        default_value = "istio-system/istio-autogenerated-k8s-ingress",
        env = "IIC_DEFAULT_GATEWAY"
    )]
    pub default_gateway: String,

    /// Only look for a gateway's backing services in the gateway's namespace.
    #[arg(long, env = "IIC_SCOPED_GATEWAYS", default_value_t = false)]
    pub scoped_gateways: bool,

    // Value of the legacy `kubernetes.io/ingress.class` annotation
    // that opts an ingress in.
    #[arg(long, default_value = "istio", env = "IIC_INGRESS_CLASS")]
    pub ingress_class: String,

    /// Weight given to every route destination.
    #[arg(long, default_value_t = 100, env = "IIC_DEFAULT_WEIGHT")]
    pub default_weight: i32,

    /// Number of ingresses reconciled concurrently.
    #[arg(long, default_value_t = 2, env = "IIC_WORKERS")]
    pub workers: u16,

    /// Seconds between periodic reconciliations of a handled ingress.
    ///
    /// Load balancer addresses of gateway services don't trigger a
    /// reconciliation by themselves, this interval picks them up.
    #[arg(long, default_value_t = 30, env = "IIC_RESYNC_INTERVAL")]
    pub resync_interval: u64,

    /// Whether only the holder of the lease reconciles.
    #[arg(long, env = "IIC_LEADER_ELECTION", default_value_t = true, action = clap::ArgAction::Set)]
    pub leader_election: bool,

    /// Name of the lease used for leader election.
    #[arg(
        long,
        default_value = "ingress-istio-controller-lock",
        env = "IIC_LEASE_NAME"
    )]
    pub lease_name: String,

    /// Log level for the controller.
    #[arg(long, env = "IIC_LOG_LEVEL", default_value_t = tracing::level_filters::LevelFilter::INFO)]
    pub log_level: tracing::level_filters::LevelFilter,
}
