use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    Resource, ResourceExt,
    runtime::{
        controller::Action,
        events::{Event, EventType},
    },
};

use crate::{
    cache,
    ctx::Context,
    eligibility::{self, Inputs},
    err::{ControllerError, ControllerResult},
    istio::VirtualService,
    status,
    translate::{self, Translator, object_key},
    utils::ObjectMetaControllerExt,
};

/// What a reconciliation pass did with an ingress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The ingress was deleted before it could be processed.
    Gone,
    /// Not handled by this controller, nothing to remove.
    Skipped,
    /// Not handled anymore, its VirtualService was deleted.
    Removed,
    Created,
    Updated,
    Unchanged,
}

/// Per-key exponential backoff for failed reconciliations.
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(Duration::from_millis(5), Duration::from_secs(1000))
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Backoff {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Records a failure of `key` and returns how long to wait before retrying it.
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(key.to_string()).or_insert(0);
        let exp = (*count).min(31);
        *count += 1;
        self.base.saturating_mul(2u32.pow(exp)).min(self.max)
    }

    /// Clears the failure history of `key`.
    pub fn forget(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Drops the failure history of every key `keep` rejects.
    pub fn retain(&self, keep: impl Fn(&str) -> bool) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| keep(key));
    }
}

fn is_cached(ctx: &Context, key: &str) -> bool {
    let Some((namespace, name)) = key.split_once('/') else {
        return false;
    };
    cache::get(&ctx.cache.ingresses, Some(namespace), name).is_some()
}

/// Deleted ingresses are never reconciled again, so their failure history
/// is dropped here.
fn forget_deleted(ctx: &Context) {
    ctx.backoff.retain(|key| is_cached(ctx, key));
}

async fn record(ctx: &Context, ingress: &Ingress, type_: EventType, reason: &str, note: String) {
    let event = Event {
        type_,
        reason: reason.to_string(),
        note: Some(note),
        action: "Reconcile".to_string(),
        secondary: None,
    };
    if let Err(err) = ctx.writer.publish_event(ingress, event).await {
        tracing::warn!("Failed to publish {reason} event: {err}");
    }
}

/// Reconciles the ingress `namespace/name` against the cache.
pub async fn sync_ingress(ctx: &Context, namespace: &str, name: &str) -> ControllerResult<Outcome> {
    let Some(ingress) = cache::get(&ctx.cache.ingresses, Some(namespace), name) else {
        tracing::info!("Ingress {namespace}/{name} no longer exists");
        return Ok(Outcome::Gone);
    };
    let existing = cache::get(&ctx.cache.virtual_services, Some(namespace), name);

    let decision = eligibility::evaluate(&Inputs {
        ingress: &ingress,
        ingress_class: &ctx.args.ingress_class,
        cache: &ctx.cache,
    })?;
    tracing::debug!("Eligibility: {decision:?}");
    if !decision.eligible {
        return relinquish(ctx, &ingress, existing.as_deref()).await;
    }

    let gateway_ids = translate::gateway_ids(&ingress, &ctx.args.default_gateway);
    let translator = Translator {
        cache: &ctx.cache,
        args: &ctx.args,
    };
    let desired = match translator.virtual_service(&ingress, existing.as_deref(), &gateway_ids) {
        Ok(desired) => desired,
        Err(err @ ControllerError::Conflict(..)) => {
            record(
                ctx,
                &ingress,
                EventType::Warning,
                "AdoptionConflict",
                err.to_string(),
            )
            .await;
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    let (vs, outcome) = match existing {
        None => {
            let created = ctx.writer.create_virtual_service(&desired).await?;
            tracing::info!("Created VirtualService {}", object_key(&created));
            record(
                ctx,
                &ingress,
                EventType::Normal,
                "Created",
                format!("Created VirtualService {}", object_key(&created)),
            )
            .await;
            (created, Outcome::Created)
        }
        Some(existing) if differs(&existing, &desired) => {
            tracing::info!("Updating VirtualService {}", object_key(existing.as_ref()));
            let mut updated = existing.as_ref().clone();
            updated.metadata.labels = desired.metadata.labels;
            updated.metadata.annotations = desired.metadata.annotations;
            updated.spec = desired.spec;
            let updated = ctx.writer.update_virtual_service(&updated).await?;
            record(
                ctx,
                &ingress,
                EventType::Normal,
                "Updated",
                format!("Updated VirtualService {}", object_key(&updated)),
            )
            .await;
            (updated, Outcome::Updated)
        }
        Some(existing) => (existing.as_ref().clone(), Outcome::Unchanged),
    };

    status::sync_ingress_status(ctx, &ingress, &vs).await?;
    Ok(outcome)
}

fn differs(existing: &VirtualService, desired: &VirtualService) -> bool {
    existing.metadata.labels != desired.metadata.labels
        || existing.metadata.annotations != desired.metadata.annotations
        || existing.spec != desired.spec
}

async fn relinquish(
    ctx: &Context,
    ingress: &Ingress,
    existing: Option<&VirtualService>,
) -> ControllerResult<Outcome> {
    match existing {
        Some(vs) if vs.meta().is_controlled_by(ingress) => {
            let key = object_key(vs);
            tracing::info!("Removing owned VirtualService {key}");
            ctx.writer
                .delete_virtual_service(&vs.namespace().unwrap_or_default(), &vs.name_any())
                .await?;
            record(
                ctx,
                ingress,
                EventType::Normal,
                "Removed",
                format!("Removed VirtualService {key}, the ingress is no longer handled"),
            )
            .await;
            Ok(Outcome::Removed)
        }
        _ => {
            tracing::info!("Skipping ingress {}", object_key(ingress));
            record(
                ctx,
                ingress,
                EventType::Normal,
                "Skipped",
                "Ingress is not handled by this controller".to_string(),
            )
            .await;
            Ok(Outcome::Skipped)
        }
    }
}

#[tracing::instrument(skip(ingress, ctx), fields(ingress = ingress.name_any(), namespace = ingress.namespace()), err)]
pub async fn reconcile(ingress: Arc<Ingress>, ctx: Arc<Context>) -> ControllerResult<Action> {
    if !ctx.is_leader.load(std::sync::atomic::Ordering::Relaxed) {
        tracing::debug!("Not a leader, skipping reconciliation");
        return Ok(Action::requeue(Duration::from_secs(20)));
    }
    let namespace = ingress
        .namespace()
        .ok_or(ControllerError::MissingField("metadata.namespace"))?;
    let key = object_key(ingress.as_ref());

    let outcome = sync_ingress(&ctx, &namespace, &ingress.name_any()).await?;
    ctx.backoff.forget(&key);
    forget_deleted(&ctx);
    tracing::info!("Successfully synced {key}: {outcome:?}");

    Ok(match outcome {
        Outcome::Gone | Outcome::Skipped | Outcome::Removed => Action::await_change(),
        Outcome::Created | Outcome::Updated | Outcome::Unchanged => {
            Action::requeue(Duration::from_secs(ctx.args.resync_interval))
        }
    })
}

#[tracing::instrument(skip(ingress, err, ctx), fields(ingress = ingress.name_any()))]
pub fn on_error(ingress: Arc<Ingress>, err: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = object_key(ingress.as_ref());
    forget_deleted(&ctx);
    if !is_cached(&ctx, &key) {
        tracing::warn!("Error syncing {key}: {err}, the ingress is gone");
        return Action::await_change();
    }
    let delay = ctx.backoff.next_delay(&key);
    tracing::error!(kind = ?err.kind(), "Error syncing {key}: {err}, requeuing in {delay:?}");
    Action::requeue(delay)
}
