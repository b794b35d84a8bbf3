//! Decides whether the controller handles an ingress.
//!
//! The decision is an ordered table. Class rules are tried first and the
//! first one that applies settles the base verdict; an ingress no class rule
//! applies to is not handled. Narrowing rules then run in order and can only
//! turn a positive verdict into a negative one.

use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;

use crate::{
    cache::{self, Cache},
    consts,
    err::{ControllerError, ControllerResult},
    utils,
};

/// What settled the verdict, mostly for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Legacy class annotation present, takes precedence over the class reference.
    ClassAnnotation(String),
    /// `spec.ingressClassName` pointed at a class with this controller value.
    IngressClass(String),
    /// Neither an annotation nor a class reference.
    NoClass,
    /// The ignore annotation is true.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub eligible: bool,
    pub reason: Reason,
}

pub struct Inputs<'a> {
    pub ingress: &'a Ingress,
    /// Expected value of the legacy class annotation.
    pub ingress_class: &'a str,
    pub cache: &'a Cache,
}

type ClassRule = fn(&Inputs<'_>) -> ControllerResult<Option<Decision>>;
type NarrowingRule = fn(&Inputs<'_>) -> ControllerResult<Option<Reason>>;

const CLASS_RULES: &[ClassRule] = &[class_annotation_rule, ingress_class_rule];
const NARROWING_RULES: &[NarrowingRule] = &[ignore_annotation_rule];

pub fn evaluate(inputs: &Inputs<'_>) -> ControllerResult<Decision> {
    let mut decision = Decision {
        eligible: false,
        reason: Reason::NoClass,
    };
    for rule in CLASS_RULES {
        if let Some(found) = rule(inputs)? {
            decision = found;
            break;
        }
    }
    for rule in NARROWING_RULES {
        if let Some(reason) = rule(inputs)? {
            if decision.eligible {
                decision = Decision {
                    eligible: false,
                    reason,
                };
            }
        }
    }
    Ok(decision)
}

fn class_annotation_rule(inputs: &Inputs<'_>) -> ControllerResult<Option<Decision>> {
    let Some(value) = inputs
        .ingress
        .annotations()
        .get(consts::INGRESS_CLASS_ANNOTATION)
        .filter(|v| !v.is_empty())
    else {
        return Ok(None);
    };
    let eligible = !inputs.ingress_class.is_empty() && value == inputs.ingress_class;
    if eligible {
        tracing::info!(
            "Deprecated annotation {}={} takes precedence over ingressClassName",
            consts::INGRESS_CLASS_ANNOTATION,
            value
        );
    }
    Ok(Some(Decision {
        eligible,
        reason: Reason::ClassAnnotation(value.clone()),
    }))
}

fn ingress_class_rule(inputs: &Inputs<'_>) -> ControllerResult<Option<Decision>> {
    let Some(class_name) = inputs
        .ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.ingress_class_name.as_ref())
    else {
        return Ok(None);
    };
    let class = cache::get(&inputs.cache.ingress_classes, None, class_name).ok_or_else(|| {
        ControllerError::NotFound {
            kind: "IngressClass",
            name: class_name.clone(),
        }
    })?;
    let controller = class
        .spec
        .as_ref()
        .and_then(|spec| spec.controller.as_deref());
    Ok(Some(Decision {
        eligible: controller == Some(consts::INGRESS_CLASS_CONTROLLER),
        reason: Reason::IngressClass(class_name.clone()),
    }))
}

fn ignore_annotation_rule(inputs: &Inputs<'_>) -> ControllerResult<Option<Reason>> {
    let Some(value) = inputs.ingress.annotations().get(consts::IGNORE_ANNOTATION) else {
        return Ok(None);
    };
    let ignored = utils::parse_bool(value).ok_or_else(|| ControllerError::InvalidAnnotation {
        key: consts::IGNORE_ANNOTATION,
        value: value.clone(),
        reason: "expected a boolean".to_string(),
    })?;
    Ok(ignored.then_some(Reason::Ignored))
}
