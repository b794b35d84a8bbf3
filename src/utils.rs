use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt, api::ObjectMeta};

use crate::err::{ControllerError, ControllerResult};

pub trait ObjectMetaControllerExt: Default {
    /// Sets `owner` as the managing controller of this object.
    fn set_controller_owner<T>(&mut self, owner: &T) -> ControllerResult<()>
    where
        T: Resource<DynamicType = ()>;

    /// Whether the controller reference points at `owner`, compared by kind and uid.
    fn is_controlled_by<T>(&self, owner: &T) -> bool
    where
        T: Resource<DynamicType = ()>;
}

impl ObjectMetaControllerExt for ObjectMeta {
    fn set_controller_owner<T>(&mut self, owner: &T) -> ControllerResult<()>
    where
        T: Resource<DynamicType = ()>,
    {
        let uid = owner
            .meta()
            .uid
            .clone()
            .ok_or(ControllerError::MissingField("metadata.uid"))?;
        let mut owners = self.owner_references.take().unwrap_or_default();
        // Only one controller reference is allowed.
        owners.retain(|o| o.controller != Some(true));
        owners.push(OwnerReference {
            api_version: String::from(T::api_version(&())),
            kind: String::from(T::kind(&())),
            name: owner.name_any(),
            uid,
            controller: Some(true),
            block_owner_deletion: Some(true),
        });
        self.owner_references = Some(owners);
        Ok(())
    }

    fn is_controlled_by<T>(&self, owner: &T) -> bool
    where
        T: Resource<DynamicType = ()>,
    {
        let Some(uid) = owner.meta().uid.as_ref() else {
            return false;
        };
        self.owner_references
            .iter()
            .flatten()
            .find(|o| o.controller == Some(true))
            .is_some_and(|o| o.kind == T::kind(&()) && &o.uid == uid)
    }
}

/// Splits a comma separated annotation value, trimming each item.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .collect()
}

/// Parses a boolean the same way Kubernetes tooling does for annotations.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::networking::v1::Ingress;
    use rstest::rstest;

    use super::*;

    fn ingress(uid: Option<&str>) -> Ingress {
        Ingress {
            metadata: ObjectMeta {
                name: Some("test-ing".to_string()),
                namespace: Some("test-ns".to_string()),
                uid: uid.map(String::from),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn controller_owner_roundtrip() {
        let owner = ingress(Some("uid-1"));
        let mut meta = ObjectMeta::default();
        meta.set_controller_owner(&owner).unwrap();

        let refs = meta.owner_references.as_ref().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, "Ingress");
        assert_eq!(refs[0].api_version, "networking.k8s.io/v1");
        assert!(meta.is_controlled_by(&owner));
        assert!(!meta.is_controlled_by(&ingress(Some("uid-2"))));
    }

    #[test]
    fn owner_without_uid_is_rejected() {
        let mut meta = ObjectMeta::default();
        let err = meta.set_controller_owner(&ingress(None)).unwrap_err();
        assert!(matches!(err, ControllerError::MissingField(_)));
    }

    #[test]
    fn non_controller_reference_doesnt_count() {
        let owner = ingress(Some("uid-1"));
        let meta = ObjectMeta {
            owner_references: Some(vec![OwnerReference {
                api_version: "networking.k8s.io/v1".to_string(),
                kind: "Ingress".to_string(),
                name: "test-ing".to_string(),
                uid: "uid-1".to_string(),
                controller: None,
                block_owner_deletion: None,
            }]),
            ..Default::default()
        };
        assert!(!meta.is_controlled_by(&owner));
    }

    #[rstest]
    #[case("true", Some(true))]
    #[case("T", Some(true))]
    #[case("0", Some(false))]
    #[case("False", Some(false))]
    #[case("yes", None)]
    #[case("", None)]
    fn bools(#[case] raw: &str, #[case] expected: Option<bool>) {
        assert_eq!(parse_bool(raw), expected);
    }

    #[rstest]
    #[case("a/b", vec!["a/b"])]
    #[case("a/b, c", vec!["a/b", "c"])]
    #[case("a,", vec!["a", ""])]
    fn lists(#[case] raw: &str, #[case] expected: Vec<&str>) {
        assert_eq!(split_list(raw), expected);
    }
}
