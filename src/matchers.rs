use k8s_openapi::api::networking::v1::HTTPIngressPath;

use crate::{
    err::{ControllerError, ControllerResult},
    istio::StringMatch,
};

/// Ingress path types the controller distinguishes.
/// Anything else, `ImplementationSpecific` included, is inferred from the path itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    Exact,
    Prefix,
    Unspecified,
}

impl From<&str> for PathType {
    fn from(value: &str) -> Self {
        match value {
            "Exact" => PathType::Exact,
            "Prefix" => PathType::Prefix,
            _ => PathType::Unspecified,
        }
    }
}

/// Builds the URI match for an ingress path. An empty path matches everything,
/// so no match is produced for it.
pub fn path_match(path: &HTTPIngressPath) -> Option<StringMatch> {
    let literal = path.path.as_deref().unwrap_or_default();
    if literal.is_empty() {
        return None;
    }
    match PathType::from(path.path_type.as_str()) {
        PathType::Exact => Some(StringMatch::Exact(literal.to_string())),
        PathType::Prefix => {
            // `/foo` must match `/foo/bar` but not `/foobar`,
            // and the proxy compares prefixes byte by byte.
            let mut prefix = literal.to_string();
            if !prefix.ends_with('/') {
                prefix.push('/');
            }
            Some(StringMatch::Prefix(prefix))
        }
        PathType::Unspecified => Some(inferred_match(literal)),
    }
}

/// Legacy inference for paths without an explicit type:
/// `foo.*` and `foo/*` become prefix matches, anything else is exact.
fn inferred_match(literal: &str) -> StringMatch {
    if let Some(prefix) = literal.strip_suffix(".*") {
        return StringMatch::Prefix(prefix.to_string());
    }
    if literal.ends_with("/*") {
        return StringMatch::Prefix(literal[..literal.len() - 1].to_string());
    }
    StringMatch::Exact(literal.to_string())
}

/// Builds the authority (Host header) matches for `host`.
///
/// Wildcard hosts turn into a single regex. Other hosts get an exact match on
/// the bare host plus one `host:port` match per port, since some clients send
/// the port along in the Host header.
pub fn authority_matches(host: &str, ports: &[u32]) -> ControllerResult<Vec<StringMatch>> {
    if host.contains('*') {
        let pattern = host.replace('.', "\\.").replace('*', ".*");
        regex::Regex::new(&pattern).map_err(|source| ControllerError::InvalidHostPattern {
            host: host.to_string(),
            source,
        })?;
        return Ok(vec![StringMatch::Regex(pattern)]);
    }
    let mut matches = Vec::with_capacity(ports.len() + 1);
    matches.push(StringMatch::Exact(host.to_string()));
    matches.extend(
        ports
            .iter()
            .map(|port| StringMatch::Exact(format!("{host}:{port}"))),
    );
    Ok(matches)
}
