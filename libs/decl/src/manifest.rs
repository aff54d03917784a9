//! TOML manifest loading.
//!
//! A stack manifest declares the resources of one deployment:
//!
//! ```toml
//! [stack]
//! name = "eks-prod"
//!
//! [[resource]]
//! name = "roleA"
//! kind = "iam-role"
//! depends_on = []
//!
//! [resource.properties]
//! assume_role_policy = "..."
//! ```
//!
//! String properties may carry `${config.<key>}` placeholders, filled
//! from the run's configuration surface (e.g. `cidr_allow_list`)
//! before reference scanning, and `${resource.output}` markers that
//! become data dependencies.

use std::collections::BTreeMap;

use serde::Deserialize;
use stratus_id::ResourceName;

use crate::{Declaration, DeclError, ResolveConflicts, ResourceDecl};

#[derive(Debug, Deserialize)]
struct ManifestDoc {
    stack: StackSection,
    #[serde(default)]
    resource: Vec<ResourceSection>,
}

#[derive(Debug, Deserialize)]
struct StackSection {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResourceSection {
    name: String,
    kind: String,
    #[serde(default)]
    properties: toml::Table,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    resolve_conflicts: ResolveConflicts,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Parse a manifest from TOML text, substituting `${config.*}` values.
pub fn load_manifest_str(
    contents: &str,
    config: &BTreeMap<String, String>,
) -> Result<Declaration, DeclError> {
    let doc: ManifestDoc = toml::from_str(contents)?;

    if doc.stack.name.trim().is_empty() {
        return Err(DeclError::InvalidManifest(
            "stack.name cannot be empty".to_string(),
        ));
    }

    let mut decls = Vec::with_capacity(doc.resource.len());
    for section in doc.resource {
        let name = ResourceName::parse(&section.name)?;
        if section.kind.trim().is_empty() {
            return Err(DeclError::InvalidManifest(format!(
                "resource '{}' has an empty kind",
                name
            )));
        }

        let properties = serde_json::to_value(&section.properties)
            .map_err(|e| DeclError::InvalidManifest(e.to_string()))?;
        let properties = substitute_config(&name, properties, config)?;

        let depends_on = section
            .depends_on
            .iter()
            .map(|d| ResourceName::parse(d))
            .collect::<Result<Vec<_>, _>>()?;

        decls.push(ResourceDecl {
            name,
            kind: section.kind,
            properties,
            depends_on,
            resolve_conflicts: section.resolve_conflicts,
            timeout_secs: section.timeout_secs,
        });
    }

    Declaration::new(doc.stack.name, decls)
}

/// Replace `${config.<key>}` placeholders throughout a value tree.
fn substitute_config(
    resource: &ResourceName,
    value: serde_json::Value,
    config: &BTreeMap<String, String>,
) -> Result<serde_json::Value, DeclError> {
    match value {
        serde_json::Value::String(s) => {
            Ok(serde_json::Value::String(substitute_config_str(
                resource, &s, config,
            )?))
        }
        serde_json::Value::Array(arr) => {
            let out: Result<Vec<_>, _> = arr
                .into_iter()
                .map(|v| substitute_config(resource, v, config))
                .collect();
            Ok(serde_json::Value::Array(out?))
        }
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, substitute_config(resource, v, config)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        other => Ok(other),
    }
}

fn substitute_config_str(
    resource: &ResourceName,
    s: &str,
    config: &BTreeMap<String, String>,
) -> Result<String, DeclError> {
    const PREFIX: &str = "${config.";

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find(PREFIX) {
        out.push_str(&rest[..start]);
        let after = &rest[start + PREFIX.len()..];
        let Some(end) = after.find('}') else {
            return Err(DeclError::BadReference {
                marker: rest[start..].to_string(),
                reason: "unterminated config placeholder".to_string(),
            });
        };
        let key = &after[..end];
        let Some(value) = config.get(key) else {
            return Err(DeclError::UnknownConfigKey {
                resource: resource.to_string(),
                key: key.to_string(),
            });
        };
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
        [stack]
        name = "demo"

        [[resource]]
        name = "roleA"
        kind = "iam-role"

        [resource.properties]
        assume_role_policy = "ec2.amazonaws.com"

        [[resource]]
        name = "clusterB"
        kind = "cluster"
        depends_on = ["roleA"]
        timeout_secs = 1800

        [resource.properties]
        role_arn = "${roleA.arn}"
        public_access_cidrs = ["${config.cidr_allow_list}"]
    "#;

    fn config() -> BTreeMap<String, String> {
        BTreeMap::from([("cidr_allow_list".to_string(), "10.0.0.0/8".to_string())])
    }

    #[test]
    fn test_load_manifest() {
        let decl = load_manifest_str(MANIFEST, &config()).unwrap();
        assert_eq!(decl.stack, "demo");
        assert_eq!(decl.len(), 2);

        let cluster = decl
            .get(&ResourceName::parse("clusterB").unwrap())
            .unwrap();
        assert_eq!(cluster.kind, "cluster");
        assert_eq!(cluster.timeout_secs, Some(1800));
        assert_eq!(cluster.depends_on.len(), 1);
        assert_eq!(
            cluster.properties["public_access_cidrs"],
            serde_json::json!(["10.0.0.0/8"])
        );
        // Reference markers survive config substitution untouched.
        assert_eq!(
            cluster.properties["role_arn"],
            serde_json::json!("${roleA.arn}")
        );
    }

    #[test]
    fn test_unknown_config_key() {
        let err = load_manifest_str(MANIFEST, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, DeclError::UnknownConfigKey { .. }));
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let manifest = r#"
            [stack]
            name = "demo"

            [[resource]]
            name = "a"
            kind = "iam-role"

            [[resource]]
            name = "a"
            kind = "iam-role"
        "#;
        let err = load_manifest_str(manifest, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, DeclError::DuplicateResource(_)));
    }

    #[test]
    fn test_empty_kind_rejected() {
        let manifest = r#"
            [stack]
            name = "demo"

            [[resource]]
            name = "a"
            kind = ""
        "#;
        assert!(load_manifest_str(manifest, &BTreeMap::new()).is_err());
    }
}
