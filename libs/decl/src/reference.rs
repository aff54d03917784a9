//! Reference markers inside property values.
//!
//! A property string may embed `${<resource>.<output>}` markers. A
//! string consisting of exactly one marker resolves to the referenced
//! output value with its JSON type intact; a marker embedded in a
//! longer string interpolates the output's string form.

use stratus_id::ResourceName;

use crate::DeclError;

/// A reference from one resource's property to another's output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    /// The resource whose output is referenced.
    pub resource: ResourceName,
    /// The output name on that resource.
    pub output: String,
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${{{}.{}}}", self.resource, self.output)
    }
}

/// One parsed segment of a string property.
enum Segment<'a> {
    Literal(&'a str),
    Marker(Reference),
}

/// Split a string into literal and marker segments.
///
/// Malformed markers (unterminated `${`, missing `.`) are errors:
/// silently treating them as literals would hide typos until apply
/// time.
fn segments(s: &str) -> Result<Vec<Segment<'_>>, DeclError> {
    let mut out = Vec::new();
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        if start > 0 {
            out.push(Segment::Literal(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(DeclError::BadReference {
                marker: rest[start..].to_string(),
                reason: "unterminated marker, expected '}'".to_string(),
            });
        };
        let inner = &after[..end];
        let Some((name, output)) = inner.split_once('.') else {
            return Err(DeclError::BadReference {
                marker: format!("${{{inner}}}"),
                reason: "expected '<resource>.<output>'".to_string(),
            });
        };
        if output.is_empty() {
            return Err(DeclError::BadReference {
                marker: format!("${{{inner}}}"),
                reason: "output name is empty".to_string(),
            });
        }
        let resource = ResourceName::parse(name).map_err(|e| DeclError::BadReference {
            marker: format!("${{{inner}}}"),
            reason: e.to_string(),
        })?;
        out.push(Segment::Marker(Reference {
            resource,
            output: output.to_string(),
        }));
        rest = &after[end + 1..];
    }

    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    Ok(out)
}

/// Collect every reference marker inside a property value tree.
pub fn collect_references(value: &serde_json::Value) -> Result<Vec<Reference>, DeclError> {
    let mut refs = Vec::new();
    collect_into(value, &mut refs)?;
    Ok(refs)
}

fn collect_into(value: &serde_json::Value, refs: &mut Vec<Reference>) -> Result<(), DeclError> {
    match value {
        serde_json::Value::String(s) => {
            for seg in segments(s)? {
                if let Segment::Marker(r) = seg {
                    refs.push(r);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for v in arr {
                collect_into(v, refs)?;
            }
        }
        serde_json::Value::Object(map) => {
            for v in map.values() {
                collect_into(v, refs)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Resolve every marker in a property value tree using `lookup`.
///
/// `lookup` must return a value for every reference; the scheduler
/// guarantees this by never dispatching a node before its producers
/// are ready. A `None` here is therefore an internal error surfaced
/// as [`DeclError::BadReference`].
pub fn resolve_value<F>(value: &serde_json::Value, lookup: &F) -> Result<serde_json::Value, DeclError>
where
    F: Fn(&Reference) -> Option<serde_json::Value>,
{
    match value {
        serde_json::Value::String(s) => resolve_string(s, lookup),
        serde_json::Value::Array(arr) => {
            let out: Result<Vec<_>, _> = arr.iter().map(|v| resolve_value(v, lookup)).collect();
            Ok(serde_json::Value::Array(out?))
        }
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_value(v, lookup)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_string<F>(s: &str, lookup: &F) -> Result<serde_json::Value, DeclError>
where
    F: Fn(&Reference) -> Option<serde_json::Value>,
{
    let segs = segments(s)?;

    // A string that is exactly one marker keeps the output's JSON type.
    if let [Segment::Marker(r)] = segs.as_slice() {
        return lookup(r).ok_or_else(|| DeclError::BadReference {
            marker: r.to_string(),
            reason: "referenced output is unresolved".to_string(),
        });
    }

    let mut out = String::with_capacity(s.len());
    for seg in segs {
        match seg {
            Segment::Literal(lit) => out.push_str(lit),
            Segment::Marker(r) => {
                let v = lookup(&r).ok_or_else(|| DeclError::BadReference {
                    marker: r.to_string(),
                    reason: "referenced output is unresolved".to_string(),
                })?;
                match v {
                    serde_json::Value::String(s) => out.push_str(&s),
                    other => out.push_str(&other.to_string()),
                }
            }
        }
    }
    Ok(serde_json::Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ResourceName {
        ResourceName::parse(s).unwrap()
    }

    #[test]
    fn test_collect_nested_references() {
        let v = serde_json::json!({
            "role_arn": "${roleA.arn}",
            "subject": "system:serviceaccount:${clusterB.oidc_provider_url}:sa",
            "list": [{"inner": "${roleA.name}"}],
            "plain": 42,
        });
        let mut refs = collect_references(&v).unwrap();
        refs.sort();
        assert_eq!(
            refs,
            vec![
                Reference { resource: name("clusterB"), output: "oidc_provider_url".into() },
                Reference { resource: name("roleA"), output: "arn".into() },
                Reference { resource: name("roleA"), output: "name".into() },
            ]
        );
    }

    #[test]
    fn test_malformed_markers_rejected() {
        for bad in ["${unterminated", "${nodot}", "${a.}"] {
            let v = serde_json::json!({ "p": bad });
            assert!(collect_references(&v).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_whole_string_marker_keeps_type() {
        let v = serde_json::json!({"size": "${group.desired}"});
        let resolved = resolve_value(&v, &|r: &Reference| {
            (r.resource == name("group") && r.output == "desired")
                .then(|| serde_json::json!(5))
        })
        .unwrap();
        assert_eq!(resolved, serde_json::json!({"size": 5}));
    }

    #[test]
    fn test_embedded_marker_interpolates() {
        let v = serde_json::json!("https://${clusterB.endpoint_url}/api");
        let resolved = resolve_value(&v, &|_: &Reference| {
            Some(serde_json::json!("eks.example"))
        })
        .unwrap();
        assert_eq!(resolved, serde_json::json!("https://eks.example/api"));
    }

    #[test]
    fn test_unresolved_lookup_is_error() {
        let v = serde_json::json!("${roleA.arn}");
        assert!(resolve_value(&v, &|_: &Reference| None).is_err());
    }
}
