//! Single-assignment output cells.
//!
//! Every output a resource produces lives in an [`OutputCell`]:
//! `Unresolved` until the owning node is provisioned, then resolved
//! exactly once and immutable for the rest of the run. The scheduler
//! is the sole writer; property references are the readers.

use std::collections::BTreeMap;

use stratus_decl::Reference;
use stratus_id::ResourceName;
use stratus_provider::Outputs;
use thiserror::Error;

/// Output cell misuse.
#[derive(Debug, Error)]
pub enum OutputError {
    /// A second write was attempted on a resolved cell.
    #[error("output '{resource}.{output}' is already resolved")]
    AlreadyResolved { resource: String, output: String },
}

/// A single-assignment slot for one output value.
#[derive(Debug, Clone, Default)]
pub struct OutputCell {
    value: Option<serde_json::Value>,
}

impl OutputCell {
    /// A fresh, unresolved cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a value has been written.
    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    /// The resolved value, if any.
    pub fn get(&self) -> Option<&serde_json::Value> {
        self.value.as_ref()
    }

    fn resolve(&mut self, value: serde_json::Value) -> Result<(), ()> {
        if self.value.is_some() {
            return Err(());
        }
        self.value = Some(value);
        Ok(())
    }
}

/// All output cells of a run, keyed by resource and output name.
#[derive(Debug, Default)]
pub struct OutputTable {
    cells: BTreeMap<ResourceName, BTreeMap<String, OutputCell>>,
}

impl OutputTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every output of one resource at once.
    ///
    /// Called exactly once per resource, when its node reaches
    /// `Ready`. A second call for the same resource is an error.
    pub fn resolve_all(
        &mut self,
        resource: &ResourceName,
        outputs: &Outputs,
    ) -> Result<(), OutputError> {
        let cells = self.cells.entry(resource.clone()).or_default();
        for (name, value) in outputs {
            let cell = cells.entry(name.clone()).or_default();
            cell.resolve(value.clone())
                .map_err(|()| OutputError::AlreadyResolved {
                    resource: resource.to_string(),
                    output: name.clone(),
                })?;
        }
        Ok(())
    }

    /// Look up a reference; `None` while the producer is unresolved or
    /// the output name does not exist.
    pub fn get(&self, reference: &Reference) -> Option<serde_json::Value> {
        self.cells
            .get(&reference.resource)?
            .get(&reference.output)?
            .get()
            .cloned()
    }

    /// All resolved outputs of one resource.
    pub fn outputs_of(&self, resource: &ResourceName) -> Outputs {
        self.cells
            .get(resource)
            .map(|cells| {
                cells
                    .iter()
                    .filter_map(|(k, cell)| cell.get().map(|v| (k.clone(), v.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ResourceName {
        ResourceName::parse(s).unwrap()
    }

    fn reference(r: &str, o: &str) -> Reference {
        Reference {
            resource: name(r),
            output: o.to_string(),
        }
    }

    #[test]
    fn test_unresolved_then_resolved() {
        let mut table = OutputTable::new();
        assert!(table.get(&reference("roleA", "arn")).is_none());

        let outputs = Outputs::from([("arn".to_string(), serde_json::json!("arn:x"))]);
        table.resolve_all(&name("roleA"), &outputs).unwrap();

        assert_eq!(
            table.get(&reference("roleA", "arn")),
            Some(serde_json::json!("arn:x"))
        );
        assert!(table.get(&reference("roleA", "missing")).is_none());
    }

    #[test]
    fn test_second_write_rejected() {
        let mut table = OutputTable::new();
        let outputs = Outputs::from([("arn".to_string(), serde_json::json!("a"))]);
        table.resolve_all(&name("roleA"), &outputs).unwrap();

        let err = table.resolve_all(&name("roleA"), &outputs).unwrap_err();
        assert!(matches!(err, OutputError::AlreadyResolved { .. }));
    }

    #[test]
    fn test_outputs_of() {
        let mut table = OutputTable::new();
        let outputs = Outputs::from([
            ("arn".to_string(), serde_json::json!("a")),
            ("url".to_string(), serde_json::json!("u")),
        ]);
        table.resolve_all(&name("c"), &outputs).unwrap();
        assert_eq!(table.outputs_of(&name("c")), outputs);
        assert!(table.outputs_of(&name("ghost")).is_empty());
    }
}
