//! Drone pipeline document model
//!
//! Only the fields needed for expansion are typed. Everything else in a
//! pipeline document is captured verbatim so it survives re-serialization.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single Drone pipeline document (Drone >= 1.0 syntax)
///
/// `kind`, `name` and `type` are required. Documents missing any of them
/// (older Drone syntax, signature documents, secrets) fail to parse and are
/// passed through unchanged by the converter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Pipeline {
    pub kind: String,

    /// Rewritten to `<name>-<instance>` on expansion
    pub name: String,

    /// Number of parallel instances to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,

    #[serde(rename = "type")]
    pub type_: String,

    /// All remaining keys, in document order
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl Pipeline {
    /// Build the instance with 1-based index `instance`
    ///
    /// The instance never carries a `parallelism` field, so converting the
    /// output again is a no-op.
    pub fn instance(&self, instance: usize) -> Pipeline {
        let mut copy = self.clone();
        copy.name = format!("{}-{}", self.name, instance);
        copy.parallelism = None;
        copy
    }
}

/// Parse one YAML document as a pipeline
pub fn parse_pipeline(doc: &str) -> Result<Pipeline, serde_yaml::Error> {
    serde_yaml::from_str(doc)
}

/// Expand a pipeline into its parallel instances
///
/// Returns `min(parallelism, parallelism_max)` instances named
/// `<name>-1` .. `<name>-N`. A pipeline without `parallelism` yields itself.
pub fn expand_pipeline(pipeline: &Pipeline, parallelism_max: usize) -> Vec<Pipeline> {
    let Some(requested) = pipeline.parallelism else {
        return vec![pipeline.clone()];
    };
    let count = requested.min(parallelism_max);
    (1..=count).map(|n| pipeline.instance(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE: &str = "kind: pipeline
name: static-tests
type: docker
parallelism: 3
trigger:
  branch:
  - master
steps:
- name: check
  image: riot/static-test-tools
  commands:
  - ./dist/tools/ci/static_tests.sh
";

    #[test]
    fn parse_captures_required_and_extra_fields() {
        let pipeline = parse_pipeline(PIPELINE).unwrap();
        assert_eq!(pipeline.kind, "pipeline");
        assert_eq!(pipeline.name, "static-tests");
        assert_eq!(pipeline.type_, "docker");
        assert_eq!(pipeline.parallelism, Some(3));

        let keys: Vec<&str> = pipeline.extra.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["trigger", "steps"]);
    }

    #[test]
    fn parse_rejects_legacy_syntax_without_kind() {
        let legacy = "pipeline:\n  build:\n    image: alpine\n";
        assert!(parse_pipeline(legacy).is_err());
    }

    #[test]
    fn parse_rejects_missing_type() {
        let doc = "kind: pipeline\nname: build\n";
        assert!(parse_pipeline(doc).is_err());
    }

    #[test]
    fn expand_names_instances_from_one() {
        let pipeline = parse_pipeline(PIPELINE).unwrap();
        let instances = expand_pipeline(&pipeline, 64);

        let names: Vec<&str> = instances.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["static-tests-1", "static-tests-2", "static-tests-3"]
        );
        assert!(instances.iter().all(|p| p.parallelism.is_none()));
        assert!(instances.iter().all(|p| p.extra == pipeline.extra));
    }

    #[test]
    fn expand_caps_at_maximum() {
        let mut pipeline = parse_pipeline(PIPELINE).unwrap();
        pipeline.parallelism = Some(500);

        let instances = expand_pipeline(&pipeline, 64);
        assert_eq!(instances.len(), 64);
        assert_eq!(instances.last().unwrap().name, "static-tests-64");
    }

    #[test]
    fn expand_one_still_renames() {
        let mut pipeline = parse_pipeline(PIPELINE).unwrap();
        pipeline.parallelism = Some(1);

        let instances = expand_pipeline(&pipeline, 64);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "static-tests-1");
        assert!(instances[0].parallelism.is_none());
    }

    #[test]
    fn expand_zero_yields_nothing() {
        let mut pipeline = parse_pipeline(PIPELINE).unwrap();
        pipeline.parallelism = Some(0);
        assert!(expand_pipeline(&pipeline, 64).is_empty());
    }

    #[test]
    fn expand_without_parallelism_is_identity() {
        let mut pipeline = parse_pipeline(PIPELINE).unwrap();
        pipeline.parallelism = None;

        let instances = expand_pipeline(&pipeline, 64);
        assert_eq!(instances, vec![pipeline]);
    }

    #[test]
    fn instance_serializes_without_parallelism_and_keeps_key_order() {
        let pipeline = parse_pipeline(PIPELINE).unwrap();
        let yaml = serde_yaml::to_string(&pipeline.instance(2)).unwrap();

        assert!(!yaml.contains("parallelism"));
        assert!(yaml.contains("name: static-tests-2"));
        let kind = yaml.find("kind:").unwrap();
        let type_ = yaml.find("type:").unwrap();
        let trigger = yaml.find("trigger:").unwrap();
        let steps = yaml.find("steps:").unwrap();
        assert!(kind < type_ && type_ < trigger && trigger < steps);
    }
}
