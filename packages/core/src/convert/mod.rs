//! Drone configuration conversion
//!
//! Drone hands a conversion extension the raw `.drone.yml` contents. This
//! module splits it into YAML documents and replaces every pipeline that
//! declares `parallelism: N` with N copies named `<name>-1` .. `<name>-N`.
//! Documents that are not (parseable) pipelines pass through untouched.

mod pipeline;

pub use pipeline::{Pipeline, expand_pipeline, parse_pipeline};

use thiserror::Error;
use tracing::{debug, warn};

/// Separator between YAML documents in a Drone configuration
pub const DOCUMENT_SEPARATOR: &str = "\n---\n";

/// Upper bound on generated instances per pipeline
pub const DEFAULT_PARALLELISM_MAX: usize = 64;

/// Errors produced while converting a configuration
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("error serializing pipeline '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Conversion settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub parallelism_max: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            parallelism_max: DEFAULT_PARALLELISM_MAX,
        }
    }
}

/// Result of a conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Converted configuration
    pub data: String,
    /// Documents in the input
    pub documents: usize,
    /// Pipelines replaced by their instances
    pub expanded: usize,
    /// Documents emitted unchanged
    pub passed_through: usize,
}

/// Split a configuration into its YAML documents
pub fn split_documents(data: &str) -> Vec<&str> {
    data.split(DOCUMENT_SEPARATOR).collect()
}

/// Convert a Drone configuration, expanding parallel pipelines
pub fn convert(data: &str, options: &ConvertOptions) -> Result<Conversion, ConvertError> {
    let documents = split_documents(data);
    let mut output: Vec<String> = Vec::with_capacity(documents.len());
    let mut expanded = 0;
    let mut passed_through = 0;

    for (index, doc) in documents.iter().enumerate() {
        let pipeline = match parse_pipeline(doc) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                if !doc.trim().is_empty() {
                    warn!(
                        "error parsing yaml document {}: {}. passing through.",
                        index + 1,
                        e
                    );
                }
                output.push((*doc).to_string());
                passed_through += 1;
                continue;
            }
        };

        let Some(requested) = pipeline.parallelism else {
            output.push((*doc).to_string());
            passed_through += 1;
            continue;
        };

        if requested > options.parallelism_max {
            warn!(
                "limiting parallelism of pipeline '{}' from {} to {}",
                pipeline.name, requested, options.parallelism_max
            );
        }
        if requested == 0 {
            warn!(
                "pipeline '{}' has parallelism 0 and is dropped",
                pipeline.name
            );
        }

        let instances = expand_pipeline(&pipeline, options.parallelism_max);
        debug!(
            "expanding pipeline '{}' into {} instances",
            pipeline.name,
            instances.len()
        );
        for instance in instances {
            let rendered =
                serde_yaml::to_string(&instance).map_err(|source| ConvertError::Serialize {
                    name: instance.name.clone(),
                    source,
                })?;
            output.push(rendered.trim_end_matches('\n').to_string());
        }
        expanded += 1;
    }

    Ok(Conversion {
        data: output.join(DOCUMENT_SEPARATOR),
        documents: documents.len(),
        expanded,
        passed_through,
    })
}
