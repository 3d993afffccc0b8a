//! This module controls configuration parsing from the end user, providing a
//! convenience mechanism for the rest of the program. Crashes are most likely
//! to originate from this code, intentionally.

use std::{
    collections::BTreeMap,
    fs, io,
    num::{NonZeroU16, NonZeroU32},
    path::{Path, PathBuf},
};

use http::{
    HeaderMap, Uri,
    header::{CONTENT_TYPE, HeaderName, HeaderValue},
};
use rustc_hash::FxHashMap;
use serde::Deserialize;

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Config, template or id-pool file could not be read
    #[error("Failed to read file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// A template or id-pool file did not hold the expected JSON document
    #[error("Failed to deserialize json file {path:?}: {source}")]
    SerdeJson {
        /// File path
        path: PathBuf,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },
    /// A weight key in the map-form template source was not numeric
    #[error("Template weight is not a number: {0:?}")]
    WeightNotNumeric(String),
}

fn default_seed() -> [u8; 32] {
    // Fixed so that unseeded runs are still reproducible.
    [
        19, 70, 213, 9, 112, 87, 118, 91, 49, 21, 24, 76, 241, 41, 93, 7, 35, 171, 115, 62, 10,
        104, 36, 61, 215, 102, 25, 2, 219, 85, 122, 1,
    ]
}

/// Main configuration struct for this program
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The seed for all random operations: template draws, pool draws and
    /// caller ids.
    #[serde(default = "default_seed")]
    pub seed: [u8; 32],
    /// The global request rate across all connections, per second.
    pub requests_per_second: NonZeroU32,
    /// The number of logical connections cycled round-robin.
    pub parallel_connections: NonZeroU16,
    /// The URI for the target, must be a valid URI
    #[serde(with = "http_serde::uri")]
    pub target_uri: Uri,
    /// "Name: Value" header lines applied to every request. Malformed lines
    /// are silently skipped.
    #[serde(default)]
    pub headers: Vec<String>,
    /// Inline weighted templates, in either accepted shape.
    #[serde(default)]
    pub templates: TemplateSource,
    /// Optional JSON file mapping weight to message body, merged after the
    /// inline templates.
    #[serde(default)]
    pub template_file: Option<PathBuf>,
    /// Inline id pools: name to candidate substitution strings.
    #[serde(default)]
    pub id_pools: FxHashMap<String, Vec<String>>,
    /// Optional JSON file mapping pool name to candidate list. File pools
    /// replace inline pools of the same name.
    #[serde(default)]
    pub id_pool_file: Option<PathBuf>,
}

/// Weighted template source.
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(untagged)]
pub enum TemplateSource {
    /// Sequence form: `[{probability, template}, ..]`.
    Entries(Vec<TemplateEntry>),
    /// Map form: weight, as a numeric string key, to JSON message body.
    /// Ordered by key so startup is deterministic.
    ByWeight(BTreeMap<String, serde_json::Value>),
}

impl Default for TemplateSource {
    fn default() -> Self {
        Self::Entries(Vec::new())
    }
}

/// One weighted template in the sequence form of [`TemplateSource`].
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct TemplateEntry {
    /// Raw weight, normalized against the total at startup.
    pub probability: f64,
    /// The message body: a JSON document or a string holding one.
    pub template: serde_json::Value,
}

impl Config {
    /// Read and deserialize a YAML config file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not parse, including a rate
    /// or connection count of zero.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_owned(),
            source,
        })?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// All weighted templates: inline sources followed by `template_file`
    /// entries, in a stable order.
    ///
    /// # Errors
    ///
    /// Fails if the template file cannot be read or parsed, or a map-form
    /// weight key is not numeric.
    pub fn template_weights(&self) -> Result<Vec<(f64, String)>, Error> {
        let mut out = Vec::new();
        match &self.templates {
            TemplateSource::Entries(entries) => {
                for entry in entries {
                    out.push((entry.probability, template_text(&entry.template)));
                }
            }
            TemplateSource::ByWeight(map) => {
                for (weight, body) in map {
                    out.push((parse_weight(weight)?, template_text(body)));
                }
            }
        }
        if let Some(path) = &self.template_file {
            let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
                path: path.clone(),
                source,
            })?;
            let map: BTreeMap<String, serde_json::Value> = serde_json::from_str(&contents)
                .map_err(|source| Error::SerdeJson {
                    path: path.clone(),
                    source,
                })?;
            for (weight, body) in &map {
                out.push((parse_weight(weight)?, template_text(body)));
            }
        }
        Ok(out)
    }

    /// All id pools: inline pools overlaid by `id_pool_file` pools.
    ///
    /// # Errors
    ///
    /// Fails if the id-pool file cannot be read or parsed.
    pub fn id_pools(&self) -> Result<FxHashMap<String, Vec<String>>, Error> {
        let mut pools = self.id_pools.clone();
        if let Some(path) = &self.id_pool_file {
            let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
                path: path.clone(),
                source,
            })?;
            let from_file: FxHashMap<String, Vec<String>> = serde_json::from_str(&contents)
                .map_err(|source| Error::SerdeJson {
                    path: path.clone(),
                    source,
                })?;
            pools.extend(from_file);
        }
        Ok(pools)
    }
}

/// Message body text for a template value. String values are taken verbatim,
/// anything else is re-serialized.
fn template_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_weight(raw: &str) -> Result<f64, Error> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::WeightNotNumeric(raw.to_string()))
}

/// Parse "Name: Value" lines into a header map.
///
/// Lines that do not split into exactly a name and a value on `:` are
/// skipped, as are names and values that are not valid HTTP header tokens.
/// `Content-Type: application/json` is supplied when the lines do not set a
/// content type.
#[must_use]
pub fn parse_headers(lines: &[String]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for line in lines {
        let mut parts = line.split(':');
        let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let Ok(name) = name.trim().parse::<HeaderName>() else {
            continue;
        };
        let Ok(value) = value.trim().parse::<HeaderValue>() else {
            continue;
        };
        headers.append(name, value);
    }
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    headers
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use proptest::prelude::*;

    use super::{Config, TemplateSource, parse_headers};

    const MINIMAL: &str = r#"
requests_per_second: 100
parallel_connections: 4
target_uri: "http://localhost:8080/ingest"
"#;

    #[test]
    fn minimal_config_parses() {
        let config: Config = serde_yaml::from_str(MINIMAL).expect("minimal config");
        assert_eq!(config.requests_per_second.get(), 100);
        assert_eq!(config.parallel_connections.get(), 4);
        assert_eq!(config.target_uri.path(), "/ingest");
        assert_eq!(config.templates, TemplateSource::default());
    }

    #[test]
    fn zero_rate_rejected() {
        let raw = MINIMAL.replace("requests_per_second: 100", "requests_per_second: 0");
        assert!(serde_yaml::from_str::<Config>(&raw).is_err());
    }

    #[test]
    fn zero_connections_rejected() {
        let raw = MINIMAL.replace("parallel_connections: 4", "parallel_connections: 0");
        assert!(serde_yaml::from_str::<Config>(&raw).is_err());
    }

    #[test]
    fn malformed_uri_rejected() {
        let raw = MINIMAL.replace("http://localhost:8080/ingest", "not a uri");
        assert!(serde_yaml::from_str::<Config>(&raw).is_err());
    }

    #[test]
    fn sequence_form_templates() {
        let raw = format!(
            "{MINIMAL}\ntemplates:\n  - probability: 3.0\n    template: '{{\"id\":\"#ID#\"}}'\n  - probability: 1.0\n    template:\n      kind: heartbeat\n"
        );
        let config: Config = serde_yaml::from_str(&raw).expect("sequence form");
        let weights = config.template_weights().expect("weights");
        assert_eq!(
            weights,
            vec![
                (3.0, r##"{"id":"#ID#"}"##.to_string()),
                (1.0, r#"{"kind":"heartbeat"}"#.to_string()),
            ]
        );
    }

    #[test]
    fn map_form_templates() {
        let raw = format!(
            "{MINIMAL}\ntemplates:\n  \"3.0\":\n    kind: put\n  \"1.0\":\n    kind: get\n"
        );
        let config: Config = serde_yaml::from_str(&raw).expect("map form");
        let weights = config.template_weights().expect("weights");
        // BTreeMap order: "1.0" before "3.0".
        assert_eq!(
            weights,
            vec![
                (1.0, r#"{"kind":"get"}"#.to_string()),
                (3.0, r#"{"kind":"put"}"#.to_string()),
            ]
        );
    }

    #[test]
    fn map_form_rejects_non_numeric_weight() {
        let raw = format!("{MINIMAL}\ntemplates:\n  \"often\":\n    kind: put\n");
        let config: Config = serde_yaml::from_str(&raw).expect("map form");
        assert!(config.template_weights().is_err());
    }

    #[test]
    fn template_file_is_merged() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "2.5": {{"kind":"filed"}} }}"#).expect("write template file");

        let raw = format!(
            "{MINIMAL}\ntemplates:\n  - probability: 1.0\n    template: '{{}}'\ntemplate_file: {}\n",
            file.path().display()
        );
        let config: Config = serde_yaml::from_str(&raw).expect("config with file");
        let weights = config.template_weights().expect("weights");
        assert_eq!(
            weights,
            vec![
                (1.0, "{}".to_string()),
                (2.5, r#"{"kind":"filed"}"#.to_string()),
            ]
        );
    }

    #[test]
    fn id_pool_file_overlays_inline_pools() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "REGION": ["ap"], "HOST": ["h1", "h2"] }}"#)
            .expect("write id pool file");

        let raw = format!(
            "{MINIMAL}\nid_pools:\n  REGION: [\"us\", \"eu\"]\nid_pool_file: {}\n",
            file.path().display()
        );
        let config: Config = serde_yaml::from_str(&raw).expect("config with file");
        let pools = config.id_pools().expect("pools");
        assert_eq!(pools["REGION"], vec!["ap".to_string()]);
        assert_eq!(pools["HOST"].len(), 2);
    }

    #[test]
    fn missing_template_file_errors() {
        let raw = format!("{MINIMAL}\ntemplate_file: /no/such/file.json\n");
        let config: Config = serde_yaml::from_str(&raw).expect("config");
        assert!(config.template_weights().is_err());
    }

    #[test]
    fn header_lines_parse_and_malformed_lines_skip() {
        let headers = parse_headers(&[
            "Authorization: Bearer abc".to_string(),
            "no-colon-here".to_string(),
            "X-Too: many: colons".to_string(),
            "  X-Trimmed  :  spaced value ".to_string(),
            String::new(),
        ]);
        assert_eq!(headers["authorization"], "Bearer abc");
        assert_eq!(headers["x-trimmed"], "spaced value");
        assert!(!headers.contains_key("x-too"));
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers.len(), 3);
    }

    proptest! {
        // Arbitrary header lines never panic and never lose the default
        // content type.
        #[test]
        fn header_parsing_is_total(lines in prop::collection::vec(".*", 0..16)) {
            let headers = parse_headers(&lines);
            prop_assert!(headers.contains_key("content-type"));
        }
    }

    #[test]
    fn content_type_not_overridden() {
        let headers = parse_headers(&["Content-Type: application/x-ndjson".to_string()]);
        assert_eq!(headers["content-type"], "application/x-ndjson");
        assert_eq!(headers.len(), 1);
    }
}
