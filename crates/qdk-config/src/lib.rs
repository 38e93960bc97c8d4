use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

pub mod secrets;
mod service;

pub use secrets::{resolve_delivery_secrets, DeliverySecrets};
pub use service::{
    ConversionConfig, DeliveryConfig, NumberingConfig, PricingConfig, ServiceConfig,
};

/// Known secret-like prefixes. If any leaf string value in the effective
/// config starts with one of these, loading aborts with CONFIG_SECRET_DETECTED.
/// Config files carry env var NAMES only (see [`secrets`]).
const SECRET_PREFIXES: &[&str] = &[
    "sk-",
    "sk_live",
    "sk_test",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "gho_",
    "glpat-",
    "xoxb-",
    "xoxp-",
    "SG.",
    "Bearer ",
];

/// JSON-pointer prefixes the service actually reads. A leaf under any of
/// these is consumed; every other leaf is reported as unused.
///
/// Keep in sync with `ServiceConfig::from_json` and `secrets::resolve_delivery_secrets`.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/numbering/quote_prefix",
    "/numbering/request_prefix",
    "/numbering/article_prefix",
    "/numbering/quote_scope",
    "/numbering/counter_retries",
    "/pricing/default_tax_pct",
    "/pricing/default_discount_pct",
    "/pricing/default_quantity",
    "/conversion/default_limit",
    "/conversion/max_limit",
    "/delivery/enabled",
    "/delivery/mail_from",
    "/delivery/public_origin",
    "/delivery/relay_url_env",
    "/delivery/relay_token_env",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique)
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Produce an unused-key report against [`CONSUMED_POINTERS`].
/// With `UnusedKeyPolicy::Fail` an unclean report is an error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = CONSUMED_POINTERS
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {}",
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" consumes "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.starts_with(prefix)
        && leaf
            .get(prefix.len()..prefix.len() + 1)
            .map(|c| c == "/")
            .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    let take = items.iter().take(n).cloned().collect::<Vec<_>>();
    format!("{:?}", take)
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Empty config: every `ServiceConfig` field takes its default.
    pub fn empty() -> Result<LoadedConfig> {
        load_layered_yaml_from_strings(&[])
    }

    pub fn service(&self) -> Result<ServiceConfig> {
        ServiceConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Merge YAML docs in order: earlier docs are base, later docs override.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as "no overrides".
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

pub const ENV_CONFIG: &str = "QDK_CONFIG";

/// Load the layers listed in `QDK_CONFIG`. Unset or blank means defaults.
pub fn load_from_env() -> Result<LoadedConfig> {
    let raw = std::env::var(ENV_CONFIG).unwrap_or_default();
    let paths = split_config_paths(&raw);
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    load_layered_yaml(&refs)
}

/// Paths from a comma-separated list (the `QDK_CONFIG` format). Blank
/// entries are skipped.
pub fn split_config_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

// serde_json's default Map is ordered by key, so plain serialization is canonical.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim_start();
    if t.trim_end().len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
