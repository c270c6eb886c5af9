//! Typed views of admin CLI output.
//!
//! Most subcommands print `key: value` lines; the quorum detail and network
//! endpoints return JSON. Anything that does not fit the expected shape is a
//! [`ParseError`] rather than a silent default.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::Membership;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected output: {0}")]
    Unexpected(String),
}

/// Parse `key: value` lines, tolerating quotes and trailing commas
pub fn parse_key_values(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim().trim_matches('"');
            if key.is_empty() {
                return None;
            }
            let value = value.trim().trim_end_matches(',').trim().trim_matches('"');
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Output of `node_state_get`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    pub state: String,
    pub node_id: Option<String>,
    pub cluster_id: Option<String>,
}

impl NodeState {
    pub fn parse(output: &str) -> Result<Self, ParseError> {
        let mut fields = parse_key_values(output);
        let state = fields
            .remove("state")
            .ok_or(ParseError::MissingField("state"))?;
        Ok(Self {
            state,
            node_id: fields.remove("node_id").filter(|v| !v.is_empty()),
            cluster_id: fields.remove("cluster_id").filter(|v| !v.is_empty()),
        })
    }

    /// The node participates in an active quorum
    pub fn is_active(&self) -> bool {
        self.state == "ACTIVE"
    }
}

/// Output of `version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub revision_id: String,
}

impl VersionInfo {
    pub fn parse(output: &str) -> Result<Self, ParseError> {
        let fields = parse_key_values(output);
        let revision = fields
            .get("revision_id")
            .ok_or(ParseError::MissingField("revision_id"))?;

        // "Qumulo Core 7.6.0" -> "7.6.0"
        let revision_id: String = revision
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect::<String>()
            .trim_matches('.')
            .to_string();

        if revision_id.is_empty() {
            return Err(ParseError::Unexpected(format!(
                "revision_id carries no version: {}",
                revision
            )));
        }

        Ok(Self { revision_id })
    }
}

/// Node ids are reported either as numbers or as strings
fn node_id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<Value> = Vec::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|v| match v {
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => Ok(s),
            other => Err(serde::de::Error::custom(format!(
                "unexpected node id {}",
                other
            ))),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct QuorumDetails {
    #[serde(deserialize_with = "node_id_list")]
    all_nodes: Vec<String>,
    #[serde(default, deserialize_with = "node_id_list")]
    in_nodes: Vec<String>,
    #[serde(default, deserialize_with = "node_id_list")]
    out_nodes: Vec<String>,
}

/// Parse `GET /v1/debug/quorum/details`
pub fn parse_membership(output: &str) -> Result<Membership, ParseError> {
    let details: QuorumDetails = serde_json::from_str(output.trim())?;
    Ok(Membership {
        all_nodes: details.all_nodes,
        in_nodes: details.in_nodes,
        out_nodes: details.out_nodes,
    })
}

/// Cluster network configuration as returned by `network_v3_get_config`.
///
/// Kept as a JSON document so fields this crate does not model are written
/// back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkConfig(pub Value);

impl NetworkConfig {
    /// A configuration with a single host-addressed frontend network
    pub fn with_floating_ips(floating_ips: &[String], netmask: &str) -> Self {
        NetworkConfig(serde_json::json!({
            "frontend_networks": [{
                "id": 1,
                "name": "default",
                "addresses": {
                    "type": "HOST",
                    "host_addresses": {
                        "floating_ip_ranges": floating_ips,
                        "netmask": netmask,
                    }
                }
            }]
        }))
    }

    pub fn frontend_network_count(&self) -> usize {
        self.0
            .get("frontend_networks")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Floating IPs of the first frontend network
    pub fn floating_ips(&self) -> Vec<String> {
        self.0
            .pointer("/frontend_networks/0/addresses/host_addresses/floating_ip_ranges")
            .and_then(Value::as_array)
            .map(|ips| {
                ips.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace the floating IPs of the first frontend network. An empty set
    /// removes every frontend network.
    pub fn replace_floating_ips(&mut self, floating_ips: &[String]) -> Result<(), ParseError> {
        if floating_ips.is_empty() {
            if let Some(root) = self.0.as_object_mut() {
                root.insert("frontend_networks".into(), Value::Array(Vec::new()));
            }
            return Ok(());
        }

        let ranges = self
            .0
            .pointer_mut("/frontend_networks/0/addresses/host_addresses")
            .and_then(Value::as_object_mut)
            .ok_or(ParseError::MissingField("host_addresses"))?;
        ranges.insert(
            "floating_ip_ranges".into(),
            Value::Array(floating_ips.iter().cloned().map(Value::String).collect()),
        );
        Ok(())
    }
}

/// Output of `network_v3_status`
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkStatus {
    pub raw: String,
}

impl NetworkStatus {
    /// The cluster reports floating addresses assigned to its nodes
    pub fn has_floating_addresses(&self) -> bool {
        self.raw.contains("floating_addresses")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_state_parsing() {
        let output = "{\n  \"cluster_id\": \"3f2a-11\",\n  \"node_id\": 4,\n  \"state\": \"ACTIVE\"\n}";
        let state = NodeState::parse(output).unwrap();
        assert!(state.is_active());
        assert_eq!(state.node_id.as_deref(), Some("4"));
        assert_eq!(state.cluster_id.as_deref(), Some("3f2a-11"));
    }

    #[test]
    fn test_node_state_without_state_is_an_error() {
        assert!(matches!(
            NodeState::parse("garbage"),
            Err(ParseError::MissingField("state"))
        ));
    }

    #[test]
    fn test_version_parsing() {
        let info = VersionInfo::parse("revision_id: Qumulo Core 7.6.1\nbuild_date: x").unwrap();
        assert_eq!(info.revision_id, "7.6.1");
        assert!(VersionInfo::parse("revision_id: unknown").is_err());
    }

    #[test]
    fn test_membership_accepts_numeric_and_string_ids() {
        let m = parse_membership(r#"{"all_nodes": [1, 2, "3"], "in_nodes": [1, 2], "out_nodes": [3]}"#)
            .unwrap();
        assert_eq!(m.all_nodes, vec!["1", "2", "3"]);
        assert_eq!(m.out_nodes, vec!["3"]);
        assert!(parse_membership("{}").is_err());
    }

    #[test]
    fn test_floating_ip_replacement() {
        let mut config = NetworkConfig::with_floating_ips(&["10.1.0.1".into()], "10.1.0.0/24");
        assert_eq!(config.floating_ips(), vec!["10.1.0.1"]);

        config
            .replace_floating_ips(&["10.1.0.2".into(), "10.1.0.3".into()])
            .unwrap();
        assert_eq!(config.floating_ips(), vec!["10.1.0.2", "10.1.0.3"]);
        assert_eq!(
            config.0.pointer("/frontend_networks/0/addresses/host_addresses/netmask"),
            Some(&Value::String("10.1.0.0/24".into()))
        );

        config.replace_floating_ips(&[]).unwrap();
        assert_eq!(config.frontend_network_count(), 0);
    }
}
