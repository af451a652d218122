use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

fn required() -> Vec<(&'static str, &'static str)> {
    vec![("BEDROCK_AGENT_ID", "ZZ88CT3BIC"), ("AWS_ACCESS_KEY_ID", "AKID"), ("AWS_SECRET_ACCESS_KEY", "secret")]
}

#[test]
fn from_lookup_applies_defaults() {
    let cfg = AgentConfig::from_lookup(lookup_from(&required())).unwrap();
    assert_eq!(cfg.region, DEFAULT_REGION);
    assert_eq!(cfg.agent_id, "ZZ88CT3BIC");
    assert_eq!(cfg.agent_alias_id, DEFAULT_AGENT_ALIAS_ID);
    assert_eq!(cfg.endpoint_url, "https://bedrock-agent-runtime.us-west-2.amazonaws.com");
    assert_eq!(cfg.credentials.access_key_id, "AKID");
    assert_eq!(cfg.credentials.secret_access_key, "secret");
    assert_eq!(cfg.credentials.session_token, None);
    assert!(!cfg.enable_trace);
    assert_eq!(
        cfg.timeouts,
        RequestTimeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
}

#[test]
fn from_lookup_parses_overrides() {
    let mut vars = required();
    vars.extend([
        ("AWS_REGION", "eu-central-1"),
        ("AWS_SESSION_TOKEN", "tok"),
        ("BEDROCK_AGENT_ALIAS_ID", "ONVFAHX9UM"),
        ("BEDROCK_ENDPOINT_URL", "http://127.0.0.1:4566/"),
        ("BEDROCK_ENABLE_TRACE", "true"),
        ("BEDROCK_REQUEST_TIMEOUT_SECS", "42"),
        ("BEDROCK_CONNECT_TIMEOUT_SECS", "7"),
    ]);
    let cfg = AgentConfig::from_lookup(lookup_from(&vars)).unwrap();
    assert_eq!(cfg.region, "eu-central-1");
    assert_eq!(cfg.agent_alias_id, "ONVFAHX9UM");
    assert_eq!(cfg.endpoint_url, "http://127.0.0.1:4566");
    assert_eq!(cfg.credentials.session_token.as_deref(), Some("tok"));
    assert!(cfg.enable_trace);
    assert_eq!(cfg.timeouts, RequestTimeouts { request_secs: 42, connect_secs: 7 });
}

#[test]
fn endpoint_follows_region() {
    let mut vars = required();
    vars.push(("AWS_REGION", "us-east-1"));
    let cfg = AgentConfig::from_lookup(lookup_from(&vars)).unwrap();
    assert_eq!(cfg.endpoint_url, default_endpoint("us-east-1"));
}

#[test]
fn missing_agent_id_errors() {
    let vars = [("AWS_ACCESS_KEY_ID", "AKID"), ("AWS_SECRET_ACCESS_KEY", "secret")];
    let err = AgentConfig::from_lookup(lookup_from(&vars)).unwrap_err();
    assert!(matches!(err, AgentError::MissingConfig { ref var } if var == "BEDROCK_AGENT_ID"));
}

#[test]
fn blank_secret_counts_as_missing() {
    let vars = [("BEDROCK_AGENT_ID", "A"), ("AWS_ACCESS_KEY_ID", "AKID"), ("AWS_SECRET_ACCESS_KEY", "  ")];
    let err = AgentConfig::from_lookup(lookup_from(&vars)).unwrap_err();
    assert!(err.to_string().contains("AWS_SECRET_ACCESS_KEY"));
}

#[test]
fn bad_timeout_errors() {
    let mut vars = required();
    vars.push(("BEDROCK_REQUEST_TIMEOUT_SECS", "soon"));
    let err = AgentConfig::from_lookup(lookup_from(&vars)).unwrap_err();
    assert!(err.to_string().contains("BEDROCK_REQUEST_TIMEOUT_SECS"));
}

#[test]
fn bad_trace_flag_errors() {
    let mut vars = required();
    vars.push(("BEDROCK_ENABLE_TRACE", "maybe"));
    let err = AgentConfig::from_lookup(lookup_from(&vars)).unwrap_err();
    assert!(matches!(err, AgentError::ConfigParse(_)));
}
