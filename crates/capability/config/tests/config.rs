use skc_config::{AppConfig, ConfigError, load_assets, parse_assets};
use std::collections::HashMap;
use std::time::Duration;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_without_env() {
    let config = AppConfig::from_lookup(|_| None).expect("config");
    assert_eq!(config.app_name, "NORD SKC");
    assert_eq!(config.poll_hz, 1);
    assert_eq!(config.history_seconds, 900);
    assert_eq!(config.http_addr, "127.0.0.1:8090");
    assert_eq!(config.assets_path.to_str(), Some("assets.json"));
    assert_eq!(config.records_dir.to_str(), Some("records"));
    assert_eq!(config.poll_period(), Duration::from_secs(1));
    assert_eq!(config.status_interval(), Duration::from_millis(1000));
}

#[test]
fn load_config_from_lookup() {
    let config = AppConfig::from_lookup(lookup_from(&[
        ("SKC_POLL_HZ", "4"),
        ("SKC_HISTORY_SECONDS", "120"),
        ("SKC_HTTP_ADDR", "0.0.0.0:9000"),
        ("SKC_RECORDS_DIR", "/tmp/rec"),
    ]))
    .expect("config");
    assert_eq!(config.poll_hz, 4);
    assert_eq!(config.history_seconds, 120);
    assert_eq!(config.http_addr, "0.0.0.0:9000");
    assert_eq!(config.poll_period(), Duration::from_millis(250));
}

#[test]
fn poll_hz_has_floor_of_one() {
    let config = AppConfig::from_lookup(lookup_from(&[("SKC_POLL_HZ", "0")])).expect("config");
    assert_eq!(config.poll_hz, 1);
}

#[test]
fn invalid_number_is_reported() {
    let err = AppConfig::from_lookup(lookup_from(&[("SKC_POLL_HZ", "fast")])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(key, value) if key == "SKC_POLL_HZ" && value == "fast"));
}

const ASSETS: &str = r#"{
  "assets": [
    {
      "id": "J65", "fleet_no": 7, "plate": "A123BC",
      "type": "line", "ip": "10.0.0.5", "port": 6565, "timeout_s": 2,
      "field_names": []
    },
    {
      "id": "P12", "fleet_no": 3, "plate": "B777OP",
      "type": "siemens_s7", "ip": "10.0.0.9", "rack": 0, "slot": 1,
      "tags": {
        "pressure": {"db": 1, "start": 0, "size": 4, "dtype": "REAL"},
        "flow": {"db": 1, "start": 4, "size": 4, "dtype": "REAL"}
      }
    }
  ]
}"#;

#[test]
fn parses_asset_file_in_document_order() {
    let assets = parse_assets(ASSETS).expect("assets");
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0].id, "J65");
    assert_eq!(assets[0].driver.kind(), "line");
    assert_eq!(assets[0].driver.address(), "10.0.0.5:6565");
    assert_eq!(assets[1].identity().fleet_label(), "03");
    assert_eq!(assets[1].driver.address(), "10.0.0.9:102");
}

#[test]
fn rejects_duplicate_ids() {
    let text = r#"{"assets": [
        {"id": "J65", "type": "line", "host": "10.0.0.5"},
        {"id": "J65", "type": "line", "host": "10.0.0.6"}
    ]}"#;
    let err = parse_assets(text).unwrap_err();
    assert!(matches!(err, ConfigError::Asset { ref id, .. } if id == "J65"));
}

#[test]
fn bad_asset_is_excluded_and_others_kept() {
    let text = r#"{"assets": [
        {"id": "GOOD", "fleet_no": 1, "type": "line", "host": "10.0.0.5"},
        {"id": "BAD", "fleet_no": 2, "type": "opcua", "host": "10.0.0.6"},
        {"id": "NOTAGS", "type": "register", "host": "10.0.0.7", "tags": {}},
        {"id": "SLOW", "type": "line", "host": "10.0.0.8", "timeout_s": 1e20},
        {"id": "", "type": "line", "host": "10.0.0.9"},
        {"type": "line", "host": "10.0.0.10"},
        "not an object"
    ]}"#;
    let assets = parse_assets(text).expect("assets");
    let ids: Vec<&str> = assets.iter().map(|asset| asset.id.as_str()).collect();
    assert_eq!(ids, vec!["GOOD"]);
}

#[test]
fn duplicate_id_is_fatal_even_if_one_copy_is_invalid() {
    let text = r#"{"assets": [
        {"id": "J65", "type": "opcua", "host": "10.0.0.5"},
        {"id": "J65", "type": "line", "host": "10.0.0.6"}
    ]}"#;
    assert!(matches!(parse_assets(text), Err(ConfigError::Asset { ref id, .. }) if id == "J65"));
}

#[test]
fn unparseable_file_is_fatal() {
    assert!(matches!(parse_assets("{not json"), Err(ConfigError::Parse(_))));
    assert!(matches!(
        parse_assets(r#"{"assets": {"id": "X"}}"#),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn load_assets_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assets.json");
    std::fs::write(&path, ASSETS).unwrap();
    assert_eq!(load_assets(&path).unwrap().len(), 2);

    let missing = load_assets(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, ConfigError::Read { .. }));
}
