use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn temp_settings_file(contents: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("user_roster_client_test_{suffix}.toml"));
    fs::write(&path, contents).expect("write settings");
    path
}

#[test]
fn defaults_target_demo_collection() {
    let settings = load_settings_from(None, env_from(&[])).expect("settings");
    assert_eq!(settings.collection_url.as_str(), DEFAULT_COLLECTION_URL);
    assert_eq!(settings.notification_ttl, Duration::from_secs(2));
    assert_eq!(settings.seed_id_ceiling, Some(10));
}

#[test]
fn file_values_apply_and_env_overrides_them() {
    let path = temp_settings_file(
        r#"
collection_url = "http://127.0.0.1:9000/users/"
notification_ttl_ms = 500
seed_id_ceiling = "none"
"#,
    );

    let settings = load_settings_from(
        Some(path.as_path()),
        env_from(&[("APP__COLLECTION_URL", "http://localhost:7000/people")]),
    )
    .expect("settings");

    assert_eq!(
        settings.collection_url.as_str(),
        "http://localhost:7000/people"
    );
    assert_eq!(settings.notification_ttl, Duration::from_millis(500));
    assert_eq!(settings.seed_id_ceiling, None);

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn trailing_slash_is_trimmed_from_collection_url() {
    let settings = load_settings_from(
        None,
        env_from(&[("COLLECTION_URL", "http://127.0.0.1:9000/users/")]),
    )
    .expect("settings");
    assert_eq!(settings.collection_url.as_str(), "http://127.0.0.1:9000/users");
}

#[test]
fn unparseable_numbers_keep_defaults() {
    let settings = load_settings_from(
        None,
        env_from(&[
            ("APP__NOTIFICATION_TTL_MS", "soon"),
            ("APP__SEED_ID_CEILING", "25"),
        ]),
    )
    .expect("settings");
    assert_eq!(settings.notification_ttl, Duration::from_secs(2));
    assert_eq!(settings.seed_id_ceiling, Some(25));
}

#[test]
fn rejects_invalid_collection_url() {
    let err = load_settings_from(None, env_from(&[("COLLECTION_URL", "not a url")]))
        .expect_err("invalid url");
    assert!(matches!(err, SettingsError::CollectionUrl { .. }));
}
