use super::*;
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn defaults_to_supabase_with_default_timeouts() {
    let cfg = AppConfig::from_lookup(lookup(&[
        ("SUPABASE_URL", "https://proj.example.test/"),
        ("SUPABASE_ANON_KEY", "anon"),
    ]))
    .unwrap();

    assert_eq!(
        cfg.backend,
        BackendConfig::Supabase {
            url: "https://proj.example.test".into(),
            anon_key: "anon".into(),
            timeouts: BackendTimeouts::default(),
        }
    );
    assert_eq!(cfg.theme, Theme::Light);
    assert_eq!(cfg.theme_file, None);
}

#[test]
fn parses_overrides() {
    let cfg = AppConfig::from_lookup(lookup(&[
        ("SUPABASE_URL", "https://proj.example.test"),
        ("SUPABASE_ANON_KEY", "anon"),
        ("BACKEND_REQUEST_TIMEOUT_SECS", "42"),
        ("BACKEND_CONNECT_TIMEOUT_SECS", "7"),
        ("STARSIGN_THEME", "dark"),
        ("STARSIGN_THEME_FILE", "/tmp/starsign-theme"),
    ]))
    .unwrap();

    let BackendConfig::Supabase { timeouts, .. } = cfg.backend else {
        panic!("expected supabase backend");
    };
    assert_eq!(timeouts, BackendTimeouts { request_secs: 42, connect_secs: 7 });
    assert_eq!(cfg.theme, Theme::Dark);
    assert_eq!(cfg.theme_file, Some(PathBuf::from("/tmp/starsign-theme")));
}

#[test]
fn invalid_timeout_falls_back_to_default() {
    let cfg = AppConfig::from_lookup(lookup(&[
        ("SUPABASE_URL", "https://proj.example.test"),
        ("SUPABASE_ANON_KEY", "anon"),
        ("BACKEND_REQUEST_TIMEOUT_SECS", "soon"),
    ]))
    .unwrap();
    let BackendConfig::Supabase { timeouts, .. } = cfg.backend else {
        panic!("expected supabase backend");
    };
    assert_eq!(timeouts.request_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
}

#[test]
fn missing_url_is_error() {
    let err = AppConfig::from_lookup(lookup(&[("SUPABASE_ANON_KEY", "anon")])).unwrap_err();
    assert!(matches!(err, ConfigError::Missing { var } if var == "SUPABASE_URL"));
}

#[test]
fn blank_anon_key_is_missing() {
    let err = AppConfig::from_lookup(lookup(&[("SUPABASE_URL", "https://p.test"), ("SUPABASE_ANON_KEY", "  ")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Missing { var } if var == "SUPABASE_ANON_KEY"));
}

#[test]
fn memory_backend_needs_no_credentials() {
    let cfg = AppConfig::from_lookup(lookup(&[("STARSIGN_BACKEND", "memory")])).unwrap();
    assert_eq!(cfg.backend, BackendConfig::Memory);
}

#[test]
fn unknown_backend_is_parse_error() {
    let err = AppConfig::from_lookup(lookup(&[("STARSIGN_BACKEND", "firebase")])).unwrap_err();
    assert!(err.to_string().contains("firebase"));
}

#[test]
fn unknown_theme_is_parse_error() {
    let err = AppConfig::from_lookup(lookup(&[("STARSIGN_BACKEND", "memory"), ("STARSIGN_THEME", "neon")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("neon")));
}
