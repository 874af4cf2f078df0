use std::time::Duration;
use std::{env, fs};

use signet_server::config::{AppConfigError, load_config};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    // Create a temporary TOML configuration file
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("signet.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8091

[auth]
issuer = "https://auth.example.com"

[auth.authorization]
code_ttl = "2m"
default_scope = "openid"

[auth.tokens]
access_token_ttl = "30m"
refresh_token_ttl = "14d"

[auth.session]
secret = "0123456789abcdef0123456789abcdef"
secure = false

[auth.storage]
cleanup_interval = "1m"

[seed]
demo = true
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8091);
    assert_eq!(cfg.auth.issuer, "https://auth.example.com");
    assert_eq!(cfg.auth.authorization.code_ttl, Duration::from_secs(120));
    assert_eq!(cfg.auth.tokens.access_token_ttl, Duration::from_secs(1800));
    assert_eq!(
        cfg.auth.tokens.refresh_token_ttl,
        Duration::from_secs(14 * 24 * 3600)
    );
    assert_eq!(cfg.auth.storage.cleanup_interval, Duration::from_secs(60));
    assert!(!cfg.auth.session.secure);
    assert!(cfg.seed.demo);

    // Untouched sections keep their defaults
    assert_eq!(cfg.auth.audit.queue_capacity, 1024);
    assert_eq!(cfg.auth.session.cookie_name, "signet_session");

    // 2) Env override should win over the file
    unsafe {
        env::set_var("SIGNET__SERVER__PORT", "9099");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9099);
    // cleanup env var
    unsafe {
        env::remove_var("SIGNET__SERVER__PORT");
    }

    // 3) A session secret below the minimum fails validation
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[auth]
issuer = "https://auth.example.com"

[auth.session]
secret = "too-short"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(matches!(err, AppConfigError::Auth(_)));
    assert!(err.to_string().contains("session.secret"));
}
