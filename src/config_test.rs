use std::time::Duration;

use clap::Parser;

use super::Config;

#[test]
fn defaults_apply_with_no_arguments() {
    let config = Config::parse_from(["vospace-server"]);
    assert_eq!(config.space_name, "vospace");
    assert_eq!(config.directory_limit_cap, 10_000);
    assert_eq!(config.abort_grace_period, Duration::from_secs(5));
    assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
}

#[test]
fn overrides_are_honored() {
    let config = Config::parse_from([
        "vospace-server",
        "--db-path",
        "/tmp/custom.db",
        "--space-name",
        "example.org",
        "--bind-addr",
        "0.0.0.0:9000",
        "--abort-grace-period",
        "30",
    ]);
    assert_eq!(config.db_path.to_str().unwrap(), "/tmp/custom.db");
    assert_eq!(config.space_name, "example.org");
    assert_eq!(config.bind_addr.to_string(), "0.0.0.0:9000");
    assert_eq!(config.abort_grace_period, Duration::from_secs(30));
}
