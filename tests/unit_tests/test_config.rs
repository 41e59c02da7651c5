use anyhow::Result;
use fix_library_rs::cfg::{cli::resolve_config_path, config::Config};

#[test]
fn test_load_and_validate_config() -> Result<()> {
    let cfg = resolve_config_path("tests/config.yaml").and_then(Config::load_from_file)?;

    assert_eq!(cfg.library.library_id, 7);
    assert_eq!(cfg.library.engine_channels.len(), 2);
    assert_eq!(cfg.library.reply_timeout_ms, 5_000);
    assert_eq!(cfg.library.reconnect_attempts, 10);
    assert_eq!(cfg.replay.stream_id, 1);
    assert!(cfg.replay.cache_sets.is_power_of_two());
    Ok(())
}

#[test]
fn test_rejects_engine_library_id() {
    let yaml = r#"
library:
  LibraryId: 0
  EngineChannels: ["aeron:ipc"]
  ReplyTimeoutMs: 1000
  ReconnectAttempts: 2
replay:
  LogFileDir: "/tmp/fix-logs"
  StreamId: 1
"#;
    let mut cfg: Config = serde_yaml::from_str(yaml).expect("parse");
    let err = cfg.validate_and_normalize().expect_err("library id 0 reserved");
    assert!(err.to_string().contains("LibraryId"), "{err:#}");
}

#[test]
fn test_rejects_empty_channel_list() {
    let yaml = r#"
library:
  LibraryId: 7
  EngineChannels: []
  ReplyTimeoutMs: 1000
  ReconnectAttempts: 2
replay:
  LogFileDir: "/tmp/fix-logs"
  StreamId: 1
"#;
    let mut cfg: Config = serde_yaml::from_str(yaml).expect("parse");
    assert!(cfg.validate_and_normalize().is_err());
}
