//! Runtime configuration from TOML

use crate::*;
use std::io::Write;
use txscope::{CoreError, DoubleReleasePolicy, EngineConfig, Propagation};

#[test]
fn test_runtime_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
default_policy = "requires_new"

[pool]
max_size = 2
acquire_timeout_ms = 100
double_release = "warn"
"#
    )
    .unwrap();

    let rt = TxRuntime::from_config_file(file.path()).unwrap();

    let config = rt.config();
    assert_eq!(config.default_policy, Propagation::RequiresNew);
    assert_eq!(config.pool.max_size, 2);
    assert_eq!(config.pool.acquire_timeout(), Duration::from_millis(100));
    assert_eq!(config.pool.double_release, DoubleReleasePolicy::Warn);
}

#[test]
fn test_invalid_config_rejected() {
    let err = EngineConfig::from_toml_str("[pool]\nacquire_timeout_ms = 0\n").unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfig(_)));

    let facade: txscope::Error = err.into();
    assert!(matches!(facade, txscope::Error::Config(_)));
}

#[tokio::test]
async fn test_default_policy_drives_run() {
    let config = EngineConfig::from_toml_str("default_policy = \"requires_new\"").unwrap();
    let rt = TxRuntime::builder().config(config).build().unwrap();

    let outcome = rt
        .run(|cx| async move {
            Ok::<_, CoreError>(txscope::current_transaction(&cx).map(|tx| tx.policy()))
        })
        .await;

    assert_eq!(outcome.into_result().unwrap(), Some(Propagation::RequiresNew));
}
