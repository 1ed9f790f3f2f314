//! Config-driven setup: file config into settings, logging into a file.

use std::io::Write;

use dataverse_batch::config::DataverseConfig;
use dataverse_batch::logging::{LogTarget, init_tracing};
use dataverse_batch::{ConnectionSettings, CreateOptions};

#[test]
fn config_file_drives_settings_and_options() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[environment]
url = "https://contoso.crm.dynamics.com/"
tenant_id = "tenant"
client_id = "client"
client_secret = "secret"

[batch]
batch_size = 250
parallel = true
workers = 4
pause_ms = 0

[logging]
level = "debug"
"#
    )
    .unwrap();

    let config = DataverseConfig::load_from(file.path()).unwrap();
    let settings = ConnectionSettings::from_config(&config).unwrap();
    let options = CreateOptions::from_config(&config.batch);

    assert_eq!(settings.resource_url, "https://contoso.crm.dynamics.com");
    assert_eq!(options, CreateOptions::parallel(250, 4).with_pause(std::time::Duration::ZERO));
    assert_eq!(config.logging.level(), "debug");
}

#[test]
fn logging_to_file_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DataverseConfig::default().logging;
    config.file = Some(dir.path().join("logs").join("batch.log"));

    let first = init_tracing(&config).unwrap();
    assert!(matches!(first, LogTarget::File(_) | LogTarget::AlreadyInitialized));
    assert_eq!(init_tracing(&config).unwrap(), LogTarget::AlreadyInitialized);
}
