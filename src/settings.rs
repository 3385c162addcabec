// src/settings.rs
// The settings document: discovery, parsing, host-level SSH fallbacks, nicks.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use xdg::BaseDirectories;

use crate::errors::SettingsError;
use crate::providers::{
    AnsibleTowerSettings, BeakerSettings, ContainerSettings, ForemanSettings, ProviderBlock,
    TestProviderSettings,
};

pub const APP_NAME: &str = "hostbroker";
pub const DEFAULT_SETTINGS_FILENAME: &str = "settings.yaml";
pub const SETTINGS_PATH_ENV: &str = "HOSTBROKER_SETTINGS_PATH";

const KNOWN_PROVIDERS: &[&str] = &["AnsibleTower", "Container", "Foreman", "Beaker", "TestProvider"];
const KNOWN_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// A nickname is an opaque bundle of argument overrides, returned verbatim.
pub type Nick = HashMap<String, Value>;

// Root of the settings document. Loaded once, never mutated; the binary
// shares it behind an Arc.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingSettings,

    // Host-level SSH keys, used as fallback defaults by any provider (or
    // Host) needing SSH access. An instance may override each of them.
    #[serde(default = "default_host_username")]
    pub host_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_password: Option<String>,
    #[serde(default = "default_host_ssh_port")]
    pub host_ssh_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ssh_key_filename: Option<String>,
    #[serde(default = "default_host_connection_timeout")]
    pub host_connection_timeout: u64, // seconds
    #[serde(default)]
    pub host_ipv6: bool,
    #[serde(default = "default_true")]
    pub host_ipv4_fallback: bool,
    #[serde(default = "default_ssh_backend")]
    pub ssh_backend: String,

    #[serde(rename = "AnsibleTower", default, skip_serializing_if = "Option::is_none")]
    pub ansible_tower: Option<AnsibleTowerSettings>,
    #[serde(rename = "Container", default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerSettings>,
    #[serde(rename = "Foreman", default, skip_serializing_if = "Option::is_none")]
    pub foreman: Option<ForemanSettings>,
    #[serde(rename = "Beaker", default, skip_serializing_if = "Option::is_none")]
    pub beaker: Option<BeakerSettings>,
    #[serde(rename = "TestProvider", default, skip_serializing_if = "Option::is_none")]
    pub test_provider: Option<TestProviderSettings>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub nicks: HashMap<String, Nick>,

    // Top-level keys this loader has no schema for, unknown provider blocks
    // included. Carried verbatim so re-serialization loses nothing.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_host_username() -> String {
    "root".to_string()
}
fn default_host_ssh_port() -> u16 {
    22
}
fn default_host_connection_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_ssh_backend() -> String {
    "ssh2".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    #[serde(default = "default_console_level")]
    pub console_level: String,
    #[serde(default = "default_file_level")]
    pub file_level: String,
}

fn default_console_level() -> String {
    "info".to_string()
}
fn default_file_level() -> String {
    "debug".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            console_level: default_console_level(),
            file_level: default_file_level(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            logging: LoggingSettings::default(),
            host_username: default_host_username(),
            host_password: None,
            host_ssh_port: default_host_ssh_port(),
            host_ssh_key_filename: None,
            host_connection_timeout: default_host_connection_timeout(),
            host_ipv6: false,
            host_ipv4_fallback: default_true(),
            ssh_backend: default_ssh_backend(),
            ansible_tower: None,
            container: None,
            foreman: None,
            beaker: None,
            test_provider: None,
            nicks: HashMap::new(),
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load the settings document, resolving its location in order:
    /// an explicit path override, the `HOSTBROKER_SETTINGS_PATH` environment
    /// variable, then `settings.yaml` in the XDG config directory.
    pub fn load(path_override: Option<&Path>) -> Result<Self, SettingsError> {
        let settings_path = match path_override {
            Some(path) => {
                debug!("Using provided settings path override: {}", path.display());
                path.to_path_buf()
            }
            None => match env::var_os(SETTINGS_PATH_ENV) {
                Some(value) => {
                    debug!("Using settings path from {}", SETTINGS_PATH_ENV);
                    PathBuf::from(value)
                }
                None => {
                    let xdg_dirs = BaseDirectories::with_prefix(APP_NAME)?;
                    xdg_dirs
                        .find_config_file(DEFAULT_SETTINGS_FILENAME)
                        .ok_or_else(|| SettingsError::SettingsNotFound {
                            searched: format!(
                                "{} and XDG config dirs for {}/{}",
                                SETTINGS_PATH_ENV, APP_NAME, DEFAULT_SETTINGS_FILENAME
                            ),
                        })?
                }
            },
        };
        Self::load_from_path(&settings_path)
    }

    /// Parse the document at an explicit path.
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        info!("Loading settings from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Parse the document from raw YAML contents.
    pub fn load_from_str(contents: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_yaml::from_str(contents)?;
        debug!(
            "Settings parsed ({} provider blocks, {} nicks)",
            settings.provider_names().len(),
            settings.nicks.len()
        );
        Ok(settings)
    }

    /// Re-serialize the document. Every key present at load time survives.
    pub fn to_yaml(&self) -> Result<String, SettingsError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Look up a nickname's override mapping, verbatim.
    pub fn nick(&self, name: &str) -> Result<&Nick, SettingsError> {
        self.nicks.get(name).ok_or_else(|| SettingsError::UnknownNick {
            name: name.to_string(),
        })
    }

    /// Look up a provider block by its document key.
    pub fn provider(&self, name: &str) -> Result<ProviderBlock<'_>, SettingsError> {
        let block = match name {
            "AnsibleTower" => self.ansible_tower.as_ref().map(ProviderBlock::AnsibleTower),
            "Container" => self.container.as_ref().map(ProviderBlock::Container),
            "Foreman" => self.foreman.as_ref().map(ProviderBlock::Foreman),
            "Beaker" => self.beaker.as_ref().map(ProviderBlock::Beaker),
            "TestProvider" => self.test_provider.as_ref().map(ProviderBlock::Test),
            other => self
                .extra
                .get(other)
                .filter(|value| value.is_mapping())
                .map(ProviderBlock::Unknown),
        };
        block.ok_or_else(|| SettingsError::UnknownProvider {
            name: name.to_string(),
        })
    }

    /// Names of every configured provider block, known ones first.
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = KNOWN_PROVIDERS
            .iter()
            .copied()
            .filter(|name| self.provider(name).is_ok())
            .collect();
        let mut unknown: Vec<&str> = self
            .extra
            .iter()
            .filter(|(_, value)| value.is_mapping())
            .map(|(name, _)| name.as_str())
            .collect();
        unknown.sort_unstable();
        names.extend(unknown);
        names
    }

    /// The host SSH key path with `~` expanded, when one is configured.
    pub fn host_ssh_key_path(&self) -> Option<PathBuf> {
        self.host_ssh_key_filename
            .as_deref()
            .map(|raw| PathBuf::from(shellexpand::tilde(raw).into_owned()))
    }

    /// Structural validation pass over the whole document: known logging
    /// levels, well-formed instance entries, at most one default per
    /// provider. Violations are surfaced, never auto-corrected.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for level in [&self.logging.console_level, &self.logging.file_level] {
            if !KNOWN_LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(SettingsError::UnknownLogLevel {
                    value: level.clone(),
                });
            }
        }
        for name in self.provider_names() {
            self.provider(name)?.validate(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InstanceSettings;
    use std::fs;
    use tempfile::TempDir;

    // Mirrors the annotated example settings file shipped with the tool.
    const EXAMPLE: &str = r#"
logging:
  console_level: info
  file_level: debug
host_username: root
host_password: "toor"
host_ssh_port: 22
host_ssh_key_filename: "~/.ssh/id_rsa"
host_ipv6: false
host_ipv4_fallback: true
ssh_backend: ssh2
AnsibleTower:
  instances:
    - my_tower:
        base_url: "https://my_tower.example.com/"
        username: "admin"
        token: "abc123"
        inventory: "My Inventory"
        default: true
    - satlab:
        base_url: "https://satlab.example.com/"
        token: "def456"
  release_workflow: "remove-vm"
  extend_workflow: "extend-vm"
  workflow_timeout: 3600
  results_limit: 50
Container:
  instances:
    - docker:
        host_username: "root"
        host_password: "toor"
        host_port: 22
        runtime: docker
        network: null
        default: true
  runtime: docker
  auto_map_ports: false
Foreman:
  instances:
    - production:
        foreman_url: "https://foreman.example.com"
        foreman_username: "admin"
        foreman_password: "changeme"
        organization: "MyOrg"
        location: "MyLoc"
        verify: false
        default: true
  name_prefix: hostbroker
Beaker:
  instances:
    - main:
        hub_url: "https://beaker.example.com"
        default: true
  max_job_wait: 24h
TestProvider:
  instances:
    - test1:
        foo: bar
        default: true
    - test2:
        foo: baz
    - bad:
        nothing: false
nicks:
  rhel7:
    workflow: "deploy-rhel"
    deploy_rhel_version: "7.9"
    notes: "Deploys a RHEL7 vm"
"#;

    fn example() -> Settings {
        Settings::load_from_str(EXAMPLE).expect("example settings parse")
    }

    // Every mapping key in `expected` must appear in `actual`.
    fn assert_contains_keys(expected: &Value, actual: &Value, path: &str) {
        if let (Value::Mapping(expected_map), Value::Mapping(actual_map)) = (expected, actual) {
            for (key, expected_child) in expected_map {
                let label = format!("{path}.{key:?}");
                let actual_child = actual_map
                    .get(key)
                    .unwrap_or_else(|| panic!("key {label} lost in round trip"));
                assert_contains_keys(expected_child, actual_child, &label);
            }
        }
    }

    #[test]
    fn parses_the_example_document() {
        let settings = example();
        assert_eq!(settings.host_username, "root");
        assert_eq!(settings.host_ssh_port, 22);
        assert!(settings.host_ipv4_fallback);
        let tower = settings.ansible_tower.as_ref().expect("tower block");
        assert_eq!(tower.instances.len(), 2);
        assert_eq!(tower.release_workflow, "remove-vm");
        assert_eq!(settings.beaker.as_ref().unwrap().max_job_wait, "24h");
    }

    #[test]
    fn defaults_apply_to_an_empty_document() {
        let settings = Settings::load_from_str("{}").expect("empty settings");
        assert_eq!(settings.host_username, "root");
        assert_eq!(settings.host_ssh_port, 22);
        assert_eq!(settings.host_connection_timeout, 60);
        assert!(!settings.host_ipv6);
        assert!(settings.host_ipv4_fallback);
        assert_eq!(settings.logging.console_level, "info");
        assert!(settings.provider_names().is_empty());
    }

    #[test]
    fn round_trip_preserves_every_key() {
        let settings = example();
        let rendered = settings.to_yaml().expect("serialize");
        let original: Value = serde_yaml::from_str(EXAMPLE).expect("original value");
        let round_tripped: Value = serde_yaml::from_str(&rendered).expect("round-tripped value");
        assert_contains_keys(&original, &round_tripped, "$");
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = Settings::load_from_str("logging: [unclosed").unwrap_err();
        assert!(matches!(err, SettingsError::YamlError(_)));
    }

    #[test]
    fn nick_lookup_returns_the_mapping_verbatim() {
        let settings = example();
        let nick = settings.nick("rhel7").expect("rhel7 nick");
        assert_eq!(
            nick.get("workflow"),
            Some(&Value::String("deploy-rhel".to_string()))
        );
        assert_eq!(
            nick.get("deploy_rhel_version"),
            Some(&Value::String("7.9".to_string()))
        );
    }

    #[test]
    fn unknown_nick_is_a_lookup_error() {
        let err = example().nick("missing_nick").unwrap_err();
        assert!(matches!(err, SettingsError::UnknownNick { .. }));
    }

    #[test]
    fn unknown_provider_blocks_are_carried_opaquely() {
        let contents = format!("{EXAMPLE}\nSomeCloud:\n  api_key: xyz\n");
        let settings = Settings::load_from_str(&contents).expect("settings with unknown provider");
        let block = settings.provider("SomeCloud").expect("unknown provider block");
        assert!(matches!(block, ProviderBlock::Unknown(_)));
        assert!(settings.provider_names().contains(&"SomeCloud"));
        let err = settings.provider("NoSuchCloud").unwrap_err();
        assert!(matches!(err, SettingsError::UnknownProvider { .. }));
    }

    #[test]
    fn default_instance_resolution_through_the_document() {
        let settings = example();
        let tower = settings.ansible_tower.as_ref().unwrap();
        let (name, inst) = tower.instances.default_instance("AnsibleTower").unwrap();
        assert_eq!(name, "my_tower");
        assert!(inst.is_default());
        // TestProvider carries three instances, exactly one marked default
        let test = settings.test_provider.as_ref().unwrap();
        let (name, _) = test.instances.default_instance("TestProvider").unwrap();
        assert_eq!(name, "test1");
    }

    #[test]
    fn validate_accepts_the_example_and_flags_violations() {
        example().validate().expect("example validates");

        let two_defaults = r#"
TestProvider:
  instances:
    - one:
        default: true
    - two:
        default: true
"#;
        let err = Settings::load_from_str(two_defaults).unwrap().validate().unwrap_err();
        assert!(matches!(err, SettingsError::AmbiguousDefault { .. }));

        let two_named = r#"
TestProvider:
  instances:
    - one:
        default: true
      two: {}
"#;
        let err = Settings::load_from_str(two_named).unwrap().validate().unwrap_err();
        assert!(matches!(err, SettingsError::MalformedInstance { .. }));

        let bad_level = "logging:\n  console_level: loud\n";
        let err = Settings::load_from_str(bad_level).unwrap().validate().unwrap_err();
        assert!(matches!(err, SettingsError::UnknownLogLevel { .. }));
    }

    #[test]
    fn ssh_key_path_is_tilde_expanded() {
        let settings = example();
        let path = settings.host_ssh_key_path().expect("key path");
        assert!(path.is_absolute());
        assert!(path.ends_with(".ssh/id_rsa"));
    }

    #[test]
    fn loads_from_an_explicit_path() {
        let dir = TempDir::new().expect("tmp dir");
        let path = dir.path().join("settings.yaml");
        fs::write(&path, EXAMPLE).expect("write settings");
        let settings = Settings::load(Some(&path)).expect("load from path");
        assert_eq!(settings.nicks.len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = TempDir::new().expect("tmp dir");
        let err = Settings::load_from_path(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, SettingsError::IoError(_)));
    }
}
