// src/providers.rs
// Typed provider blocks and the ordered `instances` selection mechanism.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::errors::SettingsError;

// Implemented by every per-instance settings struct so the generic
// resolution logic can scan any provider's instance list.
pub trait InstanceSettings {
    fn is_default(&self) -> bool;
}

// An ordered sequence of named instances, as written in the settings file:
// each element is a single-key mapping of instance name to its settings.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(transparent)]
pub struct Instances<T>(pub Vec<HashMap<String, T>>);

impl<T> Default for Instances<T> {
    fn default() -> Self {
        Instances(Vec::new())
    }
}

impl<T> Instances<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate (name, settings) pairs in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0
            .iter()
            .flat_map(|entry| entry.iter().map(|(name, inst)| (name.as_str(), inst)))
    }

    /// Every element must carry exactly one instance name.
    pub fn validate_shape(&self, provider: &str) -> Result<(), SettingsError> {
        for entry in &self.0 {
            if entry.len() != 1 {
                return Err(SettingsError::MalformedInstance {
                    provider: provider.to_string(),
                    detail: format!(
                        "expected one name per instance entry, found {}",
                        entry.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

impl<T: InstanceSettings> Instances<T> {
    /// Resolve the instance marked `default: true`.
    ///
    /// Zero marked instances is an error because the caller asked for a
    /// default; more than one marked is an ambiguity error and is never
    /// resolved to the first match.
    pub fn default_instance(&self, provider: &str) -> Result<(&str, &T), SettingsError> {
        let marked: Vec<(&str, &T)> = self.iter().filter(|(_, inst)| inst.is_default()).collect();
        match marked.len() {
            0 => Err(SettingsError::MissingDefault {
                provider: provider.to_string(),
            }),
            1 => {
                debug!("Resolved default instance '{}' for {}", marked[0].0, provider);
                Ok(marked[0])
            }
            _ => Err(SettingsError::AmbiguousDefault {
                provider: provider.to_string(),
                names: marked.iter().map(|(name, _)| name.to_string()).collect(),
            }),
        }
    }

    /// Look up an instance by its configured name.
    pub fn named(&self, provider: &str, name: &str) -> Result<(&str, &T), SettingsError> {
        self.iter()
            .find(|(inst_name, _)| *inst_name == name)
            .ok_or_else(|| SettingsError::UnknownInstance {
                provider: provider.to_string(),
                name: name.to_string(),
            })
    }

    /// Shape check plus the at-most-one-default invariant.
    pub fn validate(&self, provider: &str) -> Result<(), SettingsError> {
        self.validate_shape(provider)?;
        let marked: Vec<&str> = self
            .iter()
            .filter(|(_, inst)| inst.is_default())
            .map(|(name, _)| name)
            .collect();
        if marked.len() > 1 {
            return Err(SettingsError::AmbiguousDefault {
                provider: provider.to_string(),
                names: marked.iter().map(|name| name.to_string()).collect(),
            });
        }
        Ok(())
    }
}

// ---- AnsibleTower ----

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AnsibleTowerSettings {
    #[serde(default)]
    pub instances: Instances<AnsibleTowerInstance>,
    #[serde(default = "default_release_workflow")]
    pub release_workflow: String,
    #[serde(default = "default_extend_workflow")]
    pub extend_workflow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_expire_time: Option<String>,
    #[serde(default = "default_workflow_timeout")]
    pub workflow_timeout: u64, // seconds
    #[serde(default = "default_results_limit")]
    pub results_limit: u32,
    #[serde(default = "default_error_scope")]
    pub error_scope: String,
    // Tower-specific keys this loader does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_release_workflow() -> String {
    "remove-vm".to_string()
}
fn default_extend_workflow() -> String {
    "extend-vm".to_string()
}
fn default_workflow_timeout() -> u64 {
    3600
}
fn default_results_limit() -> u32 {
    50
}
fn default_error_scope() -> String {
    "last".to_string()
}

impl Default for AnsibleTowerSettings {
    fn default() -> Self {
        AnsibleTowerSettings {
            instances: Instances::default(),
            release_workflow: default_release_workflow(),
            extend_workflow: default_extend_workflow(),
            new_expire_time: None,
            workflow_timeout: default_workflow_timeout(),
            results_limit: default_results_limit(),
            error_scope: default_error_scope(),
            extra: HashMap::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AnsibleTowerInstance {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<String>,
    #[serde(default)]
    pub default: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl InstanceSettings for AnsibleTowerInstance {
    fn is_default(&self) -> bool {
        self.default
    }
}

// ---- Container ----

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ContainerSettings {
    #[serde(default)]
    pub instances: Instances<ContainerInstance>,
    #[serde(default = "default_container_runtime")]
    pub runtime: String,
    #[serde(default)]
    pub auto_map_ports: bool,
    #[serde(default = "default_results_limit")]
    pub results_limit: u32,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_container_runtime() -> String {
    "docker".to_string()
}

impl Default for ContainerSettings {
    fn default() -> Self {
        ContainerSettings {
            instances: Instances::default(),
            runtime: default_container_runtime(),
            auto_map_ports: false,
            results_limit: default_results_limit(),
            extra: HashMap::new(),
        }
    }
}

impl ContainerSettings {
    /// The runtime for one instance; the provider-wide runtime is the fallback.
    pub fn runtime_for<'a>(&'a self, instance: &'a ContainerInstance) -> &'a str {
        instance.runtime.as_deref().unwrap_or(&self.runtime)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ContainerInstance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub default: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl InstanceSettings for ContainerInstance {
    fn is_default(&self) -> bool {
        self.default
    }
}

// ---- Foreman ----

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ForemanSettings {
    #[serde(default)]
    pub instances: Instances<ForemanInstance>,
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_name_prefix() -> String {
    "hostbroker".to_string()
}

impl Default for ForemanSettings {
    fn default() -> Self {
        ForemanSettings {
            instances: Instances::default(),
            name_prefix: default_name_prefix(),
            extra: HashMap::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ForemanInstance {
    pub foreman_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreman_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreman_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub verify: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl InstanceSettings for ForemanInstance {
    fn is_default(&self) -> bool {
        self.default
    }
}

// ---- Beaker ----

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BeakerSettings {
    #[serde(default)]
    pub instances: Instances<BeakerInstance>,
    #[serde(default = "default_max_job_wait")]
    pub max_job_wait: String, // e.g. "24h"
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_max_job_wait() -> String {
    "24h".to_string()
}

impl Default for BeakerSettings {
    fn default() -> Self {
        BeakerSettings {
            instances: Instances::default(),
            max_job_wait: default_max_job_wait(),
            extra: HashMap::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BeakerInstance {
    pub hub_url: String,
    #[serde(default)]
    pub default: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl InstanceSettings for BeakerInstance {
    fn is_default(&self) -> bool {
        self.default
    }
}

// ---- TestProvider ----

// Instance shape is fully opaque apart from the default marker.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct TestProviderSettings {
    #[serde(default)]
    pub instances: Instances<TestProviderInstance>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct TestProviderInstance {
    #[serde(default)]
    pub default: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl InstanceSettings for TestProviderInstance {
    fn is_default(&self) -> bool {
        self.default
    }
}

// A borrowed view over one provider's block in the settings document.
#[derive(Debug, Clone, Copy)]
pub enum ProviderBlock<'a> {
    AnsibleTower(&'a AnsibleTowerSettings),
    Container(&'a ContainerSettings),
    Foreman(&'a ForemanSettings),
    Beaker(&'a BeakerSettings),
    Test(&'a TestProviderSettings),
    // A provider this loader has no schema for, carried verbatim.
    Unknown(&'a Value),
}

impl ProviderBlock<'_> {
    pub fn validate(&self, provider: &str) -> Result<(), SettingsError> {
        match self {
            ProviderBlock::AnsibleTower(block) => block.instances.validate(provider),
            ProviderBlock::Container(block) => block.instances.validate(provider),
            ProviderBlock::Foreman(block) => block.instances.validate(provider),
            ProviderBlock::Beaker(block) => block.instances.validate(provider),
            ProviderBlock::Test(block) => block.instances.validate(provider),
            ProviderBlock::Unknown(_) => Ok(()),
        }
    }
}
