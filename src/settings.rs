use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::counters::{default_counters, CounterSpec};
use crate::reduction::{ReductionConfig, ReductionPolicy};

/// Overrides `policy` when set to `average` or `delta`.
pub const POLICY_ENV_VAR: &str = "JOURNEY_CPU_POLICY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeSettings {
    pub bucket_width_secs: f64,
    pub policy: ReductionPolicy,
    pub attribute_contexts: bool,
    /// Resume a paused run on every step change so each step gets a sample.
    pub resume_on_step: bool,
    pub resume_after_computation: bool,
    /// Keep measuring once `analyse` has written its records.
    pub resume_after_analyse: bool,
    /// Keep the context list across visits until a new session begins.
    pub keep_session_contexts: bool,
    pub counters: Vec<CounterSpec>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            bucket_width_secs: 0.1,
            policy: ReductionPolicy::Delta,
            attribute_contexts: true,
            resume_on_step: false,
            resume_after_computation: true,
            resume_after_analyse: true,
            keep_session_contexts: false,
            counters: default_counters(),
        }
    }
}

impl ProbeSettings {
    pub fn reduction(&self) -> ReductionConfig {
        ReductionConfig {
            bucket_width_secs: self.bucket_width_secs,
            policy: self.policy,
            attribute_contexts: self.attribute_contexts,
            counters: self.counters.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.reduction().validate()
    }

    /// Apply `JOURNEY_CPU_POLICY` if present. Unknown values are logged and ignored.
    pub fn with_env_overrides(self) -> Self {
        let raw = std::env::var(POLICY_ENV_VAR).ok();
        self.with_policy_override(raw.as_deref())
    }

    fn with_policy_override(mut self, raw: Option<&str>) -> Self {
        if let Some(raw) = raw {
            match ReductionPolicy::parse(raw) {
                Ok(policy) => self.policy = policy,
                Err(err) => warn!("ignoring {POLICY_ENV_VAR}: {err}"),
            }
        }
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ProbeSettings>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable as JSON. `JOURNEY_CPU_POLICY` wins over the file.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data: ProbeSettings = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("invalid settings in {}: {err}; using defaults", path.display());
                ProbeSettings::default()
            })
        } else {
            ProbeSettings::default()
        };
        let data = data.with_env_overrides();
        data.validate()
            .with_context(|| format!("invalid settings in {}", path.display()))?;

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn probe(&self) -> ProbeSettings {
        self.read().clone()
    }

    pub fn update_probe(&self, settings: ProbeSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: ProbeSettings = serde_json::from_str(&contents)?;
        let data = data.with_env_overrides();
        data.validate()?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &ProbeSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, ProbeSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProbeSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
