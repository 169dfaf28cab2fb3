// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for appserver.

use std::path::PathBuf;
use std::time::Duration;

use crate::container::ContainerSettings;
use crate::descriptor::{self, ApplicationContext};

/// Appserver configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings of the application container
    pub container: ContainerSettings,
    /// Idle tick of application worker threads
    pub application_tick: Duration,
    /// JSON file with application descriptors
    pub applications_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ContainerSettings::default();

        let name = non_empty_var("APPSERVER_CONTAINER_NAME")?.unwrap_or(defaults.name);
        let runlevel = non_empty_var("APPSERVER_RUNLEVEL")?.unwrap_or(defaults.runlevel);

        let app_base = std::env::var("APPSERVER_APP_BASE")
            .map(PathBuf::from)
            .unwrap_or(defaults.app_base);
        let tmp_dir = std::env::var("APPSERVER_TMP_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.tmp_dir);

        let user = std::env::var("APPSERVER_USER").unwrap_or(defaults.user);
        let group = std::env::var("APPSERVER_GROUP").unwrap_or(defaults.group);

        let umask = match std::env::var("APPSERVER_UMASK") {
            Ok(value) => parse_umask(&value)?,
            Err(_) => defaults.umask,
        };

        let provisioning_enabled = std::env::var("APPSERVER_PROVISIONING")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.provisioning_enabled);

        let tick_ms: u64 = std::env::var("APPSERVER_APP_TTL_MS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidTick)?;
        if tick_ms == 0 {
            return Err(ConfigError::InvalidTick);
        }

        let applications_file = std::env::var("APPSERVER_APPLICATIONS")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            container: ContainerSettings {
                name,
                runlevel,
                app_base,
                tmp_dir,
                user,
                group,
                umask,
                provisioning_enabled,
            },
            application_tick: Duration::from_millis(tick_ms),
            applications_file,
        })
    }

    /// Load the configured application descriptors; none if no file is configured.
    pub fn load_applications(&self) -> crate::Result<Vec<ApplicationContext>> {
        match &self.applications_file {
            Some(path) => descriptor::load_descriptors(path),
            None => Ok(Vec::new()),
        }
    }
}

fn non_empty_var(key: &'static str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key)),
        Ok(value) => Ok(Some(value)),
        Err(_) => Ok(None),
    }
}

fn parse_umask(value: &str) -> Result<u32, ConfigError> {
    let digits = value.trim_start_matches("0o");
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|umask| *umask <= 0o777)
        .ok_or_else(|| ConfigError::InvalidUmask(value.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable that must not be blank is set to an empty value.
    #[error("Environment variable {0} must not be empty")]
    EmptyValue(&'static str),
    /// The umask is not an octal number up to 0777.
    #[error("Invalid umask '{0}', expected an octal value like 0002")]
    InvalidUmask(String),
    /// The application tick is not a positive number of milliseconds.
    #[error("Invalid application tick, expected a positive number of milliseconds")]
    InvalidTick,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 10] = [
        "APPSERVER_CONTAINER_NAME",
        "APPSERVER_RUNLEVEL",
        "APPSERVER_APP_BASE",
        "APPSERVER_TMP_DIR",
        "APPSERVER_USER",
        "APPSERVER_GROUP",
        "APPSERVER_UMASK",
        "APPSERVER_PROVISIONING",
        "APPSERVER_APP_TTL_MS",
        "APPSERVER_APPLICATIONS",
    ];

    fn clear_env() {
        // SAFETY: Tests are marked #[serial] to run sequentially, avoiding env var races
        unsafe {
            for var in VARS {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.container, ContainerSettings::default());
        assert_eq!(config.container.umask, 0o002);
        assert_eq!(config.application_tick, Duration::from_millis(100));
        assert!(config.applications_file.is_none());
        assert!(config.load_applications().unwrap().is_empty());
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        // SAFETY: Tests are marked #[serial] to run sequentially, avoiding env var races
        unsafe {
            env::set_var("APPSERVER_CONTAINER_NAME", "message-queue");
            env::set_var("APPSERVER_UMASK", "0022");
            env::set_var("APPSERVER_PROVISIONING", "true");
            env::set_var("APPSERVER_APP_TTL_MS", "25");
            env::set_var("APPSERVER_APPLICATIONS", "/etc/appserver/applications.json");
        }

        let config = Config::from_env().unwrap();
        clear_env();

        assert_eq!(config.container.name, "message-queue");
        assert_eq!(config.container.umask, 0o022);
        assert!(config.container.provisioning_enabled);
        assert_eq!(config.application_tick, Duration::from_millis(25));
        assert_eq!(
            config.applications_file,
            Some(PathBuf::from("/etc/appserver/applications.json"))
        );
    }

    #[test]
    #[serial]
    fn test_invalid_values() {
        clear_env();
        // SAFETY: Tests are marked #[serial] to run sequentially, avoiding env var races
        unsafe {
            env::set_var("APPSERVER_UMASK", "0999");
        }
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidUmask(_))
        ));

        clear_env();
        unsafe {
            env::set_var("APPSERVER_APP_TTL_MS", "0");
        }
        assert!(matches!(Config::from_env(), Err(ConfigError::InvalidTick)));

        clear_env();
        unsafe {
            env::set_var("APPSERVER_CONTAINER_NAME", " ");
        }
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::EmptyValue("APPSERVER_CONTAINER_NAME"))
        ));
        clear_env();
    }
}
