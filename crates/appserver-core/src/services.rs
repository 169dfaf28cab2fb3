// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Container services used while deploying applications.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::application::Application;
use crate::error::Result;

/// Filesystem side of an application deployment.
pub trait ContainerServices: Send + Sync {
    /// Create the application's temporary, cache and session folders.
    fn create_tmp_folders(&self, application: &Application) -> Result<()>;

    /// Remove stale content from the application's cache folder.
    fn clean_up_folders(&self, application: &Application) -> Result<()>;
}

/// [`ContainerServices`] on the local filesystem.
///
/// Folder locations are read from the application's environment bindings, so
/// the application must be prepared first.
#[derive(Debug, Clone, Default)]
pub struct FilesystemServices;

impl FilesystemServices {
    /// Create the services.
    pub fn new() -> Self {
        Self
    }
}

impl ContainerServices for FilesystemServices {
    fn create_tmp_folders(&self, application: &Application) -> Result<()> {
        let umask = application.umask()?;
        for folder in [
            application.tmp_dir()?,
            application.cache_dir()?,
            application.session_dir()?,
        ] {
            if !folder.is_dir() {
                fs::create_dir_all(&folder)?;
                set_mode(&folder, umask)?;
                debug!(application = %application.name(), folder = %folder.display(), "Created folder");
            }
        }
        Ok(())
    }

    fn clean_up_folders(&self, application: &Application) -> Result<()> {
        let cache_dir = application.cache_dir()?;
        if !cache_dir.is_dir() {
            return Ok(());
        }

        let mut removed = 0usize;
        for entry in fs::read_dir(&cache_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
            removed += 1;
        }

        info!(
            application = %application.name(),
            folder = %cache_dir.display(),
            removed,
            "Cleaned up cache folder"
        );
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, umask: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777 & !umask))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _umask: u32) -> Result<()> {
    Ok(())
}
