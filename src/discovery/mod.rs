// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Publishes the port/auth descriptor and the env-sourceable shell script
//! under a shared temporary directory, and reaps descriptors left behind by
//! processes that are no longer alive.
//!
//! The atomic-publish primitive (temp file + rename, then `chmod 0600`) is
//! grounded on `FileLockManager::atomic_write_bytes`. Liveness probing for
//! the reaper is grounded on `session::is_process_alive`.

use anyhow::{Context as _, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;

/// The JSON descriptor advertising this bridge's port and auth token.
#[derive(Debug, Clone, Serialize)]
pub struct PortDescriptor {
    pub port: u16,
    #[serde(rename = "workspacePath")]
    pub workspace_path: String,
    #[serde(rename = "authToken")]
    pub auth_token: Uuid,
    #[serde(rename = "ideInfo", skip_serializing_if = "Option::is_none")]
    pub ide_info: Option<IdeInfo>,
}

/// Optional editor identification embedded in the descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct IdeInfo {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

const STALE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Returns `<tmp>/gemini/ide`, creating it if absent.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_discovery_dir() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join("gemini").join("ide");
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    Ok(dir)
}

/// Publishes both the descriptor and the env script for this process,
/// atomically and mode `0600`. Returns the two paths written.
///
/// # Errors
///
/// Returns an error if the discovery directory cannot be ensured or either
/// file cannot be written.
pub fn publish(
    dir: &Path,
    descriptor: &PortDescriptor,
    editor_id: &str,
) -> Result<(PathBuf, PathBuf)> {
    let pid = std::process::id();
    let descriptor_path = dir.join(format!("gemini-ide-server-{pid}-{}.json", descriptor.port));
    let env_path = dir.join(format!("{editor_id}-env-{pid}.sh"));

    let descriptor_bytes = serde_json::to_vec_pretty(descriptor)?;
    atomic_write_bytes(&descriptor_path, &descriptor_bytes)?;

    let env_script = render_env_script(descriptor, editor_id);
    atomic_write_bytes(&env_path, env_script.as_bytes())?;

    Ok((descriptor_path, env_path))
}

fn render_env_script(descriptor: &PortDescriptor, editor_id: &str) -> String {
    format!(
        "export GEMINI_IDE_SERVER_PORT={}\nexport GEMINI_IDE_WORKSPACE_PATH={}\nexport GEMINI_IDE_AUTH_TOKEN={}\nexport GEMINI_IDE_EDITOR={editor_id}\n",
        descriptor.port, descriptor.workspace_path, descriptor.auth_token,
    )
}

/// Removes the descriptor and env script written by [`publish`]. Best-effort:
/// missing files are not an error.
pub fn unpublish(descriptor_path: &Path, env_path: &Path) {
    if let Err(e) = fs::remove_file(descriptor_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove descriptor {}: {e}", descriptor_path.display());
        }
    }
    if let Err(e) = fs::remove_file(env_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove env script {}: {e}", env_path.display());
        }
    }
}

/// Atomically writes `data` to `path` via temp-file-then-rename, then
/// chmods it to `0600`.
///
/// # Errors
///
/// Returns an error if the temp file cannot be written, renamed, or
/// permissioned.
fn atomic_write_bytes(path: &Path, data: &[u8]) -> Result<()> {
    let pid = std::process::id();
    let temp_path = path.with_extension(format!("tmp.{pid}"));

    fs::write(&temp_path, data)
        .with_context(|| format!("failed to write temp file {}", temp_path.display()))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        anyhow::anyhow!("failed to rename {} -> {}: {e}", temp_path.display(), path.display())
    })?;

    set_mode_0600(path)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode_0600(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(0o600);
    fs::set_permissions(path, perms).with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode_0600(_path: &Path) -> Result<()> {
    Ok(())
}

/// Scans `dir` for stale descriptor/env files and unlinks them.
///
/// A file is stale if its mtime is older than 24 hours, or if the pid
/// embedded in its name no longer identifies a live process. Per-file
/// errors are swallowed; a missing directory is not an error.
pub fn reap_stale(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => {
            warn!("failed to scan discovery directory {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(pid) = extract_pid(name) else {
            continue;
        };

        let stale_by_age = file_age(&path).is_none_or(|age| age > STALE_AGE);
        if stale_by_age || !is_process_alive(pid) {
            if let Err(e) = fs::remove_file(&path) {
                debug!("failed to reap stale discovery file {}: {e}", path.display());
            } else {
                debug!("reaped stale discovery file {}", path.display());
            }
        }
    }
}

fn extract_pid(name: &str) -> Option<u32> {
    if let Some(rest) = name.strip_prefix("gemini-ide-server-") {
        let pid_str = rest.split('-').next()?;
        return pid_str.parse().ok();
    }
    if let Some(idx) = name.find("-env-") {
        let rest = &name[idx + "-env-".len()..];
        let pid_str = rest.split('.').next()?;
        return pid_str.parse().ok();
    }
    None
}

fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

fn is_process_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new("/proc").join(pid.to_string()).exists()
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    {
        std::process::Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}
