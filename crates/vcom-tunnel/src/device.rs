//! Pseudo-device manager: allocate a pty pair, configure the line, publish the
//! slave under a stable path.
//!
//! [`PseudoDevice`] owns the master and slave descriptors and the published
//! link. Teardown is idempotent and also runs on drop, so every exit path
//! (including a failed `open` or `publish`) releases what was acquired.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{FromRawFd, IntoRawFd};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nix::fcntl::OFlag;
use nix::pty::{grantpt, posix_openpt, unlockpt, PtyMaster};
use vcom_config::SerialSettings;

use crate::error::TunnelError;
use crate::line_config;

/// Mode applied to the slave so unprivileged peers can open it.
const SLAVE_MODE: u32 = 0o666;

// =============================================================================
// PSEUDO DEVICE
// =============================================================================

#[derive(Debug)]
pub struct PseudoDevice {
    master: Option<Arc<File>>,
    slave: Option<File>,
    slave_path: PathBuf,
    link: Option<PathBuf>,
}

impl PseudoDevice {
    /// Allocate a pty pair and apply `settings` to the master.
    ///
    /// The slave stays open for the device's lifetime so the master never
    /// reports hang-up while no application has the port open.
    pub fn open(settings: &SerialSettings) -> Result<Self, TunnelError> {
        // Non-blocking: the loops wait with poll, and a full slave queue must
        // surface as an error instead of parking a thread inside write().
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY | OFlag::O_NONBLOCK)
            .map_err(|e| TunnelError::device("posix_openpt", e))?;
        grantpt(&master).map_err(|e| TunnelError::device("grantpt", e))?;
        unlockpt(&master).map_err(|e| TunnelError::device("unlockpt", e))?;
        let slave_path = slave_name(&master)?;

        // From here on the master is a plain File: shareable across the
        // forwarding threads through `&File` reads and writes.
        // SAFETY: `into_raw_fd` transfers sole ownership of a valid descriptor.
        let master = unsafe { File::from_raw_fd(master.into_raw_fd()) };

        let slave = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NOCTTY.bits())
            .open(&slave_path)
            .map_err(|e| TunnelError::device("open slave", e))?;

        line_config::apply(&master, settings)?;

        tracing::info!(
            slave = %slave_path.display(),
            settings = %settings,
            "pseudo-terminal allocated"
        );

        Ok(Self {
            master: Some(Arc::new(master)),
            slave: Some(slave),
            slave_path,
            link: None,
        })
    }

    /// Publish the slave at `path` as a symbolic link and open its permissions.
    ///
    /// Any existing file at `path` is removed first.
    pub fn publish(&mut self, path: &Path) -> Result<(), TunnelError> {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed stale file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(TunnelError::Publish {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }

        std::os::unix::fs::symlink(&self.slave_path, path).map_err(|source| {
            TunnelError::Publish {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.link = Some(path.to_path_buf());

        if let Err(e) = std::fs::set_permissions(
            &self.slave_path,
            std::fs::Permissions::from_mode(SLAVE_MODE),
        ) {
            tracing::warn!(
                slave = %self.slave_path.display(),
                error = %e,
                "could not relax slave permissions"
            );
        }

        tracing::info!(
            path = %path.display(),
            slave = %self.slave_path.display(),
            "virtual serial port published"
        );
        Ok(())
    }

    /// Shared handle to the master for the forwarding loops.
    pub fn master(&self) -> Option<Arc<File>> {
        self.master.clone()
    }

    /// Real path of the pty slave (e.g. `/dev/pts/3`).
    pub fn slave_path(&self) -> &Path {
        &self.slave_path
    }

    /// Path of the published link, if any.
    pub fn link_path(&self) -> Option<&Path> {
        self.link.as_deref()
    }

    /// Close both descriptors and remove the published link.
    ///
    /// Safe to call repeatedly. The master closes once the last shared handle
    /// held by a forwarding loop is dropped.
    pub fn teardown(&mut self) {
        if let Some(link) = self.link.take() {
            match std::fs::remove_file(&link) {
                Ok(()) => tracing::debug!(path = %link.display(), "published link removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %link.display(),
                    error = %e,
                    "failed to remove published link"
                ),
            }
        }
        self.slave = None;
        self.master = None;
    }
}

impl Drop for PseudoDevice {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(target_os = "linux")]
fn slave_name(master: &PtyMaster) -> Result<PathBuf, TunnelError> {
    nix::pty::ptsname_r(master)
        .map(PathBuf::from)
        .map_err(|e| TunnelError::device("ptsname", e))
}

#[cfg(not(target_os = "linux"))]
fn slave_name(master: &PtyMaster) -> Result<PathBuf, TunnelError> {
    // SAFETY: called once during setup, before any other thread could call
    // `ptsname` and overwrite its static buffer.
    unsafe { nix::pty::ptsname(master) }
        .map(PathBuf::from)
        .map_err(|e| TunnelError::device("ptsname", e))
}

// =============================================================================
// TESTS
// =============================================================================
