//! Mount table inspection backed by `/proc/self/mountinfo`.
//!
//! Record format (proc(5)):
//!
//! ```text
//! 36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
//! (1)(2)(3)   (4)   (5)      (6)      (7)   (8) (9)   (10)         (11)
//! ```
//!
//! Field 7 is zero or more optional fields terminated by the `-` separator;
//! propagation state lives there (`shared:N`, `master:N`, `unbindable`).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hf3fs_csi_shared::errors::{CsiError, CsiResult};

use super::Propagation;

/// Default location of the calling process's mount table.
pub const PROC_SELF_MOUNTINFO: &str = "/proc/self/mountinfo";

/// Read-only queries against the OS mount table.
///
/// Implementations must be cheap and side-effect free; readiness polling
/// calls them repeatedly.
pub trait MountTable: Send + Sync {
    /// Whether `path` is the mount point of some filesystem.
    ///
    /// A path that does not exist is not a mount point; that is `Ok(false)`,
    /// not an error.
    fn is_mount_point(&self, path: &Path) -> CsiResult<bool>;

    /// Whether the mount containing `path` has shared propagation.
    ///
    /// `path` need not be a mount point itself; the nearest mount at or above
    /// it decides. A path that does not exist is `Ok(false)`.
    fn is_shared_propagation(&self, path: &Path) -> CsiResult<bool>;
}

/// One parsed mountinfo record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfoEntry {
    pub mount_id: u32,
    pub parent_id: u32,
    pub root: PathBuf,
    pub mount_point: PathBuf,
    pub options: String,
    pub optional_fields: Vec<String>,
    pub fs_type: String,
    pub source: String,
}

impl MountInfoEntry {
    pub fn propagation(&self) -> Propagation {
        let has = |prefix: &str| self.optional_fields.iter().any(|f| f.starts_with(prefix));
        if has("shared:") {
            Propagation::Shared
        } else if has("master:") {
            Propagation::Slave
        } else if has("unbindable") {
            Propagation::Unbindable
        } else {
            Propagation::Private
        }
    }
}

/// Mount table read from a mountinfo file.
#[derive(Debug, Clone)]
pub struct ProcMountTable {
    mountinfo: PathBuf,
}

impl Default for ProcMountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcMountTable {
    pub fn new() -> Self {
        Self::with_mountinfo(PROC_SELF_MOUNTINFO)
    }

    /// Read records from a different mountinfo file (e.g. another process's).
    pub fn with_mountinfo<P: AsRef<Path>>(mountinfo: P) -> Self {
        Self {
            mountinfo: mountinfo.as_ref().to_path_buf(),
        }
    }

    /// Parse all records currently in the table.
    pub fn entries(&self) -> CsiResult<Vec<MountInfoEntry>> {
        let content = std::fs::read_to_string(&self.mountinfo).map_err(|e| {
            CsiError::MountTable(format!(
                "failed to read {}: {}",
                self.mountinfo.display(),
                e
            ))
        })?;
        Ok(parse_mountinfo(&content))
    }

    /// Topmost record mounted at `path`, if any.
    ///
    /// When mounts are stacked on the same point the later record is the
    /// visible one.
    pub fn find(&self, path: &Path) -> CsiResult<Option<MountInfoEntry>> {
        let Some(resolved) = resolve_path(path)? else {
            return Ok(None);
        };
        Ok(self
            .entries()?
            .into_iter()
            .rev()
            .find(|e| e.mount_point == resolved))
    }

    /// Topmost record of the mount that contains `path`: the one with the
    /// longest mount point that is an ancestor of (or equal to) `path`.
    pub fn containing(&self, path: &Path) -> CsiResult<Option<MountInfoEntry>> {
        let Some(resolved) = resolve_path(path)? else {
            return Ok(None);
        };
        let mut best: Option<MountInfoEntry> = None;
        for entry in self.entries()? {
            if !resolved.starts_with(&entry.mount_point) {
                continue;
            }
            let deeper = best.as_ref().is_none_or(|b| {
                entry.mount_point.components().count() >= b.mount_point.components().count()
            });
            if deeper {
                best = Some(entry);
            }
        }
        Ok(best)
    }
}

impl MountTable for ProcMountTable {
    fn is_mount_point(&self, path: &Path) -> CsiResult<bool> {
        Ok(self.find(path)?.is_some())
    }

    fn is_shared_propagation(&self, path: &Path) -> CsiResult<bool> {
        Ok(self
            .containing(path)?
            .is_some_and(|e| e.propagation() == Propagation::Shared))
    }
}

/// Resolve `path` to the form the kernel reports in mountinfo.
///
/// Only the parent is canonicalized, so a mount whose filesystem has gone
/// away (a dead FUSE client answers stat with ENOTCONN) still resolves.
/// Returns `None` when the path does not exist.
fn resolve_path(path: &Path) -> CsiResult<Option<PathBuf>> {
    let not_found = |e: &std::io::Error| e.kind() == ErrorKind::NotFound;

    let resolved = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            match std::fs::canonicalize(parent) {
                Ok(parent) => parent.join(name),
                Err(e) if not_found(&e) => return Ok(None),
                Err(e) => {
                    return Err(CsiError::MountTable(format!(
                        "failed to resolve {}: {}",
                        parent.display(),
                        e
                    )));
                }
            }
        }
        _ => match std::fs::canonicalize(path) {
            Ok(p) => p,
            Err(e) if not_found(&e) => return Ok(None),
            Err(e) => {
                return Err(CsiError::MountTable(format!(
                    "failed to resolve {}: {}",
                    path.display(),
                    e
                )));
            }
        },
    };

    match std::fs::symlink_metadata(&resolved) {
        Ok(_) => Ok(Some(resolved)),
        Err(e) if not_found(&e) => Ok(None),
        // Present but unreadable, typically a disconnected FUSE mount
        Err(_) => Ok(Some(resolved)),
    }
}

/// Parse mountinfo content, skipping malformed lines.
pub fn parse_mountinfo(content: &str) -> Vec<MountInfoEntry> {
    content.lines().filter_map(parse_mountinfo_line).collect()
}

fn parse_mountinfo_line(line: &str) -> Option<MountInfoEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return None;
    }

    let separator = fields.iter().skip(6).position(|f| *f == "-")? + 6;
    if fields.len() < separator + 3 {
        return None;
    }

    Some(MountInfoEntry {
        mount_id: fields[0].parse().ok()?,
        parent_id: fields[1].parse().ok()?,
        root: PathBuf::from(unescape_octal(fields[3])),
        mount_point: PathBuf::from(unescape_octal(fields[4])),
        options: fields[5].to_string(),
        optional_fields: fields[6..separator].iter().map(|s| s.to_string()).collect(),
        fs_type: fields[separator + 1].to_string(),
        source: unescape_octal(fields[separator + 2]),
    })
}

/// Undo the kernel's `\NNN` escaping of space, tab, newline and backslash.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = (bytes[i + 1] - b'0') as u32 * 64
                + (bytes[i + 2] - b'0') as u32 * 8
                + (bytes[i + 3] - b'0') as u32;
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
