use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const DEFAULT_ROTATION_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ROTATION_MAX_FILES: usize = 5;

/// Size-based rotation settings for append-only NDJSON files.
///
/// `max_files` counts the live file plus its numbered backups. A zero in
/// either field disables rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotationPolicy {
    pub max_bytes: u64,
    pub max_files: usize,
}

impl Default for LogRotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_ROTATION_MAX_BYTES,
            max_files: DEFAULT_ROTATION_MAX_FILES,
        }
    }
}

impl LogRotationPolicy {
    pub fn disabled() -> Self {
        Self {
            max_bytes: 0,
            max_files: 0,
        }
    }

    pub fn is_enabled(self) -> bool {
        self.max_bytes > 0 && self.max_files > 0
    }
}

/// Appends one line to `path`, rotating first when the write would push the
/// file past `policy.max_bytes`.
pub fn append_line_with_rotation(path: &Path, line: &str, policy: LogRotationPolicy) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    if policy.is_enabled() && path.exists() {
        let current_size = std::fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        let incoming_size = u64::try_from(line.len().saturating_add(1)).unwrap_or(u64::MAX);
        if current_size.saturating_add(incoming_size) > policy.max_bytes {
            rotate(path, policy)?;
        }
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("failed to append {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}

pub fn rotated_backup_path(path: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), index))
}

fn rotate(path: &Path, policy: LogRotationPolicy) -> Result<()> {
    if policy.max_files <= 1 {
        return std::fs::remove_file(path)
            .with_context(|| format!("failed to truncate {}", path.display()));
    }

    let oldest = policy.max_files - 1;
    for index in (1..=oldest).rev() {
        let source = if index == 1 {
            path.to_path_buf()
        } else {
            rotated_backup_path(path, index - 1)
        };
        if !source.exists() {
            continue;
        }
        let destination = rotated_backup_path(path, index);
        if destination.exists() {
            std::fs::remove_file(&destination)
                .with_context(|| format!("failed to drop {}", destination.display()))?;
        }
        std::fs::rename(&source, &destination).with_context(|| {
            format!(
                "failed to rotate {} to {}",
                source.display(),
                destination.display()
            )
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{append_line_with_rotation, rotated_backup_path, LogRotationPolicy};

    #[test]
    fn functional_append_rotates_once_threshold_is_crossed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("outbox/acme.ndjson");
        let policy = LogRotationPolicy {
            max_bytes: 24,
            max_files: 3,
        };

        append_line_with_rotation(&path, r#"{"seq":1,"kind":"first"}"#, policy).expect("first");
        append_line_with_rotation(&path, r#"{"seq":2,"kind":"second"}"#, policy).expect("second");

        let backup = std::fs::read_to_string(rotated_backup_path(&path, 1)).expect("backup");
        assert!(backup.contains("\"seq\":1"));
        let live = std::fs::read_to_string(&path).expect("live");
        assert!(live.contains("\"seq\":2"));
        assert!(!live.contains("\"seq\":1"));
    }

    #[test]
    fn regression_append_keeps_backup_count_within_limit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("acme.ndjson");
        let policy = LogRotationPolicy {
            max_bytes: 18,
            max_files: 2,
        };
        for seq in 1..=6 {
            append_line_with_rotation(&path, &format!(r#"{{"seq":{seq}}}"#), policy)
                .expect("append");
        }
        assert!(rotated_backup_path(&path, 1).exists());
        assert!(!rotated_backup_path(&path, 2).exists());
    }

    #[test]
    fn unit_disabled_policy_never_rotates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("acme.ndjson");
        for seq in 1..=4 {
            append_line_with_rotation(&path, &format!("line-{seq}"), LogRotationPolicy::disabled())
                .expect("append");
        }
        assert!(!rotated_backup_path(&path, 1).exists());
        let live = std::fs::read_to_string(&path).expect("live");
        assert_eq!(live.lines().count(), 4);
    }
}
