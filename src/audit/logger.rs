use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::config::Settings;

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Kind of decision recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Rejected,
    Authorized,
    Identity,
    Sync,
    Dispatch,
}

/// One line of the audit trail
#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    timestamp: String,
    event: AuditEvent,
    uid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_path: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

impl<'a> AuditRecord<'a> {
    fn new(event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event,
            uid: nix::unistd::geteuid().as_raw(),
            action: None,
            reference: None,
            remote: None,
            cache_path: None,
            detail: None,
        }
    }
}

/// Append-only JSON lines record of every gateway decision
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create an AuditLogger writing to `path`
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        // Ensure directory exists
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Create the logger described by the settings, `None` when disabled
    pub fn from_settings(settings: &Settings) -> std::io::Result<Option<Self>> {
        if !settings.audit.enabled {
            return Ok(None);
        }
        Self::with_path(&settings.audit.log_path).map(Some)
    }

    /// Log a rejected command
    pub fn log_rejection(&self, command: &str, reason: &str) -> std::io::Result<()> {
        self.append(&AuditRecord {
            reference: Some(command),
            detail: Some(reason),
            ..AuditRecord::new(AuditEvent::Rejected)
        })
    }

    /// Log an authorized command and where it will be served from
    pub fn log_authorized(
        &self,
        action: &str,
        reference: &str,
        remote: &str,
        cache_path: &Path,
    ) -> std::io::Result<()> {
        self.append(&AuditRecord {
            action: Some(action),
            reference: Some(reference),
            remote: Some(remote),
            cache_path: Some(cache_path),
            ..AuditRecord::new(AuditEvent::Authorized)
        })
    }

    /// Log the identity the gateway committed to before touching the cache
    pub fn log_identity(&self, uid: u32, username: Option<&str>) -> std::io::Result<()> {
        let detail = match username {
            Some(username) => format!("committed to uid {} ({})", uid, username),
            None => format!("committed to uid {} (no passwd entry)", uid),
        };
        self.append(&AuditRecord {
            detail: Some(&detail),
            ..AuditRecord::new(AuditEvent::Identity)
        })
    }

    /// Log the outcome of a mirror synchronisation
    pub fn log_sync(&self, remote: &str, cache_path: &Path, outcome: &str) -> std::io::Result<()> {
        self.append(&AuditRecord {
            remote: Some(remote),
            cache_path: Some(cache_path),
            detail: Some(outcome),
            ..AuditRecord::new(AuditEvent::Sync)
        })
    }

    /// Log the command the gateway is about to become
    pub fn log_dispatch(&self, program: &Path, cache_path: &Path) -> std::io::Result<()> {
        let program = program.to_string_lossy();
        self.append(&AuditRecord {
            action: Some(&*program),
            cache_path: Some(cache_path),
            ..AuditRecord::new(AuditEvent::Dispatch)
        })
    }

    fn append(&self, record: &AuditRecord<'_>) -> std::io::Result<()> {
        // Check and rotate log if needed
        self.rotate_if_needed()?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Rotate log file if it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_path)?;
        if metadata.len() > MAX_LOG_SIZE {
            // Rotate: audit.log -> audit.log.1
            let mut backup_path = self.log_path.clone().into_os_string();
            backup_path.push(".1");
            fs::rename(&self.log_path, backup_path)?;
        }

        Ok(())
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_records(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_create_logger() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("nested/audit.log");

        let logger = AuditLogger::with_path(&log_path).unwrap();
        assert_eq!(logger.log_path(), log_path);
        assert!(log_path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_disabled_in_settings() {
        let mut settings = Settings::default();
        settings.audit.enabled = false;
        assert!(AuditLogger::from_settings(&settings).unwrap().is_none());
    }

    #[test]
    fn test_log_authorized() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::with_path(&log_path).unwrap();

        logger
            .log_authorized(
                "git-upload-pack",
                "group/project",
                "git@github.com:group/project",
                Path::new("/var/cache/git/github.com/group/project.git"),
            )
            .unwrap();

        let records = read_records(&log_path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["event"], "authorized");
        assert_eq!(records[0]["action"], "git-upload-pack");
        assert_eq!(records[0]["remote"], "git@github.com:group/project");
        assert_eq!(
            records[0]["cache_path"],
            "/var/cache/git/github.com/group/project.git"
        );
        assert!(records[0]["timestamp"].is_string());
        assert!(records[0].get("detail").is_none());
    }

    #[test]
    fn test_log_rejection_keeps_hostile_input_quoted() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::with_path(&log_path).unwrap();

        logger
            .log_rejection("git-upload-pack 'x'\n{\"event\":\"authorized\"}", "unsafe input")
            .unwrap();

        let records = read_records(&log_path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["event"], "rejected");
        assert_eq!(records[0]["detail"], "unsafe input");
    }

    #[test]
    fn test_multiple_log_entries() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::with_path(&log_path).unwrap();
        let cache_path = Path::new("/var/cache/git/example.com/a");

        logger.log_sync("git@example.com:a", cache_path, "Mirror clone").unwrap();
        logger
            .log_dispatch(Path::new("/usr/bin/git-upload-pack"), cache_path)
            .unwrap();

        let records = read_records(&log_path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["event"], "sync");
        assert_eq!(records[1]["event"], "dispatch");
        assert_eq!(records[1]["action"], "/usr/bin/git-upload-pack");
    }

    #[test]
    fn test_log_identity() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::with_path(&log_path).unwrap();

        logger.log_identity(998, Some("gitcache")).unwrap();
        logger.log_identity(4242, None).unwrap();

        let records = read_records(&log_path);
        assert_eq!(records[0]["event"], "identity");
        assert_eq!(records[0]["detail"], "committed to uid 998 (gitcache)");
        assert_eq!(records[1]["detail"], "committed to uid 4242 (no passwd entry)");
    }

    #[test]
    fn test_log_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::with_path(&log_path).unwrap();

        // Write a large entry to trigger rotation
        let large_reason = "x".repeat(MAX_LOG_SIZE as usize);
        logger.log_rejection("git-upload-pack", &large_reason).unwrap();

        // Write another entry - should trigger rotation
        logger.log_rejection("git-upload-pack", "short").unwrap();

        // Check backup file exists
        let backup_path = temp_dir.path().join("audit.log.1");
        assert!(backup_path.exists());

        // New log should exist and be smaller
        let metadata = fs::metadata(&log_path).unwrap();
        assert!(metadata.len() < MAX_LOG_SIZE);
    }
}
