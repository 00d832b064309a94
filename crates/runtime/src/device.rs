//! Device pinning.
//!
//! Only the device whose id matches `main_device_id` may connect. Every other
//! install stays idle so two devices never process the same backend stream.

use std::{io, path::Path};

use tracing::{debug, info};

use tgsync_config::SyncConfig;

const DEVICE_ID_FILE: &str = "device-id";

/// `true` when a main device is configured and it is not `current`.
#[must_use]
pub fn is_blocked(main_device_id: Option<&str>, current_device_id: &str) -> bool {
    main_device_id.is_some_and(|main| main != current_device_id)
}

/// Stable id of the device this process runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    current: String,
}

impl DeviceIdentity {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
        }
    }

    /// Read the id persisted in `data_dir`, creating one on first use.
    pub fn load_or_create(data_dir: &Path) -> io::Result<Self> {
        let path = data_dir.join(DEVICE_ID_FILE);
        match std::fs::read_to_string(&path) {
            Ok(raw) if !raw.trim().is_empty() => {
                debug!(path = %path.display(), "loaded device id");
                return Ok(Self::new(raw.trim()));
            },
            Ok(_) => {},
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => return Err(e),
        }

        std::fs::create_dir_all(data_dir)?;
        let id = uuid::Uuid::new_v4().to_string();
        std::fs::write(&path, &id)?;
        info!(path = %path.display(), device_id = %id, "created device id");
        Ok(Self::new(id))
    }

    #[must_use]
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Whether `config` pins the runtime to some other device.
    #[must_use]
    pub fn is_blocked_by(&self, config: &SyncConfig) -> bool {
        is_blocked(config.main_device_id(), &self.current)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(None, "device-B", false)]
    #[case(Some("device-B"), "device-B", false)]
    #[case(Some("device-A"), "device-B", true)]
    fn blocked_only_on_other_devices(
        #[case] main: Option<&str>,
        #[case] current: &str,
        #[case] blocked: bool,
    ) {
        assert_eq!(is_blocked(main, current), blocked);
    }

    #[test]
    fn blank_main_device_does_not_block() {
        let device = DeviceIdentity::new("device-B");
        let cfg = SyncConfig {
            main_device_id: Some(String::new()),
            ..Default::default()
        };
        assert!(!device.is_blocked_by(&cfg));
    }

    #[test]
    fn device_id_is_created_once_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let first = DeviceIdentity::load_or_create(dir.path()).unwrap();
        let second = DeviceIdentity::load_or_create(dir.path()).unwrap();
        assert_eq!(first, second);
        assert!(uuid::Uuid::parse_str(first.current()).is_ok());
    }

    #[test]
    fn empty_device_id_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEVICE_ID_FILE), "  \n").unwrap();
        let device = DeviceIdentity::load_or_create(dir.path()).unwrap();
        assert!(!device.current().is_empty());
    }
}
