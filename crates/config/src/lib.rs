//! Configuration loading, persistence, and load-time upgrade.
//!
//! Config files: `tgsync.toml`, `tgsync.yaml`, or `tgsync.json`
//! Searched in `./` then `~/.config/tgsync/`.

pub mod loader;
pub mod schema;
pub mod store;
pub mod upgrade;

pub use {
    loader::{
        config_dir, data_dir, discover_and_load, find_or_default_config_path, load_config,
        save_config,
    },
    schema::{DistributionRule, FilterCondition, StatusIndicatorMode, SyncConfig},
    store::{ConfigStore, FileConfigStore, MemoryConfigStore},
    upgrade::{UpgradeReport, upgrade},
};
