//! Shared helpers for CLI integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use tempfile::TempDir;

/// Variables the plugin reads; cleared so the host environment cannot leak in.
const PLUGIN_VARS: &[&str] = &[
    "CSI_DRIVER_NAME",
    "CLUSTER_ID",
    "MGMTD_ADDRESSES",
    "MGMtd_ADDRESSES",
    "MGMTPD_ADDRESSES",
    "MGMtd_ADDRESSES_JSON",
    "GLOBAL_MOUNT_BASE",
    "CONFIG_DIR",
    "TOKEN_FILE",
    "HF3FS_BINARY_PATH",
    "LOG_LEVEL",
    "NODE_ID",
    "RUST_LOG",
];

pub struct TestContext {
    pub cmd: Command,
    pub home: TempDir,
}

impl TestContext {
    pub fn new_cmd(&self) -> Command {
        configured(self.home.path())
    }

    /// Same command without any cluster configuration.
    pub fn unconfigured_cmd(&self) -> Command {
        bare()
    }
}

fn bare() -> Command {
    let mut cmd = Command::cargo_bin("hf3fs-csi").unwrap();
    for var in PLUGIN_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn configured(home: &std::path::Path) -> Command {
    let mut cmd = bare();
    cmd.env("CLUSTER_ID", "c1")
        .env("MGMTD_ADDRESSES", r#"["RDMA://192.168.1.1:8000","RDMA://192.168.1.2:8000"]"#)
        .env("GLOBAL_MOUNT_BASE", home.join("mnt"))
        .env("CONFIG_DIR", home.join("etc"))
        .env("TOKEN_FILE", home.join("token.txt"))
        .env("NODE_ID", "node-a");
    cmd
}

/// Command configured for cluster `c1` with all state under a temp dir.
pub fn hf3fs_csi() -> TestContext {
    let home = TempDir::new().unwrap();
    TestContext {
        cmd: configured(home.path()),
        home,
    }
}
