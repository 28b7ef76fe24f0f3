//! Mount orchestration.
//!
//! - [`table`]: read-only mount-table queries (`/proc/self/mountinfo`)
//! - [`ops`]: mount(2)/umount(2) mutations
//! - [`launcher`]: launcher config for `hf3fs_fuse_main`
//! - [`supervisor`]: single-flight client launch and readiness wait
//! - [`bind`]: per-workload bind mounts and propagation
//!
//! [`InMemoryMountTable`] stands in for both the table and the syscalls in
//! tests.

pub mod bind;
pub mod launcher;
mod memory;
pub mod ops;
pub mod process;
pub mod supervisor;
pub mod table;

pub use bind::{BindMountManager, PublishOutcome, UnpublishOutcome};
pub use launcher::{render_launcher_config, write_launcher_config};
pub use memory::InMemoryMountTable;
pub use ops::{MountOps, NativeMountOps};
pub use process::{CommandLauncher, ProcessLauncher};
pub use supervisor::{ClientSupervisor, SharedMount, SupervisorState};
pub use table::{MountInfoEntry, MountTable, ProcMountTable};

/// Propagation type of a mount, from the mountinfo optional fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Shared,
    /// Receives events from a peer group but does not send (`master:N`).
    Slave,
    Private,
    Unbindable,
}
