use super::types::Result;

/// Kernel-side mirror of the pid to containment-state table. The hook
/// programs consult this map on every guarded syscall, so every transition
/// userspace applies must be written through here or live enforcement never
/// sees it.
pub trait KernelStateMap: Send + Sync {
    fn write_state(&self, pid: u32, state: u8) -> Result<()>;

    /// Drop a pid's entry once the process is gone. Absent entries are not
    /// an error.
    fn remove(&self, pid: u32) -> Result<()>;
}

/// Stand-in for builds without kernel attachment: the noop and replay
/// backends enforce nothing, so there is no map to keep in sync.
#[derive(Debug, Default)]
pub struct NoopKernelStateMap;

impl KernelStateMap for NoopKernelStateMap {
    fn write_state(&self, _pid: u32, _state: u8) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _pid: u32) -> Result<()> {
        Ok(())
    }
}
