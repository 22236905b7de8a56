//! CPU affinity control for the hosting process.
//!
//! The orchestrator receives a [`CpuControl`] instead of touching the host
//! directly, so core counts and pinning can be simulated.

use std::collections::BTreeSet;
use std::io;
use sysinfo::System;

pub trait CpuControl: Send + Sync {
    /// Number of logical cores on the host.
    fn core_count(&self) -> usize;

    /// Core with the lowest utilisation over a short sampling window.
    fn least_loaded_core(&self) -> usize;

    /// Restrict the whole process to `cores`.
    fn pin(&self, cores: &[usize]) -> io::Result<()>;

    /// Cores the calling thread may currently run on.
    fn current(&self) -> BTreeSet<usize>;
}

/// [`CpuControl`] for the real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCpu;

impl CpuControl for SystemCpu {
    fn core_count(&self) -> usize {
        num_cpus::get()
    }

    fn least_loaded_core(&self) -> usize {
        let mut system = System::new();
        system.refresh_cpu();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu();

        system
            .cpus()
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cpu_usage().total_cmp(&b.1.cpu_usage()))
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }

    fn pin(&self, cores: &[usize]) -> io::Result<()> {
        platform::pin_process(cores)
    }

    fn current(&self) -> BTreeSet<usize> {
        match platform::current() {
            Ok(cores) => cores,
            Err(e) => {
                tracing::debug!("Failed to read CPU affinity: {}", e);
                (0..self.core_count()).collect()
            }
        }
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use std::collections::BTreeSet;
    use std::io;

    fn set_thread_affinity(tid: libc::pid_t, cores: &[usize]) -> io::Result<()> {
        // SAFETY: cpu_set_t is plain data and is fully initialised by CPU_ZERO.
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            for &core in cores {
                libc::CPU_SET(core, &mut set);
            }
            if libc::sched_setaffinity(tid, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    /// Apply the mask to every thread of the process. Threads created later
    /// inherit the mask of the thread that spawns them.
    pub fn pin_process(cores: &[usize]) -> io::Result<()> {
        if cores.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty core set"));
        }

        for entry in std::fs::read_dir("/proc/self/task")? {
            let entry = entry?;
            let Some(tid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<libc::pid_t>().ok())
            else {
                continue;
            };

            match set_thread_affinity(tid, cores) {
                Ok(()) => {}
                // thread exited while we were walking the list
                Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn current() -> io::Result<BTreeSet<usize>> {
        // SAFETY: sched_getaffinity fills the zeroed set for the calling thread.
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut set) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok((0..libc::CPU_SETSIZE as usize)
                .filter(|&core| libc::CPU_ISSET(core, &set))
                .collect())
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use std::collections::BTreeSet;
    use std::io;

    pub fn pin_process(cores: &[usize]) -> io::Result<()> {
        tracing::warn!("CPU pinning is not supported on this platform; ignoring {:?}", cores);
        Ok(())
    }

    pub fn current() -> io::Result<BTreeSet<usize>> {
        Ok((0..num_cpus::get()).collect())
    }
}
