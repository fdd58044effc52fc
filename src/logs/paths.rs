//! Log destination resolution.
//!
//! ```text
//! out_file / error_file set?
//!   ├─ absolute ─► as is
//!   ├─ relative ─► <cwd>/<path>             (descriptor working directory)
//!   └─ unset    ─► <log_dir>/<name>-out.log | <log_dir>/<name>-error.log
//! instances > 1 ─► "-<index>" before the extension (trace.log → trace-1.log)
//! merge_logs    ─► stderr = None (never opened)
//! ```

use std::path::{Path, PathBuf};

use crate::descriptor::ProcessDescriptor;

/// Files one instance writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    /// Destination of stdout (and of stderr when merged).
    pub stdout: PathBuf,
    /// Destination of stderr; `None` when merged into stdout.
    pub stderr: Option<PathBuf>,
}

impl LogPaths {
    /// Resolves the destinations of `instance` of `desc`.
    pub fn resolve(desc: &ProcessDescriptor, instance: u32, log_dir: &Path) -> Self {
        let stdout = pick(desc, desc.out_file(), log_dir, "out");
        let stdout = per_instance(stdout, desc, instance);

        let stderr = (!desc.merge_logs()).then(|| {
            let path = pick(desc, desc.error_file(), log_dir, "error");
            per_instance(path, desc, instance)
        });

        Self { stdout, stderr }
    }

    /// Every distinct destination, stdout first.
    pub fn all(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.stdout.as_path()).chain(
            self.stderr
                .as_deref()
                .filter(|p| *p != self.stdout.as_path()),
        )
    }
}

fn pick(desc: &ProcessDescriptor, configured: Option<&Path>, log_dir: &Path, stream: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => match desc.cwd() {
            Some(cwd) => cwd.join(path),
            None => path.to_path_buf(),
        },
        None => log_dir.join(format!("{}-{stream}.log", desc.name())),
    }
}

fn per_instance(path: PathBuf, desc: &ProcessDescriptor, instance: u32) -> PathBuf {
    if desc.instances() <= 1 {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}-{instance}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{instance}"),
    };
    path.with_file_name(file_name)
}
