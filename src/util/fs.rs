use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Replace `dst` with `content` so readers never see a partial file.
///
/// The bytes go to a sibling `<name>.tmp.<pid>` file, are synced, and the
/// temp file is then renamed over `dst`. Missing parent directories are
/// created. On failure the temp file is removed.
pub fn atomic_write(dst: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let tmp = temp_sibling(dst);
    let written = write_synced(&tmp, content)
        .and_then(|()| std::fs::rename(&tmp, dst).context("renaming into place"));
    if written.is_err() {
        std::fs::remove_file(&tmp).ok();
    }
    written.with_context(|| format!("writing {}", dst.display()))
}

fn temp_sibling(dst: &Path) -> PathBuf {
    let mut name = dst
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp.{}", std::process::id()));
    dst.with_file_name(name)
}

fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(content)?;
    file.sync_all()?;
    Ok(())
}
