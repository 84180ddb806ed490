//! JSON registry output

use crate::ranker::Registry;
use crate::FinderError;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Writes the registry as pretty-printed JSON
pub fn write_registry_to<W: Write>(writer: W, registry: &Registry) -> Result<(), FinderError> {
    serde_json::to_writer_pretty(writer, registry)?;
    Ok(())
}

/// Writes the registry to `path`, creating parent directories
pub fn write_registry(path: &Path, registry: &Registry) -> Result<(), FinderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    write_registry_to(&mut writer, registry)?;
    writer.flush()?;

    tracing::info!(
        "Wrote registry with {} companies to {}",
        registry.discovery_info.total_companies,
        path.display()
    );
    Ok(())
}
