//! Zip packaging of a scratch directory.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ArchiveError;

/// Zip every regular file under `root`, keyed by its path relative to
/// `root` with `/` separators. Entries are added in sorted order.
pub fn zip_directory(root: &Path) -> Result<Vec<u8>, ArchiveError> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut buffer = Vec::new();

    for relative in files {
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        buffer.clear();
        File::open(root.join(&relative))?.read_to_end(&mut buffer)?;
        writer.start_file(name, options)?;
        writer.write_all(&buffer)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<std::path::PathBuf>,
) -> Result<(), ArchiveError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_path_buf());
            }
        }
    }
    Ok(())
}

/// Entry names of a zip archive, in archive order.
pub fn list_entries(bytes: &[u8]) -> Result<Vec<String>, ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index(i)?.name().to_string());
    }
    Ok(names)
}
