// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::Path;

pub trait ReadSeek: std::io::Read + std::io::Seek {}
impl<T: std::io::Read + std::io::Seek> ReadSeek for T {}

pub struct FileWrapper {
    pub file: Box<dyn ReadSeek>,
    pub size: u64,
}

pub fn open_file(path: &Path) -> std::io::Result<FileWrapper> {
    let file = std::fs::File::open(path)?;
    let size = file.metadata()?.len();
    Ok(FileWrapper { file: Box::new(std::io::BufReader::new(file)), size })
}

pub fn get_filename(path: &Path) -> String {
    path.file_name().map(|x| x.to_string_lossy().to_string()).unwrap_or_default()
}

/// Lowercase extension without the dot, empty if there is none
pub fn get_extension(path: &Path) -> String {
    path.extension().map(|x| x.to_string_lossy().to_ascii_lowercase()).unwrap_or_default()
}

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = get_extension(path);
    !ext.is_empty() && extensions.iter().any(|x| x.eq_ignore_ascii_case(&ext))
}
