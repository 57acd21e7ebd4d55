use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core_api::{CoreError, CoreErrorCode};

/// A save archive held in memory. Entries are addressed by their full name
/// inside the zip and listed in central-directory order.
#[derive(Debug, Clone)]
pub struct SaveArchive {
    bytes: Vec<u8>,
    entries: Vec<String>,
    directories: Vec<bool>,
}

impl SaveArchive {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CoreError> {
        let mut archive = open(&bytes)?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut directories = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).map_err(|e| {
                CoreError::new(
                    CoreErrorCode::Archive,
                    format!("failed to read archive entry #{index}: {e}"),
                )
            })?;
            entries.push(file.name().to_string());
            directories.push(file.is_dir());
        }
        tracing::debug!("opened save archive with {} entries", entries.len());
        Ok(Self {
            bytes,
            entries,
            directories,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn json_entries(&self) -> Vec<&str> {
        self.entries
            .iter()
            .zip(&self.directories)
            .filter(|(name, is_dir)| !**is_dir && name.to_ascii_lowercase().ends_with(".json"))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry == name)
    }

    pub fn read_text(&self, name: &str) -> Result<String, CoreError> {
        let mut archive = open(&self.bytes)?;
        let mut file = archive.by_name(name).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Archive,
                format!("failed to open entry {name}: {e}"),
            )
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| {
            CoreError::new(CoreErrorCode::Io, format!("failed to read entry {name}: {e}"))
        })?;
        String::from_utf8(bytes).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Parse,
                format!("entry {name} is not UTF-8 text: {e}"),
            )
        })
    }

    pub fn replace_entry(&self, name: &str, text: &str) -> Result<Vec<u8>, CoreError> {
        self.rewrite(&[(name, text)])
    }

    /// Writes a new archive in which the named entries carry new text and
    /// every other entry is copied without recompression.
    pub fn rewrite(&self, replacements: &[(&str, &str)]) -> Result<Vec<u8>, CoreError> {
        let replacements: BTreeMap<&str, &str> = replacements.iter().copied().collect();
        if let Some(missing) = replacements.keys().find(|name| !self.contains(name)) {
            return Err(CoreError::new(
                CoreErrorCode::Archive,
                format!("archive has no entry named {missing}"),
            ));
        }

        let mut archive = open(&self.bytes)?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).map_err(|e| {
                CoreError::new(
                    CoreErrorCode::Archive,
                    format!("failed to read archive entry #{index}: {e}"),
                )
            })?;
            let name = file.name().to_string();
            match replacements.get(name.as_str()) {
                Some(text) => {
                    let method = match file.compression() {
                        CompressionMethod::Stored => CompressionMethod::Stored,
                        _ => CompressionMethod::Deflated,
                    };
                    drop(file);
                    let options = SimpleFileOptions::default().compression_method(method);
                    writer.start_file(name.as_str(), options).map_err(|e| {
                        CoreError::new(
                            CoreErrorCode::Archive,
                            format!("failed to start entry {name}: {e}"),
                        )
                    })?;
                    writer.write_all(text.as_bytes()).map_err(|e| {
                        CoreError::new(
                            CoreErrorCode::Io,
                            format!("failed to write entry {name}: {e}"),
                        )
                    })?;
                }
                None => writer.raw_copy_file(file).map_err(|e| {
                    CoreError::new(
                        CoreErrorCode::Archive,
                        format!("failed to copy entry {name}: {e}"),
                    )
                })?,
            }
        }

        let cursor = writer.finish().map_err(|e| {
            CoreError::new(
                CoreErrorCode::Archive,
                format!("failed to finish archive: {e}"),
            )
        })?;
        tracing::info!(
            "rewrote save archive, replaced {} of {} entries",
            replacements.len(),
            self.entries.len()
        );
        Ok(cursor.into_inner())
    }
}

fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, CoreError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Archive,
            format!("failed to open save archive: {e}"),
        )
    })
}
