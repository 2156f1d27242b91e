//! Checkpoint sinks.

use crate::error::CheckpointError;
use crate::model::Parameter;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Receives a parameter snapshot at the end of every pass.
pub trait CheckpointSink {
    fn save(&mut self, pass: usize, parameters: &[Parameter]) -> Result<(), CheckpointError>;
}

/// Metadata stored next to the parameter blobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub pass: usize,
    pub parameters: Vec<ParameterInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub shape: Vec<usize>,
}

/// Gzip-compressed tar archive at a fixed path, overwritten every pass.
///
/// Entries: [`ArchiveCheckpoint::METADATA_ENTRY`] plus one little-endian
/// `f32` blob per parameter, named after the parameter. The archive is
/// written to a sibling `.tmp` file and renamed into place, so an interrupted
/// write leaves the previous checkpoint intact.
#[derive(Clone, Debug)]
pub struct ArchiveCheckpoint {
    path: PathBuf,
}

impl ArchiveCheckpoint {
    pub const METADATA_ENTRY: &str = "parameters.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Every parameter needs its own archive entry.
    fn check_names(parameters: &[Parameter]) -> Result<(), CheckpointError> {
        let mut seen = HashSet::new();

        for parameter in parameters {
            let reason = if parameter.name == Self::METADATA_ENTRY {
                "reserved for metadata"
            } else if parameter.name.is_empty() {
                "empty"
            } else if !seen.insert(parameter.name.as_str()) {
                "duplicate"
            } else {
                continue;
            };

            return Err(CheckpointError::InvalidName {
                name: parameter.name.clone(),
                reason,
            });
        }

        Ok(())
    }

    fn write_archive(
        &self,
        temp: &Path,
        metadata: &[u8],
        parameters: &[Parameter],
    ) -> io::Result<()> {
        if let Some(parent) = temp.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(temp)?;
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        append_entry(&mut builder, Self::METADATA_ENTRY, metadata)?;
        for parameter in parameters {
            let bytes: Vec<u8> = parameter
                .values
                .iter()
                .flat_map(|value| value.to_le_bytes())
                .collect();
            append_entry(&mut builder, &parameter.name, &bytes)?;
        }

        let file = builder.into_inner()?.finish()?;
        file.sync_all()?;

        fs::rename(temp, &self.path)
    }

    /// Read an archive written by [`ArchiveCheckpoint`].
    pub fn read(
        path: impl AsRef<Path>,
    ) -> Result<(CheckpointMetadata, Vec<Parameter>), CheckpointError> {
        let path = path.as_ref();
        let read_error = |source| CheckpointError::Read {
            path: path.to_path_buf(),
            source,
        };
        let corrupt = |reason: String| CheckpointError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let mut entries = HashMap::new();
        let file = File::open(path).map_err(read_error)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));

        for entry in archive.entries().map_err(read_error)? {
            let mut entry = entry.map_err(read_error)?;
            let name = entry
                .path()
                .map_err(read_error)?
                .to_string_lossy()
                .into_owned();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(read_error)?;
            entries.insert(name, bytes);
        }

        let metadata: CheckpointMetadata = entries
            .get(Self::METADATA_ENTRY)
            .ok_or_else(|| corrupt(format!("missing {}", Self::METADATA_ENTRY)))
            .and_then(|bytes| serde_json::from_slice(bytes).map_err(CheckpointError::from))?;

        let parameters = metadata
            .parameters
            .iter()
            .map(|info| {
                let bytes = entries
                    .get(&info.name)
                    .ok_or_else(|| corrupt(format!("missing parameter {}", info.name)))?;
                let expected = info.shape.iter().product::<usize>() * 4;
                if bytes.len() != expected {
                    return Err(corrupt(format!(
                        "parameter {} has {} bytes, expected {expected}",
                        info.name,
                        bytes.len()
                    )));
                }

                Ok(Parameter {
                    name: info.name.clone(),
                    shape: info.shape.clone(),
                    values: bytes
                        .chunks_exact(4)
                        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .collect(),
                })
            })
            .collect::<Result<_, _>>()?;

        Ok((metadata, parameters))
    }
}

fn append_entry<W: Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    data: &[u8],
) -> io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, name, data)
}

impl CheckpointSink for ArchiveCheckpoint {
    fn save(&mut self, pass: usize, parameters: &[Parameter]) -> Result<(), CheckpointError> {
        Self::check_names(parameters)?;

        let metadata = CheckpointMetadata {
            pass,
            parameters: parameters
                .iter()
                .map(|p| ParameterInfo {
                    name: p.name.clone(),
                    shape: p.shape.clone(),
                })
                .collect(),
        };
        let metadata = serde_json::to_vec_pretty(&metadata)?;

        let temp = self.temp_path();
        self.write_archive(&temp, &metadata, parameters)
            .map_err(|source| {
                fs::remove_file(&temp).ok();
                CheckpointError::Write {
                    path: self.path.clone(),
                    source,
                }
            })?;

        tracing::info!(pass, path = ?self.path.display(), "checkpoint saved");
        Ok(())
    }
}
