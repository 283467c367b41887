//! Artifact packaging.
//!
//! After a target compiles, its binary can be packed into one or more archives
//! that sit next to it. Each archive holds exactly one entry: the binary under
//! its base name, marked executable.

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::consts::EXE_SUFFIX;

/// Mode recorded for the binary inside an archive.
const ENTRY_MODE: u32 = 0o755;

/// How a compiled binary is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
  /// The binary itself, unpackaged.
  Raw,
  Zip,
  TarGz,
}

impl ArchiveFormat {
  pub fn name(self) -> &'static str {
    match self {
      Self::Raw => "raw",
      Self::Zip => "zip",
      Self::TarGz => "tar.gz",
    }
  }

  /// File extension of the archive, or `None` for [`ArchiveFormat::Raw`].
  pub fn extension(self) -> Option<&'static str> {
    match self {
      Self::Raw => None,
      Self::Zip => Some(".zip"),
      Self::TarGz => Some(".tar.gz"),
    }
  }

  fn from_name(name: &str) -> Option<Self> {
    match name {
      "raw" => Some(Self::Raw),
      "zip" => Some(Self::Zip),
      "tar.gz" | "tgz" => Some(Self::TarGz),
      _ => None,
    }
  }
}

impl fmt::Display for ArchiveFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl Serialize for ArchiveFormat {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.name())
  }
}

/// Errors from parsing a `format=` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
  #[error("empty format list")]
  Empty,

  #[error("unknown format {0:?} (expected raw, zip, or tar.gz)")]
  Unknown(String),
}

/// Parse a comma-separated format list such as `raw,zip`.
pub fn parse_formats(text: &str) -> Result<Vec<ArchiveFormat>, FormatError> {
  if text.is_empty() {
    return Err(FormatError::Empty);
  }
  text
    .split(',')
    .map(|name| ArchiveFormat::from_name(name).ok_or_else(|| FormatError::Unknown(name.to_string())))
    .collect()
}

/// Errors from writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("{0} is not an archive format")]
  NotAnArchive(ArchiveFormat),
}

/// Path of the `format` archive for the binary at `binary`.
///
/// Any `.exe` suffix is dropped first, so `app-windows-amd64.exe` packs into
/// `app-windows-amd64.zip`.
pub fn archive_path(binary: &Path, format: ArchiveFormat) -> Option<PathBuf> {
  let extension = format.extension()?;
  let file_name = binary.file_name()?.to_string_lossy();
  let stem = file_name.strip_suffix(EXE_SUFFIX).unwrap_or(&*file_name);
  Some(binary.with_file_name(format!("{}{}", stem, extension)))
}

/// Write `binary` into a new archive at `dest`, stored as `entry_name`.
///
/// This does blocking I/O.
pub fn write_archive(format: ArchiveFormat, binary: &Path, dest: &Path, entry_name: &str) -> Result<(), ArchiveError> {
  debug!(format = %format, binary = %binary.display(), dest = %dest.display(), "writing archive");

  match format {
    ArchiveFormat::Raw => Err(ArchiveError::NotAnArchive(format)),
    ArchiveFormat::Zip => write_zip(binary, dest, entry_name),
    ArchiveFormat::TarGz => write_tar_gz(binary, dest, entry_name),
  }
}

fn write_zip(binary: &Path, dest: &Path, entry_name: &str) -> Result<(), ArchiveError> {
  let mut zip = zip::ZipWriter::new(File::create(dest)?);
  let options = zip::write::SimpleFileOptions::default()
    .compression_method(zip::CompressionMethod::Deflated)
    .unix_permissions(ENTRY_MODE);

  zip.start_file(entry_name, options)?;
  let mut input = File::open(binary)?;
  io::copy(&mut input, &mut zip)?;
  zip.finish()?;

  Ok(())
}

fn write_tar_gz(binary: &Path, dest: &Path, entry_name: &str) -> Result<(), ArchiveError> {
  let encoder = GzEncoder::new(File::create(dest)?, Compression::default());
  let mut builder = tar::Builder::new(encoder);

  let metadata = fs::metadata(binary)?;
  let mtime = metadata
    .modified()
    .ok()
    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
    .map(|d| d.as_secs())
    .unwrap_or(0);

  let mut header = tar::Header::new_gnu();
  header.set_size(metadata.len());
  header.set_mode(ENTRY_MODE);
  header.set_mtime(mtime);
  builder.append_data(&mut header, entry_name, File::open(binary)?)?;

  builder.into_inner()?.finish()?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use flate2::read::GzDecoder;
  use std::io::Read;
  use tempfile::TempDir;

  fn fake_binary(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"\x7fELF not really").unwrap();
    path
  }

  #[test]
  fn parse_format_list() {
    assert_eq!(
      parse_formats("raw,zip,tar.gz").unwrap(),
      vec![ArchiveFormat::Raw, ArchiveFormat::Zip, ArchiveFormat::TarGz]
    );
    assert_eq!(parse_formats("tgz").unwrap(), vec![ArchiveFormat::TarGz]);
  }

  #[test]
  fn parse_format_rejects_unknown_and_empty() {
    assert_eq!(parse_formats(""), Err(FormatError::Empty));
    assert_eq!(parse_formats("zip,rar"), Err(FormatError::Unknown("rar".to_string())));
    assert_eq!(parse_formats("zip,"), Err(FormatError::Unknown(String::new())));
  }

  #[test]
  fn archive_path_strips_exe() {
    let path = archive_path(Path::new("bin/app-windows-amd64.exe"), ArchiveFormat::Zip).unwrap();
    assert_eq!(path, Path::new("bin/app-windows-amd64.zip"));

    let path = archive_path(Path::new("bin/app-linux-arm64"), ArchiveFormat::TarGz).unwrap();
    assert_eq!(path, Path::new("bin/app-linux-arm64.tar.gz"));

    assert!(archive_path(Path::new("app"), ArchiveFormat::Raw).is_none());
  }

  #[test]
  fn zip_holds_single_entry() {
    let temp = TempDir::new().unwrap();
    let binary = fake_binary(temp.path(), "app-linux-amd64");
    let dest = temp.path().join("app-linux-amd64.zip");

    write_archive(ArchiveFormat::Zip, &binary, &dest, "app-linux-amd64").unwrap();

    let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
    assert_eq!(archive.len(), 1);
    let mut entry = archive.by_index(0).unwrap();
    assert_eq!(entry.name(), "app-linux-amd64");
    assert_eq!(entry.unix_mode().map(|m| m & 0o777), Some(ENTRY_MODE));
    let mut contents = Vec::new();
    entry.read_to_end(&mut contents).unwrap();
    assert_eq!(contents, b"\x7fELF not really");
  }

  #[test]
  fn tar_gz_holds_single_entry() {
    let temp = TempDir::new().unwrap();
    let binary = fake_binary(temp.path(), "app.exe");
    let dest = temp.path().join("app.tar.gz");

    write_archive(ArchiveFormat::TarGz, &binary, &dest, "app.exe").unwrap();

    let mut archive = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
    let mut entries = archive.entries().unwrap();
    let mut entry = entries.next().unwrap().unwrap();
    assert_eq!(entry.path().unwrap(), Path::new("app.exe"));
    assert_eq!(entry.header().mode().unwrap(), ENTRY_MODE);
    let mut contents = Vec::new();
    entry.read_to_end(&mut contents).unwrap();
    assert_eq!(contents, b"\x7fELF not really");
    drop(entry);
    assert!(entries.next().is_none());
  }

  #[test]
  fn raw_is_not_an_archive() {
    let temp = TempDir::new().unwrap();
    let binary = fake_binary(temp.path(), "app");
    let result = write_archive(ArchiveFormat::Raw, &binary, &temp.path().join("x"), "app");
    assert!(matches!(result, Err(ArchiveError::NotAnArchive(ArchiveFormat::Raw))));
  }

  #[test]
  fn missing_binary_is_io_error() {
    let temp = TempDir::new().unwrap();
    let result = write_archive(
      ArchiveFormat::Zip,
      &temp.path().join("missing"),
      &temp.path().join("missing.zip"),
      "missing",
    );
    assert!(matches!(result, Err(ArchiveError::Io(_))));
  }
}
