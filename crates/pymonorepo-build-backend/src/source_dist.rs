use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use fs_err::File;
use tar::{EntryType, Header};
use tracing::{debug, trace, warn};

use pymonorepo_fs::{Simplified, relative_to};
use pymonorepo_metadata::{CoreMetadata, MetadataError};
use pymonorepo_workspace::ProjectAnalysis;

use crate::files::{FileSelection, gather_files, normalized_mode};
use crate::record::{HashingReader, RecordEntry};
use crate::timestamp::{SourceDateEpoch, tar_mtime};
use crate::{ArchiveWriter, BuildOptions, Error};

/// Build a source distribution from the project and place it in the output directory, returning
/// the path of the `.tar.gz`.
///
/// The files are the tracked files of the project root plus `sdist.include`, minus compiled
/// bytecode and `sdist.exclude`, followed by `PKG-INFO`.
pub fn build_sdist(
    analysis: &ProjectAnalysis,
    sdist_directory: &Path,
    options: &BuildOptions,
) -> Result<PathBuf, Error> {
    let version = analysis
        .metadata
        .version
        .as_ref()
        .ok_or_else(|| MetadataError::MissingVersion(analysis.name().clone()))?;
    let top_level = format!("{}-{version}", analysis.snake_name());
    debug!(
        "Building source distribution `{top_level}` in: `{}`",
        sdist_directory.simplified_display()
    );

    let sdist = &analysis.tool.sdist;
    let selection = FileSelection {
        use_git: sdist.use_git,
        allow_non_vcs: options.allow_non_vcs,
        include: &sdist.include,
        exclude: &sdist.exclude,
        field: "tool.monorepo.sdist",
    };
    // Gathered before the archive exists, so it can't include itself.
    let files = gather_files(&analysis.root, &selection, options.tracked_files)?;
    let metadata = CoreMetadata::from_project(&analysis.metadata, &analysis.root)?;

    let mut writer = SdistWriter::new(sdist_directory, &top_level, options.source_date_epoch)?;
    for file in files {
        let relative = relative_to(&file, &analysis.root)?;
        writer.write_path(&relative.portable_display(), &file)?;
    }
    writer.write_text("PKG-INFO", &metadata.core_metadata_format())?;
    writer.finish()
}

/// Writes a `.tar.gz` source distribution with all entries below a `{name}-{version}`
/// directory.
///
/// Headers are POSIX ustar, with PAX extended headers for paths that don't fit. Ownership is
/// cleared and permissions are normalized.
pub struct SdistWriter {
    path: PathBuf,
    top_level: String,
    tar: Option<tar::Builder<GzEncoder<File>>>,
    source_date_epoch: SourceDateEpoch,
    finished: bool,
}

impl SdistWriter {
    /// Create `{sdist_directory}/{top_level}.tar.gz`.
    pub fn new(
        sdist_directory: &Path,
        top_level: &str,
        source_date_epoch: SourceDateEpoch,
    ) -> Result<Self, Error> {
        fs_err::create_dir_all(sdist_directory)?;
        let path = sdist_directory.join(format!("{top_level}.tar.gz"));
        let file = File::create(&path)?;
        let encoder = GzBuilder::new()
            .mtime(source_date_epoch.gzip_mtime())
            .write(file, Compression::default());
        Ok(Self {
            path,
            top_level: top_level.to_string(),
            tar: Some(tar::Builder::new(encoder)),
            source_date_epoch,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_entry(
        &mut self,
        path: &str,
        mut header: Header,
        reader: &mut impl Read,
    ) -> Result<RecordEntry, Error> {
        let path = format!("{}/{path}", self.top_level);
        trace!("Adding to source distribution: `{path}`");
        let tar = self
            .tar
            .as_mut()
            .ok_or_else(|| Error::TarWrite(self.path.clone(), not_open()))?;

        // Paths that don't fit into the ustar name and prefix fields are stored in a PAX
        // extended header, the header itself keeps a truncated path.
        if header.set_path(&path).is_err() {
            tar.append_pax_extensions([("path", path.as_bytes())])
                .map_err(|err| Error::TarWrite(self.path.clone(), err))?;
            header
                .set_path(truncate(&path, 99))
                .map_err(|err| Error::TarWrite(self.path.clone(), err))?;
        }
        header.set_cksum();

        let mut reader = HashingReader::new(reader);
        tar.append(&header, &mut reader)
            .map_err(|err| Error::TarWrite(self.path.clone(), err))?;
        let (hash, size) = reader.finish();
        Ok(RecordEntry {
            path,
            hash: Some(hash),
            size: Some(size),
        })
    }

    fn header(&self, size: u64, mode: u32, mtime: i64) -> Header {
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);
        header.set_mode(mode);
        header.set_mtime(tar_mtime(mtime));
        header.set_uid(0);
        header.set_gid(0);
        // Only fails for names longer than the field.
        let _ = header.set_username("");
        let _ = header.set_groupname("");
        header
    }
}

impl ArchiveWriter for SdistWriter {
    fn write_bytes(&mut self, path: &str, bytes: &[u8]) -> Result<RecordEntry, Error> {
        let header = self.header(
            bytes.len() as u64,
            0o644,
            self.source_date_epoch.generated(),
        );
        self.write_entry(path, header, &mut Cursor::new(bytes))
    }

    fn write_path(&mut self, path: &str, source: &Path) -> Result<RecordEntry, Error> {
        let size = fs_err::metadata(source)?.len();
        let header = self.header(
            size,
            normalized_mode(source)?,
            self.source_date_epoch.copied(source)?,
        );
        let mut reader = BufReader::new(File::open(source)?);
        self.write_entry(path, header, &mut reader)
    }

    fn finish(mut self) -> Result<PathBuf, Error> {
        let tar = self
            .tar
            .take()
            .ok_or_else(|| Error::TarWrite(self.path.clone(), not_open()))?;
        let encoder = tar
            .into_inner()
            .map_err(|err| Error::TarWrite(self.path.clone(), err))?;
        encoder
            .finish()
            .map_err(|err| Error::TarWrite(self.path.clone(), err))?;
        self.finished = true;
        debug!(
            "Wrote source distribution: `{}`",
            self.path.simplified_display()
        );
        Ok(self.path.clone())
    }
}

impl Drop for SdistWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        drop(self.tar.take());
        if let Err(err) = fs_err::remove_file(&self.path) {
            warn!("Failed to remove incomplete source distribution: {err}");
        }
    }
}

fn not_open() -> io::Error {
    io::Error::other("The source distribution archive is already closed")
}

/// The longest prefix of `path` with at most `max` bytes, on a character boundary.
fn truncate(path: &str, max: usize) -> &str {
    let mut end = path.len().min(max);
    while !path.is_char_boundary(end) {
        end -= 1;
    }
    &path[..end]
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use fs_err::File;
    use tempfile::TempDir;

    use super::SdistWriter;
    use crate::{ArchiveWriter, SourceDateEpoch};

    #[test]
    fn long_paths() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer =
            SdistWriter::new(temp_dir.path(), "foo-1.0", SourceDateEpoch::Fixed(0)).unwrap();
        let long = format!("{}/{}.py", "d".repeat(120), "m".repeat(120));
        writer.write_text(&long, "print()\n").unwrap();
        writer.write_text("PKG-INFO", "Name: foo\n").unwrap();
        let path = writer.finish().unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
        let mut entries = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            let header = entry.header();
            assert_eq!(header.uid().unwrap(), 0);
            assert_eq!(header.mtime().unwrap(), 0);
            assert_eq!(header.mode().unwrap(), 0o644);
            entries.push((
                entry.path().unwrap().to_string_lossy().to_string(),
                content,
            ));
        }
        assert_eq!(
            entries,
            [
                (format!("foo-1.0/{long}"), "print()\n".to_string()),
                ("foo-1.0/PKG-INFO".to_string(), "Name: foo\n".to_string()),
            ]
        );
    }

    #[test]
    fn removed_unless_finished() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer =
            SdistWriter::new(temp_dir.path(), "foo-1.0", SourceDateEpoch::Unset).unwrap();
        writer.write_text("PKG-INFO", "Name: foo\n").unwrap();
        let path = writer.path().to_path_buf();
        assert!(path.is_file());
        drop(writer);
        assert!(!path.exists());
    }
}
