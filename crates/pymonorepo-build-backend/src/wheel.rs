use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::io::{self, BufReader, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use fs_err::File;
use regex::Regex;
use tracing::{debug, trace, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use pymonorepo_fs::{Simplified, relative_to};
use pymonorepo_metadata::{CoreMetadata, License, MetadataError, entry_points_format};
use pymonorepo_workspace::ProjectAnalysis;

use crate::files::{FileSelection, gather_files, normalized_mode};
use crate::record::{RecordEntry, copy_hashed, record_file};
use crate::timestamp::{SourceDateEpoch, zip_datetime};
use crate::{ArchiveWriter, BuildOptions, Error};

/// Runs of characters that are not allowed in a wheel filename component.
static FILENAME_ESCAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\d.]+").unwrap());

const GENERATOR: &str = concat!("pymonorepo ", env!("CARGO_PKG_VERSION"));

/// The components of a wheel filename, each already escaped.
///
/// See: <https://packaging.python.org/en/latest/specifications/binary-distribution-format/#file-name-convention>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelName {
    pub name: String,
    pub version: String,
    pub python_tag: String,
    pub abi_tag: String,
    pub platform_tag: String,
}

impl WheelName {
    /// A pure Python wheel, tagged `py3-none-any`.
    pub fn new(name: &str, version: &str) -> Self {
        Self::with_tags(name, version, "py3", "none", "any")
    }

    pub fn with_tags(
        name: &str,
        version: &str,
        python_tag: &str,
        abi_tag: &str,
        platform_tag: &str,
    ) -> Self {
        let escape = |field: &str| FILENAME_ESCAPE.replace_all(field, "_").into_owned();
        Self {
            name: escape(name),
            version: escape(version),
            python_tag: escape(python_tag),
            abi_tag: escape(abi_tag),
            platform_tag: escape(platform_tag),
        }
    }

    /// The wheel name of a project, which must have a version.
    pub fn from_analysis(analysis: &ProjectAnalysis) -> Result<Self, MetadataError> {
        let version = analysis
            .metadata
            .version
            .as_ref()
            .ok_or_else(|| MetadataError::MissingVersion(analysis.name().clone()))?;
        Ok(Self::new(&analysis.snake_name(), &version.to_string()))
    }

    pub fn dist_info(&self) -> String {
        format!("{}-{}.dist-info", self.name, self.version)
    }

    /// The expanded compatibility tags, e.g. `py2.py3-none-any` is `py2-none-any` and
    /// `py3-none-any`.
    pub fn tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        for python in self.python_tag.split('.') {
            for abi in self.abi_tag.split('.') {
                for platform in self.platform_tag.split('.') {
                    tags.push(format!("{python}-{abi}-{platform}"));
                }
            }
        }
        tags
    }

    /// The content of the `WHEEL` file.
    pub fn wheel_info(&self) -> String {
        let mut wheel_info = format!(
            "Wheel-Version: 1.0\nGenerator: {GENERATOR}\nRoot-Is-Purelib: true\n"
        );
        for tag in self.tags() {
            wheel_info.push_str(&format!("Tag: {tag}\n"));
        }
        wheel_info
    }
}

impl Display for WheelName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}.whl",
            self.name, self.version, self.python_tag, self.abi_tag, self.platform_tag
        )
    }
}

/// Build a wheel from the project and place it in the output directory, returning the path of
/// the wheel.
pub fn build_wheel(
    analysis: &ProjectAnalysis,
    wheel_directory: &Path,
    options: &BuildOptions,
) -> Result<PathBuf, Error> {
    write_wheel(analysis, wheel_directory, false, options)
}

/// Build an editable wheel, which adds the parent directories of the modules to `sys.path`
/// through a `.pth` file instead of containing the modules.
pub fn build_editable(
    analysis: &ProjectAnalysis,
    wheel_directory: &Path,
    options: &BuildOptions,
) -> Result<PathBuf, Error> {
    write_wheel(analysis, wheel_directory, true, options)
}

/// Write the `.dist-info` directory of the wheel to `metadata_directory`, returning the name of
/// the `.dist-info` directory.
pub fn prepare_metadata(
    analysis: &ProjectAnalysis,
    metadata_directory: &Path,
) -> Result<String, Error> {
    let name = WheelName::from_analysis(analysis)?;
    debug!(
        "Writing metadata for `{name}` to: `{}`",
        metadata_directory.simplified_display()
    );
    let mut writer = DirectoryWriter::new(metadata_directory)?;
    write_dist_info(&mut writer, analysis, &name)?;
    writer.finish()?;
    Ok(name.dist_info())
}

fn write_wheel(
    analysis: &ProjectAnalysis,
    wheel_directory: &Path,
    editable: bool,
    options: &BuildOptions,
) -> Result<PathBuf, Error> {
    let name = WheelName::from_analysis(analysis)?;
    debug!(
        "Building {} `{name}` in: `{}`",
        if editable { "editable wheel" } else { "wheel" },
        wheel_directory.simplified_display()
    );
    let mut writer = WheelWriter::new(wheel_directory, &name, options.source_date_epoch)?;
    if editable {
        write_pth(&mut writer, analysis)?;
    } else {
        write_modules(&mut writer, analysis, options)?;
    }
    // The `.dist-info` directory is recommended to come last.
    write_dist_info(&mut writer, analysis, &name)?;
    writer.finish()
}

/// A `{name}.pth` file with the sorted, unique parent directories of all modules.
fn write_pth(writer: &mut impl ArchiveWriter, analysis: &ProjectAnalysis) -> Result<(), Error> {
    let parents: BTreeSet<&Path> = analysis
        .modules
        .values()
        .filter_map(|module| module.parent())
        .collect();
    let pth: String = parents
        .into_iter()
        .map(|parent| format!("{}\n", parent.simplified_display()))
        .collect();
    writer.write_text(&format!("{}.pth", analysis.snake_name()), &pth)?;
    Ok(())
}

fn write_modules(
    writer: &mut impl ArchiveWriter,
    analysis: &ProjectAnalysis,
    options: &BuildOptions,
) -> Result<(), Error> {
    // An unpacked source distribution is not a git repository, so the wheel can always fall back
    // to all files.
    let selection = FileSelection {
        use_git: true,
        allow_non_vcs: true,
        include: &[],
        exclude: &[],
        field: "tool.monorepo.package.module",
    };
    for (name, module) in &analysis.modules {
        if module.is_dir() {
            debug!("Adding package `{name}`: `{}`", module.simplified_display());
            let parent = module.parent().unwrap_or(&analysis.root);
            for file in gather_files(module, &selection, options.tracked_files)? {
                let relative = relative_to(&file, parent)?;
                writer.write_path(&relative.portable_display(), &file)?;
            }
        } else if module.is_file() {
            debug!("Adding module `{name}`: `{}`", module.simplified_display());
            let file_name = module
                .file_name()
                .map(|file_name| file_name.to_string_lossy())
                .ok_or_else(|| Error::MissingModule(module.clone()))?;
            writer.write_path(&file_name, module)?;
        } else {
            return Err(Error::MissingModule(module.clone()));
        }
    }
    Ok(())
}

/// Write `WHEEL`, `METADATA`, `entry_points.txt` and the license files.
fn write_dist_info(
    writer: &mut impl ArchiveWriter,
    analysis: &ProjectAnalysis,
    name: &WheelName,
) -> Result<(), Error> {
    let dist_info = name.dist_info();
    writer.write_text(&format!("{dist_info}/WHEEL"), &name.wheel_info())?;

    let metadata = CoreMetadata::from_project(&analysis.metadata, &analysis.root)?;
    writer.write_text(
        &format!("{dist_info}/METADATA"),
        &metadata.core_metadata_format(),
    )?;

    if let Some(entry_points) = entry_points_format(&analysis.metadata) {
        writer.write_text(&format!("{dist_info}/entry_points.txt"), &entry_points)?;
    }

    for license in &analysis.metadata.licenses {
        if let License::File(path) = license {
            writer.write_path(
                &format!("{dist_info}/licenses/{}", path.portable_display()),
                &analysis.root.join(path),
            )?;
        }
    }
    Ok(())
}

fn not_open() -> io::Error {
    io::Error::other("The wheel archive is already closed")
}

fn file_options(seconds: i64, mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(mode)
        .last_modified_time(zip_datetime(seconds))
}

/// Writes a wheel zip archive, recording the hash and size of every entry for the `RECORD`
/// file.
pub struct WheelWriter {
    path: PathBuf,
    dist_info: String,
    zip: Option<ZipWriter<File>>,
    records: Vec<RecordEntry>,
    source_date_epoch: SourceDateEpoch,
    finished: bool,
}

impl WheelWriter {
    /// Create `{wheel_directory}/{name}`.
    pub fn new(
        wheel_directory: &Path,
        name: &WheelName,
        source_date_epoch: SourceDateEpoch,
    ) -> Result<Self, Error> {
        fs_err::create_dir_all(wheel_directory)?;
        let path = wheel_directory.join(name.to_string());
        let file = File::create(&path)?;
        Ok(Self {
            path,
            dist_info: name.dist_info(),
            zip: Some(ZipWriter::new(file)),
            records: Vec::new(),
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
        options: SimpleFileOptions,
        reader: &mut impl io::Read,
    ) -> Result<RecordEntry, Error> {
        trace!("Adding to wheel: `{path}`");
        let zip = self.zip.as_mut().ok_or_else(not_open)?;
        zip.start_file(path, options)?;
        let (hash, size) = copy_hashed(reader, zip)?;
        let record = RecordEntry {
            path: path.to_string(),
            hash: Some(hash),
            size: Some(size),
        };
        self.records.push(record.clone());
        Ok(record)
    }
}

impl ArchiveWriter for WheelWriter {
    fn write_bytes(&mut self, path: &str, bytes: &[u8]) -> Result<RecordEntry, Error> {
        let options = file_options(self.source_date_epoch.generated(), 0o644);
        self.write_entry(path, options, &mut Cursor::new(bytes))
    }

    fn write_path(&mut self, path: &str, source: &Path) -> Result<RecordEntry, Error> {
        let options = file_options(
            self.source_date_epoch.copied(source)?,
            normalized_mode(source)?,
        );
        let mut reader = BufReader::new(File::open(source)?);
        self.write_entry(path, options, &mut reader)
    }

    /// Write the `RECORD` file and the central directory.
    fn finish(mut self) -> Result<PathBuf, Error> {
        let record_path = format!("{}/RECORD", self.dist_info);
        let record = record_file(&self.records, &record_path)?;
        let options = file_options(self.source_date_epoch.generated(), 0o644);
        let mut zip = self.zip.take().ok_or_else(not_open)?;
        zip.start_file(record_path, options)?;
        zip.write_all(&record)?;
        zip.finish()?;
        self.finished = true;
        debug!("Wrote wheel: `{}`", self.path.simplified_display());
        Ok(self.path.clone())
    }
}

impl Drop for WheelWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        drop(self.zip.take());
        if let Err(err) = fs_err::remove_file(&self.path) {
            warn!("Failed to remove incomplete wheel: {err}");
        }
    }
}

/// Writes files into a plain directory, for preparing the `.dist-info` directory ahead of a
/// wheel build.
pub struct DirectoryWriter {
    root: PathBuf,
}

impl DirectoryWriter {
    pub fn new(root: &Path) -> Result<Self, Error> {
        fs_err::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn write_entry(&self, path: &str, reader: &mut impl io::Read) -> Result<RecordEntry, Error> {
        let target = path
            .split('/')
            .fold(self.root.clone(), |target, segment| target.join(segment));
        if let Some(parent) = target.parent() {
            fs_err::create_dir_all(parent)?;
        }
        let mut file = File::create(&target)?;
        let (hash, size) = copy_hashed(reader, &mut file)?;
        Ok(RecordEntry {
            path: path.to_string(),
            hash: Some(hash),
            size: Some(size),
        })
    }
}

impl ArchiveWriter for DirectoryWriter {
    fn write_bytes(&mut self, path: &str, bytes: &[u8]) -> Result<RecordEntry, Error> {
        self.write_entry(path, &mut Cursor::new(bytes))
    }

    fn write_path(&mut self, path: &str, source: &Path) -> Result<RecordEntry, Error> {
        let mut reader = BufReader::new(File::open(source)?);
        self.write_entry(path, &mut reader)
    }

    fn finish(self) -> Result<PathBuf, Error> {
        Ok(self.root)
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use tempfile::TempDir;

    use super::{WheelName, WheelWriter};
    use crate::{ArchiveWriter, SourceDateEpoch};

    #[test]
    fn filename() {
        let name = WheelName::new("foo_bar", "1.0.0+local.1");
        assert_eq!(name.to_string(), "foo_bar-1.0.0_local.1-py3-none-any.whl");
        assert_eq!(name.dist_info(), "foo_bar-1.0.0_local.1.dist-info");

        let name = WheelName::with_tags("a-b c", "2", "py2.py3", "none", "any");
        assert_eq!(name.to_string(), "a_b_c-2-py2.py3-none-any.whl");
        assert_eq!(name.tags(), ["py2-none-any", "py3-none-any"]);
    }

    #[test]
    fn wheel_info() {
        let name = WheelName::new("foo", "1.0.0");
        let wheel_info = name
            .wheel_info()
            .replace(env!("CARGO_PKG_VERSION"), "[VERSION]");
        assert_snapshot!(wheel_info, @r"
        Wheel-Version: 1.0
        Generator: pymonorepo [VERSION]
        Root-Is-Purelib: true
        Tag: py3-none-any
        ");
    }

    #[test]
    fn removed_unless_finished() {
        let temp_dir = TempDir::new().unwrap();
        let name = WheelName::new("foo", "1.0");
        let mut writer = WheelWriter::new(temp_dir.path(), &name, SourceDateEpoch::Unset).unwrap();
        writer.write_text("foo.py", "").unwrap();
        let path = writer.path().to_path_buf();
        assert_eq!(path, temp_dir.path().join("foo-1.0-py3-none-any.whl"));
        assert!(path.is_file());
        drop(writer);
        assert!(!path.exists());
    }
}
