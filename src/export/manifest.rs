//! Ground-truth manifest: one `file_name<TAB>transcription` line per crop.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::LabelCropError;

/// One manifest line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub file_name: String,
    pub transcription: String,
}

impl ManifestEntry {
    pub fn new(file_name: impl Into<String>, transcription: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            transcription: transcription.into(),
        }
    }
}

/// Sole writer of a manifest file.
///
/// Entries are appended in call order. Call [`ManifestWriter::finish`] to
/// flush and sync; if the writer is dropped on an error path it still
/// flushes whatever was buffered.
#[derive(Debug)]
pub struct ManifestWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    entries: usize,
}

impl ManifestWriter {
    /// Opens `path`, truncating it unless `append` is set.
    pub fn create(path: &Path, append: bool) -> Result<Self, LabelCropError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|source| LabelCropError::ManifestWrite {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            entries: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries appended through this writer.
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn append(&mut self, entry: &ManifestEntry) -> Result<(), LabelCropError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(self.closed_error());
        };

        writeln!(writer, "{}\t{}", entry.file_name, entry.transcription).map_err(|source| {
            LabelCropError::ManifestWrite {
                path: self.path.clone(),
                source,
            }
        })?;
        self.entries += 1;
        Ok(())
    }

    /// Flushes and syncs the manifest, returning the number of entries written.
    pub fn finish(mut self) -> Result<usize, LabelCropError> {
        let Some(writer) = self.writer.take() else {
            return Err(self.closed_error());
        };

        let file = writer
            .into_inner()
            .map_err(|err| LabelCropError::ManifestWrite {
                path: self.path.clone(),
                source: err.into_error(),
            })?;
        file.sync_all()
            .map_err(|source| LabelCropError::ManifestWrite {
                path: self.path.clone(),
                source,
            })?;

        Ok(self.entries)
    }

    fn closed_error(&self) -> LabelCropError {
        LabelCropError::ManifestWrite {
            path: self.path.clone(),
            source: std::io::Error::other("manifest writer already closed"),
        }
    }
}

impl Drop for ManifestWriter {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.flush() {
                warn!(path = %self.path.display(), "failed to flush manifest: {err}");
            }
        }
    }
}

/// Reads a manifest file back into entries.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>, LabelCropError> {
    let content = fs::read_to_string(path).map_err(LabelCropError::Io)?;
    Ok(parse_manifest_str(&content))
}

/// Parses manifest content. Lines without a tab are kept with an empty
/// transcription.
pub fn parse_manifest_str(content: &str) -> Vec<ManifestEntry> {
    content
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('\t') {
            Some((file_name, transcription)) => ManifestEntry::new(file_name, transcription),
            None => ManifestEntry::new(line, ""),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_written_in_order() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("rec_gt.txt");

        let mut writer = ManifestWriter::create(&path, false).unwrap();
        writer.append(&ManifestEntry::new("img1_0.jpg", "TEST")).unwrap();
        writer.append(&ManifestEntry::new("img1_1.jpg", "")).unwrap();
        writer.append(&ManifestEntry::new("img2_0.jpg", "a\tb")).unwrap();
        assert_eq!(writer.finish().unwrap(), 3);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "img1_0.jpg\tTEST\nimg1_1.jpg\t\nimg2_0.jpg\ta\tb\n");

        let entries = read_manifest(&path).unwrap();
        assert_eq!(entries[1], ManifestEntry::new("img1_1.jpg", ""));
        assert_eq!(entries[2].transcription, "a\tb");
    }

    #[test]
    fn test_create_truncates_unless_appending() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("rec_gt.txt");
        fs::write(&path, "old_0.jpg\tOLD\n").unwrap();

        let mut writer = ManifestWriter::create(&path, true).unwrap();
        writer.append(&ManifestEntry::new("new_0.jpg", "NEW")).unwrap();
        writer.finish().unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "old_0.jpg\tOLD\nnew_0.jpg\tNEW\n"
        );

        let writer = ManifestWriter::create(&path, false).unwrap();
        assert_eq!(writer.finish().unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_drop_flushes_buffered_entries() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("rec_gt.txt");

        {
            let mut writer = ManifestWriter::create(&path, false).unwrap();
            writer.append(&ManifestEntry::new("x_0.png", "x")).unwrap();
            assert_eq!(writer.entries(), 1);
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "x_0.png\tx\n");
    }

    #[test]
    fn test_create_fails_in_missing_directory() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let err = ManifestWriter::create(&temp.path().join("nope/rec_gt.txt"), false).unwrap_err();
        assert!(matches!(err, LabelCropError::ManifestWrite { .. }));
    }
}
