// ABOUTME: Line-oriented output sinks for the generated SQL script
// ABOUTME: File writer with size-based part rotation and a no-op writer

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination of emitted SQL statements
pub trait OutputWriter: Send + Sync {
    /// Append one line; the line terminator is added by the writer
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Path of the output file; empty when no file is configured
    fn file_path(&self) -> &str;

    /// Maximum size in bytes of each part; 0 means unlimited
    fn max_file_size(&self) -> u64;

    /// Every file written so far, in order
    fn list_of_parts(&self) -> Vec<PathBuf>;
}

/// Writer that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWriter;

impl OutputWriter for NullWriter {
    fn write_line(&mut self, _line: &str) -> Result<()> {
        Ok(())
    }

    fn file_path(&self) -> &str {
        ""
    }

    fn max_file_size(&self) -> u64 {
        0
    }

    fn list_of_parts(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Appends lines to a file, rotating to `name.s01`, `name.s02`, ... when a part is full
#[derive(Debug)]
pub struct FileWriter {
    path: String,
    file: File,
    current_size: u64,
    max_file_size: u64,
    truncate: bool,
    parts: Vec<PathBuf>,
}

impl FileWriter {
    /// Open `path` for appending, or truncate it first when `truncate` is set
    ///
    /// When appending, parts written by an earlier run are picked up and
    /// writing continues in the last of them.
    pub fn create(path: &str, truncate: bool, max_file_size: u64) -> Result<Self> {
        let base = Path::new(path);
        let mut parts = vec![base.to_path_buf()];
        if !truncate {
            loop {
                let next = part_path(base, parts.len());
                if !next.exists() {
                    break;
                }
                parts.push(next);
            }
        }

        let current = parts.last().map_or(base, PathBuf::as_path);
        let file = open_part(current, truncate)?;
        let current_size = file
            .metadata()
            .with_context(|| format!("Failed to stat output file {}", current.display()))?
            .len();

        if parts.len() > 1 {
            tracing::info!("Resuming output in part {}", current.display());
        }

        Ok(Self {
            path: path.to_string(),
            file,
            current_size,
            max_file_size,
            truncate,
            parts,
        })
    }

    fn rotate(&mut self) -> Result<()> {
        let next = part_path(Path::new(&self.path), self.parts.len());
        tracing::info!("Output part full, continuing in {}", next.display());

        self.file
            .flush()
            .with_context(|| format!("Failed to flush output file {}", self.path))?;
        self.file = open_part(&next, self.truncate)?;
        self.current_size = 0;
        self.parts.push(next);
        Ok(())
    }
}

fn open_part(path: &Path, truncate: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }

    options
        .open(path)
        .with_context(|| format!("Failed to open output file {}", path.display()))
}

/// Path of the `index`-th part; index 0 is the base path itself
pub fn part_path(base: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return base.to_path_buf();
    }
    base.with_extension(format!("s{:02}", index))
}

impl OutputWriter for FileWriter {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let length = line.len() as u64 + 1;

        if self.max_file_size > 0
            && self.current_size > 0
            && self.current_size + length > self.max_file_size
        {
            self.rotate()?;
        }

        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.write_all(b"\n"))
            .with_context(|| format!("Failed to write to output file {}", self.path))?;
        self.current_size += length;
        Ok(())
    }

    fn file_path(&self) -> &str {
        &self.path
    }

    fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    fn list_of_parts(&self) -> Vec<PathBuf> {
        self.parts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_null_writer_has_no_path() {
        let mut writer = NullWriter;
        writer.write_line("SELECT 1;").unwrap();
        assert_eq!(writer.file_path(), "");
        assert!(writer.list_of_parts().is_empty());
    }

    #[test]
    fn test_file_writer_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.sql");
        let path = path.to_str().unwrap();

        let mut writer = FileWriter::create(path, true, 0).unwrap();
        writer.write_line("Foo;").unwrap();
        writer.write_line("Bar;").unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "Foo;\nBar;\n");

        let mut writer = FileWriter::create(path, false, 0).unwrap();
        writer.write_line("Baz;").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Foo;\nBar;\nBaz;\n");
    }

    #[test]
    fn test_file_writer_rotates_without_splitting_lines() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("out.sql");

        let mut writer = FileWriter::create(base.to_str().unwrap(), true, 10).unwrap();
        writer.write_line("aaaa;").unwrap();
        writer.write_line("bbbb;").unwrap();
        writer.write_line("a line longer than the limit;").unwrap();

        let parts = writer.list_of_parts();
        assert_eq!(
            parts,
            vec![
                base.clone(),
                dir.path().join("out.s01"),
                dir.path().join("out.s02"),
            ]
        );
        assert_eq!(std::fs::read_to_string(&parts[0]).unwrap(), "aaaa;\n");
        assert_eq!(std::fs::read_to_string(&parts[1]).unwrap(), "bbbb;\n");
        assert_eq!(
            std::fs::read_to_string(&parts[2]).unwrap(),
            "a line longer than the limit;\n"
        );
    }

    #[test]
    fn test_file_writer_resumes_in_last_part() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("out.sql");
        let path = base.to_str().unwrap();

        let mut writer = FileWriter::create(path, true, 10).unwrap();
        writer.write_line("aaaa;").unwrap();
        writer.write_line("bbbb;").unwrap();
        drop(writer);

        let mut writer = FileWriter::create(path, false, 10).unwrap();
        assert_eq!(
            writer.list_of_parts(),
            vec![base.clone(), dir.path().join("out.s01")]
        );
        writer.write_line("cc;").unwrap();
        writer.write_line("dddd;").unwrap();

        assert_eq!(std::fs::read_to_string(&base).unwrap(), "aaaa;\n");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.s01")).unwrap(),
            "bbbb;\ncc;\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.s02")).unwrap(),
            "dddd;\n"
        );
    }

    #[test]
    fn test_part_path_naming() {
        assert_eq!(part_path(Path::new("/b/site.sql"), 0), PathBuf::from("/b/site.sql"));
        assert_eq!(part_path(Path::new("/b/site.sql"), 3), PathBuf::from("/b/site.s03"));
        assert_eq!(part_path(Path::new("/b/site"), 1), PathBuf::from("/b/site.s01"));
    }
}
