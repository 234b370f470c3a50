//! File helpers for map callbacks and reduce-side output.

use anyhow::{Context, Result};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use walkdir::WalkDir;

/// Regular files under `dir`, recursively, in file-name order per directory.
pub fn input_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Lines of a text input; the map side's usual way to consume an input name.
pub fn read_lines(path: impl AsRef<Path>) -> Result<impl Iterator<Item = Result<String>>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(BufReader::new(file).lines().map(|l| l.map_err(anyhow::Error::from)))
}

/// `dir/part-NNNNN.tsv`
pub fn part_path(dir: impl AsRef<Path>, partition: usize) -> PathBuf {
    dir.as_ref().join(format!("part-{partition:05}.tsv"))
}

/// Creates `path` for writing, along with any missing parent directories.
pub fn create_output(path: impl AsRef<Path>) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

pub fn write_tsv(writer: &mut impl Write, key: &str, value: impl Display) -> Result<()> {
    writeln!(writer, "{key}\t{value}")?;
    Ok(())
}

/// One lazily created `part-NNNNN.tsv` per partition, for reduce callbacks.
///
/// A reduce callback only ever writes to the partition it was called for, so each
/// file's lock is uncontended and rows land in the order keys were reduced.
/// Partitions that never see a row produce no file.
pub struct PartWriters {
    dir: PathBuf,
    parts: Vec<Mutex<Option<BufWriter<File>>>>,
}

impl PartWriters {
    pub fn new(dir: impl Into<PathBuf>, num_partitions: usize) -> Self {
        Self { dir: dir.into(), parts: (0..num_partitions).map(|_| Mutex::new(None)).collect() }
    }

    pub fn write_row(&self, partition: usize, key: &str, value: impl Display) -> Result<()> {
        let slot = self
            .parts
            .get(partition)
            .with_context(|| format!("no output slot for partition {partition} of {}", self.parts.len()))?;
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(create_output(part_path(&self.dir, partition))?);
        }
        match slot.as_mut() {
            Some(writer) => write_tsv(writer, key, value),
            None => Ok(()),
        }
    }

    /// Flushes every opened file; returns how many were written.
    pub fn finish(self) -> Result<usize> {
        let mut written = 0;
        for (partition, slot) in self.parts.into_iter().enumerate() {
            if let Some(mut writer) = slot.into_inner().unwrap_or_else(PoisonError::into_inner) {
                writer.flush().with_context(|| format!("flush {}", part_path(&self.dir, partition).display()))?;
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_files_are_nested_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("z.txt"), "x").unwrap();
        fs::write(dir.path().join("a/b/deep.txt"), "y").unwrap();
        fs::write(dir.path().join("a/first.txt"), "y").unwrap();
        let files = input_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a/b/deep.txt"), dir.path().join("a/first.txt"), dir.path().join("z.txt")]
        );
    }

    #[test]
    fn part_writers_only_create_touched_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let writers = PartWriters::new(&out, 4);
        writers.write_row(2, "cat", 2).unwrap();
        writers.write_row(2, "dog", 1).unwrap();
        assert!(writers.write_row(9, "nope", 0).is_err());
        assert_eq!(writers.finish().unwrap(), 1);

        assert!(!part_path(&out, 0).exists());
        let lines: Vec<String> = read_lines(part_path(&out, 2)).unwrap().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["cat\t2", "dog\t1"]);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_lines("/definitely/not/here.txt").err().unwrap();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
