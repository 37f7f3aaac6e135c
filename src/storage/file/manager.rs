use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use parking_lot::Mutex;
use thiserror::Error;

use crate::storage::file::{BlockId, Page};

#[derive(Error, Debug)]
pub enum FileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("partial read of block {0}")]
    PartialRead(BlockId),

    #[error("partial write of block {0}")]
    PartialWrite(BlockId),

    #[error("{0} is not a directory")]
    NotADirectory(String),
}

pub type Result<T> = std::result::Result<T, FileError>;

/// Handles block-granular reads, writes and appends on the files of one
/// database directory. Every write is forced to disk before returning.
/// All operations are serialized by the handle-cache mutex.
#[derive(Debug)]
pub struct FileManager {
    db_directory: PathBuf,
    block_size: usize,
    is_new: bool,
    open_files: Mutex<HashMap<String, File>>,
}

impl FileManager {
    /// Opens (or creates) the database directory. A database is considered
    /// new when the directory did not exist yet. On an existing directory,
    /// leftover temporary files from earlier runs are removed.
    pub fn new(db_directory: impl Into<PathBuf>, block_size: usize) -> Result<Self> {
        let db_directory = db_directory.into();

        let is_new = match fs::metadata(&db_directory) {
            Ok(meta) if meta.is_dir() => false,
            Ok(_) => {
                return Err(FileError::NotADirectory(
                    db_directory.display().to_string(),
                ))
            }
            Err(_) => {
                fs::create_dir_all(&db_directory)?;
                true
            }
        };

        if !is_new {
            for entry in fs::read_dir(&db_directory)? {
                let entry = entry?;
                if entry.file_name().to_string_lossy().starts_with("temp") {
                    fs::remove_file(entry.path())?;
                }
            }
        }

        Ok(Self {
            db_directory,
            block_size,
            is_new,
            open_files: Mutex::new(HashMap::new()),
        })
    }

    /// Reads the contents of the given block into the page.
    pub fn read(&self, block: &BlockId, page: &mut Page) -> Result<()> {
        let mut files = self.open_files.lock();
        let file = Self::get_file(&self.db_directory, &mut files, block.file_name())?;

        let offset = block.number() as u64 * self.block_size as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(page.contents_mut()).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                FileError::PartialRead(block.clone())
            } else {
                FileError::Io(e)
            }
        })?;
        Ok(())
    }

    /// Writes the page to the given block and forces it to disk.
    pub fn write(&self, block: &BlockId, page: &Page) -> Result<()> {
        let mut files = self.open_files.lock();
        let file = Self::get_file(&self.db_directory, &mut files, block.file_name())?;

        let offset = block.number() as u64 * self.block_size as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.contents()).map_err(|e| {
            if e.kind() == io::ErrorKind::WriteZero {
                FileError::PartialWrite(block.clone())
            } else {
                FileError::Io(e)
            }
        })?;
        file.sync_all()?;
        Ok(())
    }

    /// Extends the file by one zeroed block and returns its identity.
    pub fn append(&self, filename: &str) -> Result<BlockId> {
        let mut files = self.open_files.lock();
        let file = Self::get_file(&self.db_directory, &mut files, filename)?;

        let new_blknum = (file.metadata()?.len() / self.block_size as u64) as i32;
        let block = BlockId::new(filename, new_blknum);

        let offset = block.number() as u64 * self.block_size as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&vec![0; self.block_size])?;
        file.sync_all()?;
        Ok(block)
    }

    /// Returns the number of blocks currently in the file.
    pub fn length(&self, filename: &str) -> Result<i32> {
        let mut files = self.open_files.lock();
        let file = Self::get_file(&self.db_directory, &mut files, filename)?;
        Ok((file.metadata()?.len() / self.block_size as u64) as i32)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    fn get_file<'a>(
        db_directory: &PathBuf,
        files: &'a mut HashMap<String, File>,
        filename: &str,
    ) -> Result<&'a mut File> {
        if !files.contains_key(filename) {
            let path = db_directory.join(filename);
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)?;
            files.insert(filename.to_string(), file);
        }
        files.get_mut(filename).ok_or_else(|| {
            FileError::Io(io::Error::new(io::ErrorKind::NotFound, filename.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_block_round_trip() {
        let dir = TempDir::new().unwrap();
        let fm = FileManager::new(dir.path(), 400).unwrap();

        let block = BlockId::new("t.db", 0);
        let mut page = Page::new(fm.block_size());
        for i in 0..fm.block_size() {
            page.contents_mut()[i] = (i % 256) as u8;
        }
        fm.append("t.db").unwrap();
        fm.write(&block, &page).unwrap();

        let mut read_back = Page::new(fm.block_size());
        fm.read(&block, &mut read_back).unwrap();
        assert_eq!(read_back.contents(), page.contents());
    }

    #[test]
    fn test_append_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let fm = FileManager::new(dir.path(), 400).unwrap();

        assert_eq!(fm.length("t.db").unwrap(), 0);
        for expected in 0..5 {
            let block = fm.append("t.db").unwrap();
            assert_eq!(block, BlockId::new("t.db", expected));
            assert_eq!(fm.length("t.db").unwrap(), expected + 1);
        }
    }

    #[test]
    fn test_new_database_detection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        {
            let fm = FileManager::new(&path, 400).unwrap();
            assert!(fm.is_new());
        }
        let fm = FileManager::new(&path, 400).unwrap();
        assert!(!fm.is_new());
    }

    #[test]
    fn test_temp_files_removed_on_startup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        {
            let fm = FileManager::new(&path, 400).unwrap();
            fm.append("tempscratch").unwrap();
            fm.append("t.tbl").unwrap();
        }
        let fm = FileManager::new(&path, 400).unwrap();
        assert!(!path.join("tempscratch").exists());
        assert!(path.join("t.tbl").exists());
        assert_eq!(fm.length("t.tbl").unwrap(), 1);
    }

    #[test]
    fn test_read_past_end_is_partial() {
        let dir = TempDir::new().unwrap();
        let fm = FileManager::new(dir.path(), 400).unwrap();
        let mut page = Page::new(fm.block_size());
        let err = fm.read(&BlockId::new("t.db", 9), &mut page).unwrap_err();
        assert!(matches!(err, FileError::PartialRead(_)));
    }
}
