//! Destinations for decoded attachment bytes.
//!
//! A [`Sink`] hands out one [`Output`] per attachment filename. Outputs stay
//! open after the write so the caller decides when to release them.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// A writable resource with an explicit, idempotent release.
pub trait Output: Write {
    fn close(&mut self) -> io::Result<()>;
}

/// Factory of outputs keyed by filename.
pub trait Sink {
    fn create(&mut self, filename: &str) -> io::Result<Box<dyn Output>>;
}

impl<F> Sink for F
where
    F: FnMut(&str) -> io::Result<Box<dyn Output>>,
{
    fn create(&mut self, filename: &str) -> io::Result<Box<dyn Output>> {
        self(filename)
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "output already closed")
}

/// Creates (or truncates) files in a directory, readable and writable by
/// the owner only.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        FileSink {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Sink for FileSink {
    fn create(&mut self, filename: &str) -> io::Result<Box<dyn Output>> {
        let path = self.dir.join(filename);
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&path)?;
        debug!("Opened {}", path.display());
        Ok(Box::new(FileOutput {
            path,
            file: Some(file),
        }))
    }
}

pub struct FileOutput {
    path: PathBuf,
    file: Option<File>,
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.as_mut().ok_or_else(closed_error)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Output for FileOutput {
    fn close(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            debug!("Closing {}", self.path.display());
            file.sync_all()?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryFile {
    name: String,
    data: Vec<u8>,
    closed: bool,
}

/// Keeps every output in memory. Clones share the same storage, so a test
/// can keep one handle and give another to the pipeline.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    files: Rc<RefCell<Vec<Rc<RefCell<MemoryFile>>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, name: &str) -> Option<Rc<RefCell<MemoryFile>>> {
        self.files
            .borrow()
            .iter()
            .find(|f| f.borrow().name == name)
            .cloned()
    }

    /// Names in creation order.
    pub fn filenames(&self) -> Vec<String> {
        self.files
            .borrow()
            .iter()
            .map(|f| f.borrow().name.clone())
            .collect()
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.find(name).map(|f| f.borrow().data.clone())
    }

    pub fn is_closed(&self, name: &str) -> bool {
        self.find(name).is_some_and(|f| f.borrow().closed)
    }
}

impl Sink for MemorySink {
    fn create(&mut self, filename: &str) -> io::Result<Box<dyn Output>> {
        let file = match self.find(filename) {
            Some(existing) => {
                let mut f = existing.borrow_mut();
                f.data.clear();
                f.closed = false;
                drop(f);
                existing
            }
            None => {
                let created = Rc::new(RefCell::new(MemoryFile {
                    name: filename.to_string(),
                    ..Default::default()
                }));
                self.files.borrow_mut().push(created.clone());
                created
            }
        };
        Ok(Box::new(MemoryOutput { file }))
    }
}

struct MemoryOutput {
    file: Rc<RefCell<MemoryFile>>,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file.borrow_mut();
        if file.closed {
            return Err(closed_error());
        }
        file.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Output for MemoryOutput {
    fn close(&mut self) -> io::Result<()> {
        self.file.borrow_mut().closed = true;
        Ok(())
    }
}
