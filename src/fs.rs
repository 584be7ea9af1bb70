//! Filesystem access for hashing and requirement checks, indirected as a
//! trait so tests can run against an in-memory tree.

pub trait FileSystem: Sync {
    /// Read a file's contents, or None if there is no such file.
    fn read(&self, path: &str) -> std::io::Result<Option<Vec<u8>>>;
    fn exists(&self, path: &str) -> bool;
}

#[derive(Default)]
pub struct RealFileSystem {}

impl RealFileSystem {
    pub fn new() -> Self {
        RealFileSystem {}
    }
}

impl FileSystem for RealFileSystem {
    fn read(&self, path: &str) -> std::io::Result<Option<Vec<u8>>> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        }
        std::fs::read(path).map(Some)
    }

    fn exists(&self, path: &str) -> bool {
        std::path::Path::new(path).exists()
    }
}
