//! Text-read capability consumed by `require`.

use std::{collections::HashMap, fmt, io};

pub trait SourceLoader: fmt::Debug {
    fn read(&self, path: &str) -> io::Result<String>;
}

/// Reads modules from the file system, relative to the working directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn read(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// In-memory module table, for embedding hosts without a file system.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, source: &str) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: &str, source: &str) {
        self.files.insert(path.to_owned(), source.to_owned());
    }
}

impl SourceLoader for MemoryLoader {
    fn read(&self, path: &str) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{path}: no such module"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_loader() {
        let loader = MemoryLoader::new().with_file("a.tarn", "(define a 1)");
        assert_eq!(loader.read("a.tarn").unwrap(), "(define a 1)");
        assert_eq!(
            loader.read("b.tarn").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn fs_loader_missing_file() {
        let err = FsLoader.read("definitely/not/here.tarn").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
