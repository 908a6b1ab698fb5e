//! PAGE-XML adapter: loading documents into the model and writing them back.

pub mod reader;
pub mod transcript;
pub mod writer;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use reader::{load, parse};
pub use writer::{save, to_xml};

/// The `.xml` files directly inside `path`, sorted by name, or `path` itself
/// when it is a file.
pub fn xml_files(path: &Path) -> io::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let path = entry?.path();
        let is_xml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if path.is_file() && is_xml {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
