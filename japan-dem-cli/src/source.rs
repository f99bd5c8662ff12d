//! Reading tile texts from XML files, ZIP archives and directories.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Xml,
    Zip,
}

impl FileType {
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xml" => Some(FileType::Xml),
            "zip" => Some(FileType::Zip),
            _ => None,
        }
    }
}

/// All tile texts reachable from `input`, in a stable order.
pub fn load_texts(input: &Path) -> Result<Vec<String>> {
    let files = if input.is_dir() {
        info!("Processing directory: {:?}", input);
        let files = collect_input_files(input)?;
        info!("Found {} input files (XML/ZIP)", files.len());
        files
    } else if input.is_file() {
        match FileType::of(input) {
            Some(file_type) => vec![(input.to_path_buf(), file_type)],
            None => bail!("Input file must be .xml or .zip: {:?}", input),
        }
    } else {
        bail!("Input path must be a file or directory: {:?}", input);
    };

    let mut texts = Vec::new();
    for (path, file_type) in &files {
        match file_type {
            FileType::Xml => texts.push(read_xml(path)?),
            FileType::Zip => texts.extend(read_zip(path)?),
        }
    }

    if texts.is_empty() {
        bail!("No XML files found in {:?}", input);
    }
    Ok(texts)
}

/// Recursively collects `.xml` and `.zip` files under `dir`, sorted by path.
pub fn collect_input_files(dir: &Path) -> Result<Vec<(PathBuf, FileType)>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))? {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(collect_input_files(&path)?);
        } else if let Some(file_type) = FileType::of(&path) {
            files.push((path, file_type));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn read_xml(path: &Path) -> Result<String> {
    debug!("Reading XML file: {:?}", path);
    fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

/// Every `.xml` entry of the archive at `path`, in archive order.
pub fn read_zip(path: &Path) -> Result<Vec<String>> {
    info!("Processing ZIP file: {:?}", path);
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("Failed to read ZIP archive {:?}", path))?;

    let mut texts = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() || !entry.name().to_ascii_lowercase().ends_with(".xml") {
            continue;
        }

        let name = entry.name().to_string();
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .with_context(|| format!("Failed to read XML file from ZIP: {}", name))?;
        debug!("Read {} ({} bytes)", name, text.len());
        texts.push(text);
    }

    if texts.is_empty() {
        bail!("No XML files found in the ZIP file {:?}", path);
    }
    Ok(texts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_file_type() {
        assert_eq!(FileType::of(Path::new("a/b.XML")), Some(FileType::Xml));
        assert_eq!(FileType::of(Path::new("a.zip")), Some(FileType::Zip));
        assert_eq!(FileType::of(Path::new("a.tif")), None);
        assert_eq!(FileType::of(Path::new("noext")), None);
    }

    #[test]
    fn test_read_zip_skips_other_entries() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tiles.zip");
        write_zip(
            &path,
            &[
                ("FG-GML-1.xml", "<a/>"),
                ("readme.txt", "ignored"),
                ("sub/FG-GML-2.XML", "<b/>"),
            ],
        );

        assert_eq!(read_zip(&path).unwrap(), vec!["<a/>", "<b/>"]);
    }

    #[test]
    fn test_zip_without_xml_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.zip");
        write_zip(&path, &[("readme.txt", "ignored")]);

        assert!(read_zip(&path).is_err());
    }

    #[test]
    fn test_directory_is_collected_recursively_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("b.xml"), "<b/>").unwrap();
        fs::write(root.join("a.xml"), "<a/>").unwrap();
        fs::write(root.join("notes.txt"), "x").unwrap();
        write_zip(&root.join("nested/c.zip"), &[("c.xml", "<c/>")]);

        let files = collect_input_files(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|(path, _)| path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.xml", "b.xml", "c.zip"]);

        assert_eq!(load_texts(root).unwrap(), vec!["<a/>", "<b/>", "<c/>"]);
    }

    #[test]
    fn test_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_texts(&temp_dir.path().join("missing.xml")).is_err());
        assert!(load_texts(temp_dir.path()).is_err());
    }
}
