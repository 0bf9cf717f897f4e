//! Common assertions for polypath testing

use anyhow::Result;
use polypath_core::BlockingPath;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// Relative file name -> content for every file below `root`
pub fn collect_files(root: &BlockingPath) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for entry in root.walk()? {
        for name in &entry.filenames {
            let file = entry.dirpath.join(name);
            files.insert(file.relative_to(root)?, file.read_bytes()?.to_vec());
        }
    }
    Ok(files)
}

/// Asserts that two trees hold the same files with the same content
pub fn assert_trees_equal(left: &BlockingPath, right: &BlockingPath) -> Result<()> {
    let left_files = collect_files(left)?;
    let right_files = collect_files(right)?;

    assert_eq!(
        left_files.keys().collect::<Vec<_>>(),
        right_files.keys().collect::<Vec<_>>(),
        "Different files under {} and {}",
        left,
        right
    );
    for (name, content) in &left_files {
        assert_eq!(
            Some(content),
            right_files.get(name),
            "Content mismatch for {}",
            name
        );
    }
    Ok(())
}

/// Asserts that a local directory and a path hold the same files
pub fn assert_dir_matches(dir: &Path, root: &BlockingPath) -> Result<()> {
    let mut on_disk = BTreeMap::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            let rel = entry
                .path()
                .strip_prefix(dir)?
                .to_string_lossy()
                .replace('\\', "/");
            on_disk.insert(rel, std::fs::read(entry.path())?);
        }
    }
    assert_eq!(on_disk, collect_files(root)?, "Tree mismatch for {:?}", dir);
    Ok(())
}

/// Asserts that `path` is missing
pub fn assert_absent(path: &BlockingPath) -> Result<()> {
    assert!(!path.exists()?, "{} should not exist", path);
    Ok(())
}
