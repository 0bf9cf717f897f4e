//! Common test fixtures for polypath testing

use anyhow::Result;
use polypath_core::{AsyncPath, BlockingPath};

/// Files of the canonical tree, relative to its root
pub const CANONICAL_FILES: [(&str, &str); 3] = [
    ("a.txt", "alpha\n"),
    ("b.log", "bravo\n"),
    ("d/c.txt", "charlie\n"),
];

/// Creates `{a.txt, b.log, d/c.txt}` under `root`
pub fn create_canonical_tree(root: &BlockingPath) -> Result<()> {
    root.mkdir(true, true)?;
    root.join("d").mkdir(true, true)?;
    for (name, content) in CANONICAL_FILES {
        root.join(name).write_text(content)?;
    }
    Ok(())
}

/// Suspend-mode [`create_canonical_tree`]
pub async fn create_canonical_tree_async(root: &AsyncPath) -> Result<()> {
    root.mkdir(true, true).await?;
    root.join("d").mkdir(true, true).await?;
    for (name, content) in CANONICAL_FILES {
        root.join(name).write_text(content).await?;
    }
    Ok(())
}

/// Creates a deeper tree with empty directories
pub fn create_nested_tree(root: &BlockingPath) -> Result<()> {
    create_canonical_tree(root)?;
    root.join("empty").mkdir(true, true)?;
    root.join("d/e/f").mkdir(true, true)?;
    root.join("d/e/f/deep.bin").write_bytes([0u8, 1, 2, 3])?;
    Ok(())
}

/// Creates a link to `a.txt` next to it (Unix only for local roots)
pub fn create_symlink_structure(root: &BlockingPath) -> Result<BlockingPath> {
    create_canonical_tree(root)?;
    let link = root.join("link_to_a");
    link.symlink_to("a.txt")?;
    Ok(link)
}
