//! Subcommand implementations

use anyhow::{anyhow, Context, Result};
use polypath_core::registry::memory_classes_with_config;
use polypath_core::{BlockingPath, Config, Registry, MEMORY_SCHEME};
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Explicit file when given, the default location otherwise
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) if path.exists() => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        Some(path) => {
            debug!("{} does not exist, using defaults", path.display());
            Ok(Config::default())
        }
        None => Ok(Config::load_or_default()),
    }
}

/// Route every known scheme through `config`
pub fn install_schemes(config: &Config) {
    let registry = Registry::global();
    registry.register(MEMORY_SCHEME, memory_classes_with_config(config));
    polypath_cloud::install_with_config(registry, config);
}

fn open_path(raw: &str) -> Result<BlockingPath> {
    BlockingPath::new(raw).with_context(|| format!("Invalid path {raw:?}"))
}

pub fn ls(raw: &str, long: bool) -> Result<()> {
    let dir = open_path(raw)?;
    let mut children = dir
        .iterdir()
        .with_context(|| format!("Failed to list {dir}"))?;
    children.sort();

    let mut out = io::stdout().lock();
    for child in children {
        let name = child.name();
        if !long {
            writeln!(out, "{name}")?;
            continue;
        }
        let stat = child.stat()?;
        let modified = stat
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let kind = if stat.is_dir { "d" } else { "-" };
        writeln!(out, "{kind} {:>12} {:>19} {name}", stat.size, modified)?;
    }
    Ok(())
}

pub fn cat(raw: &str) -> Result<()> {
    let file = open_path(raw)?;
    let mut handle = file
        .open("rb")
        .with_context(|| format!("Failed to open {file}"))?;
    let mut out = io::stdout().lock();
    io::copy(&mut handle, &mut out)?;
    handle.close()?;
    Ok(())
}

pub fn put(raw: &str, from: Option<&Path>, append: bool) -> Result<()> {
    let file = open_path(raw)?;
    let mut data = Vec::new();
    match from {
        Some(local) => {
            data = std::fs::read(local)
                .with_context(|| format!("Failed to read {}", local.display()))?;
        }
        None => {
            io::stdin().lock().read_to_end(&mut data)?;
        }
    }

    let mode = if append { "ab" } else { "wb" };
    file.with_open(mode, |handle| handle.write(&data).map(|_| ()))
        .with_context(|| format!("Failed to write {file}"))?;
    info!("Wrote {} bytes to {}", data.len(), file);
    Ok(())
}

pub fn cp(source: &str, target: &str, recursive: bool, follow_symlinks: bool) -> Result<()> {
    let source = open_path(source)?;
    let target = open_path(target)?;

    let copied = if source.is_dir()? {
        if !recursive {
            return Err(anyhow!("{source} is a directory (use --recursive)"));
        }
        source.copytree(&target, follow_symlinks)?
    } else {
        source.copy(&target, follow_symlinks)?
    };
    info!("Copied {} -> {}", source, copied);
    Ok(())
}

pub fn mv(source: &str, target: &str) -> Result<()> {
    let source = open_path(source)?;
    let moved = source
        .rename(target)
        .with_context(|| format!("Failed to move {source}"))?;
    info!("Moved {} -> {}", source, moved);
    Ok(())
}

pub fn rm(paths: &[String], recursive: bool, force: bool) -> Result<()> {
    for raw in paths {
        let path = open_path(raw)?;
        if path.is_dir()? {
            if !recursive {
                return Err(anyhow!("{path} is a directory (use --recursive)"));
            }
            path.rmtree()?;
        } else {
            path.unlink(force)?;
        }
        debug!("Removed {}", path);
    }
    Ok(())
}

pub fn mkdir(paths: &[String], parents: bool) -> Result<()> {
    for raw in paths {
        let path = open_path(raw)?;
        path.mkdir(parents, parents)
            .with_context(|| format!("Failed to create {path}"))?;
    }
    Ok(())
}

pub fn walk(raw: &str) -> Result<()> {
    let root = open_path(raw)?;
    let mut out = io::stdout().lock();
    for entry in root.walk()? {
        let dir = entry.dirpath;
        for name in entry.filenames {
            writeln!(out, "{}", dir.join(&name))?;
        }
        if entry.dirnames.is_empty() && dir != root {
            writeln!(out, "{dir}/")?;
        }
    }
    Ok(())
}

pub fn glob(raw: &str, pattern: &str, recursive: bool) -> Result<()> {
    let root = open_path(raw)?;
    let mut matches = if recursive {
        root.rglob(pattern)?
    } else {
        root.glob(pattern)?
    };
    if matches.is_empty() {
        warn!("No matches for {} under {}", pattern, root);
    }
    matches.sort();

    let mut out = io::stdout().lock();
    for path in matches {
        writeln!(out, "{path}")?;
    }
    Ok(())
}

pub fn stat(raw: &str, json: bool) -> Result<()> {
    let path = open_path(raw)?;
    let stat = path.stat()?;
    let is_symlink = path.is_symlink()?;
    let modified = stat.modified.map(|m| m.to_rfc3339());

    if json {
        let value = serde_json::json!({
            "path": path.to_string(),
            "class": path.class_name(),
            "backend": stat.backend,
            "size": stat.size,
            "is_dir": stat.is_dir,
            "is_symlink": is_symlink,
            "modified": modified,
            "etag": stat.etag,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Path:     {}", path);
        println!("Class:    {}", path.class_name());
        println!("Backend:  {}", stat.backend);
        println!("Size:     {}", stat.size);
        println!(
            "Kind:     {}",
            match (stat.is_dir, is_symlink) {
                (_, true) => "symlink",
                (true, false) => "directory",
                (false, false) => "file",
            }
        );
        println!("Modified: {}", modified.as_deref().unwrap_or("-"));
        if let Some(etag) = stat.etag {
            println!("ETag:     {}", etag);
        }
    }
    Ok(())
}

pub fn schemes() -> Result<()> {
    let registry = Registry::global();
    for scheme in registry.schemes() {
        if let Some(entry) = registry.get(&scheme) {
            println!(
                "{:<8} {} / {}",
                scheme,
                entry.blocking.name(),
                entry.suspend.name()
            );
        }
    }
    Ok(())
}

pub fn config(explicit: Option<&Path>, current: &Config, show: bool, init: bool, path: bool) -> Result<()> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::config_path().map_err(|e| anyhow!("Failed to get config path: {}", e))?,
    };

    if show {
        println!("{}", toml::to_string_pretty(current)?);
    } else if init {
        if config_path.exists() {
            return Err(anyhow!(
                "Configuration already exists at {}",
                config_path.display()
            ));
        }
        std::fs::write(&config_path, Config::default_config_content())
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        info!("Created {}", config_path.display());
    } else if path {
        println!("{}", config_path.display());
    } else {
        eprintln!("Please specify --show, --init, or --path");
    }
    Ok(())
}
