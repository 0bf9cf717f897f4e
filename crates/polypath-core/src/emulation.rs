//! Directory emulation over flat key listings
//!
//! Object stores have no directories. A directory exists when at least one key
//! starts with `dir/`, either a real object below it or an empty marker whose
//! key is exactly `dir/`. Everything here is pure: the functions take the keys
//! of a listing and synthesize the hierarchical view.

use crate::store::Listing;
use crate::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::collections::{BTreeMap, BTreeSet};

/// One directory of a synthesized walk, relative to the walk root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkGroup {
    /// Segments below the walk root (empty for the root itself)
    pub dir: Vec<String>,
    pub dirnames: BTreeSet<String>,
    pub filenames: BTreeSet<String>,
}

/// Strip `prefix` from `key`
pub fn relative_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix)
}

/// Group every key under `prefix` by directory
///
/// Markers register their directory even when it has no other children, and
/// every intermediate directory is listed in its parent. Groups come back
/// ordered by path so a parent always precedes its children.
pub fn group_walk<'a, I>(prefix: &str, keys: I) -> Vec<WalkGroup>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut groups: BTreeMap<Vec<String>, WalkGroup> = BTreeMap::new();
    groups.insert(Vec::new(), WalkGroup::default());

    for key in keys {
        let Some(rel) = relative_key(prefix, key) else {
            continue;
        };
        let is_marker = rel.ends_with('/');
        let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            continue;
        }

        let dir_depth = if is_marker {
            segments.len()
        } else {
            segments.len() - 1
        };

        let mut current: Vec<String> = Vec::with_capacity(dir_depth);
        for segment in &segments[..dir_depth] {
            groups
                .entry(current.clone())
                .or_insert_with(|| WalkGroup {
                    dir: current.clone(),
                    ..WalkGroup::default()
                })
                .dirnames
                .insert(segment.to_string());
            current.push(segment.to_string());
        }

        let group = groups.entry(current.clone()).or_insert_with(|| WalkGroup {
            dir: current.clone(),
            ..WalkGroup::default()
        });
        if !is_marker {
            group.filenames.insert(segments[dir_depth].to_string());
        }
    }

    groups.into_values().collect()
}

/// Relative names a glob below `prefix` can match
///
/// With a delimited listing only direct children are candidates. A full
/// listing also yields every intermediate directory, so patterns like
/// `**/d` see directories that exist only through their contents.
pub fn glob_candidates(prefix: &str, listing: &Listing) -> BTreeSet<String> {
    let mut candidates = BTreeSet::new();

    for object in &listing.objects {
        let Some(rel) = relative_key(prefix, &object.key) else {
            continue;
        };
        let rel = rel.trim_end_matches('/');
        if rel.is_empty() {
            continue;
        }
        for (idx, _) in rel.match_indices('/') {
            candidates.insert(rel[..idx].to_string());
        }
        candidates.insert(rel.to_string());
    }

    for common in &listing.common_prefixes {
        if let Some(rel) = relative_key(prefix, common) {
            let rel = rel.trim_end_matches('/');
            if !rel.is_empty() {
                candidates.insert(rel.to_string());
            }
        }
    }

    candidates
}

/// Whether a pattern needs a full (recursive) listing
pub fn needs_full_listing(pattern: &str) -> bool {
    pattern.contains("**") || pattern.trim_end_matches('/').contains('/')
}

/// Shell-style matcher for relative keys where `*` never crosses `/`
#[derive(Debug, Clone)]
pub struct KeyMatcher {
    pattern: Pattern,
}

impl KeyMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern.trim_end_matches('/'))
            .map_err(|e| Error::InvalidArgument(format!("invalid glob pattern {pattern:?}: {e}")))?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, rel: &str) -> bool {
        self.pattern.matches_with(
            rel,
            MatchOptions {
                case_sensitive: true,
                require_literal_separator: true,
                require_literal_leading_dot: false,
            },
        )
    }
}

/// `rglob(p)` is `glob("**/p")`
pub fn recursive_pattern(pattern: &str) -> String {
    format!("**/{}", pattern.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectInfo;

    fn info(key: &str) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size: 0,
            last_modified: None,
            etag: None,
            metadata: Default::default(),
        }
    }

    fn full_listing(keys: &[&str]) -> Listing {
        Listing {
            objects: keys.iter().map(|k| info(k)).collect(),
            common_prefixes: Vec::new(),
        }
    }

    #[test]
    fn test_walk_grouping() {
        let groups = group_walk("X/", ["X/a.txt", "X/b.log", "X/d/c.txt"]);
        assert_eq!(groups.len(), 2);

        assert!(groups[0].dir.is_empty());
        assert_eq!(groups[0].dirnames.iter().collect::<Vec<_>>(), vec!["d"]);
        assert_eq!(
            groups[0].filenames.iter().collect::<Vec<_>>(),
            vec!["a.txt", "b.log"]
        );

        assert_eq!(groups[1].dir, vec!["d"]);
        assert!(groups[1].dirnames.is_empty());
        assert_eq!(groups[1].filenames.iter().collect::<Vec<_>>(), vec!["c.txt"]);
    }

    #[test]
    fn test_walk_registers_deep_and_empty_dirs() {
        let groups = group_walk("", ["x/y/z/f", "e/", "x/"]);
        let dirs: Vec<String> = groups.iter().map(|g| g.dir.join("/")).collect();
        assert_eq!(dirs, vec!["", "e", "x", "x/y", "x/y/z"]);
        assert_eq!(groups[0].dirnames.iter().collect::<Vec<_>>(), vec!["e", "x"]);
        assert!(groups[1].filenames.is_empty());
        assert_eq!(groups[3].dirnames.iter().collect::<Vec<_>>(), vec!["z"]);
    }

    #[test]
    fn test_walk_ignores_own_marker() {
        let groups = group_walk("X/", ["X/"]);
        assert_eq!(groups, vec![WalkGroup::default()]);
    }

    #[test]
    fn test_candidates_include_intermediate_dirs() {
        let listing = full_listing(&["X/a.txt", "X/d/c.txt", "X/e/"]);
        let candidates: Vec<String> = glob_candidates("X/", &listing).into_iter().collect();
        assert_eq!(candidates, vec!["a.txt", "d", "d/c.txt", "e"]);
    }

    #[test]
    fn test_candidates_from_delimited_listing() {
        let listing = Listing {
            objects: vec![info("X/"), info("X/a.txt")],
            common_prefixes: vec!["X/d/".to_string()],
        };
        let candidates: Vec<String> = glob_candidates("X/", &listing).into_iter().collect();
        assert_eq!(candidates, vec!["a.txt", "d"]);
    }

    #[test]
    fn test_matcher_respects_separators() {
        let star = KeyMatcher::new("*.txt").unwrap();
        assert!(star.matches("a.txt"));
        assert!(!star.matches("d/c.txt"));

        let recursive = KeyMatcher::new(&recursive_pattern("*.txt")).unwrap();
        assert!(recursive.matches("a.txt"));
        assert!(recursive.matches("d/c.txt"));
        assert!(!recursive.matches("b.log"));

        assert!(KeyMatcher::new("[").is_err());
    }

    #[test]
    fn test_needs_full_listing() {
        assert!(!needs_full_listing("*.txt"));
        assert!(!needs_full_listing("d/"));
        assert!(needs_full_listing("**/*.txt"));
        assert!(needs_full_listing("d/*.txt"));
    }
}
