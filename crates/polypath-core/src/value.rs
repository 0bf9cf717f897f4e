//! Pure structural path values
//!
//! A [`PathValue`] is the backend-independent part of every path: an optional
//! URI scheme, a bucket (or container) name and an ordered list of segments.
//! Nothing in this module performs I/O.

use crate::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// Immutable hierarchical identifier shared by local and object-store paths
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathValue {
    /// Lower-cased scheme, `None` for local paths
    scheme: Option<String>,
    /// Bucket or container, empty for local paths
    bucket: String,
    /// Path segments below the anchor
    segments: Vec<String>,
    /// Local paths only: rooted at `/`
    absolute: bool,
}

/// Split `scheme://rest`, lower-casing the scheme
pub(crate) fn split_scheme(input: &str) -> Option<(String, &str)> {
    let idx = input.find("://")?;
    let scheme = &input[..idx];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-')) {
        return None;
    }
    Some((scheme.to_ascii_lowercase(), &input[idx + 3..]))
}

fn split_segments(raw: &str) -> Vec<String> {
    raw.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect()
}

impl PathValue {
    /// Parse a URI (`s3://bucket/key`), a `file://` URI or a native local path
    pub fn parse(input: &str) -> Result<Self> {
        match split_scheme(input) {
            Some((scheme, rest)) if scheme == "file" => Ok(Self::parse_local(rest)),
            Some((scheme, rest)) => {
                let mut pieces = rest.splitn(2, '/');
                let bucket = pieces.next().unwrap_or_default();
                if bucket.is_empty() {
                    return Err(Error::InvalidPath(format!(
                        "{input}: missing bucket or container name"
                    )));
                }
                Ok(Self {
                    scheme: Some(scheme),
                    bucket: bucket.to_string(),
                    segments: split_segments(pieces.next().unwrap_or_default()),
                    absolute: true,
                })
            }
            None => Ok(Self::parse_local(input)),
        }
    }

    fn parse_local(raw: &str) -> Self {
        Self {
            scheme: None,
            bucket: String::new(),
            segments: split_segments(raw),
            absolute: raw.starts_with('/'),
        }
    }

    /// Build a local value from a native path
    pub fn local(path: impl AsRef<Path>) -> Self {
        Self::parse_local(&path.as_ref().to_string_lossy())
    }

    /// Build an object-store value from parts
    pub fn object(scheme: &str, bucket: &str, key: &str) -> Self {
        Self {
            scheme: Some(scheme.to_ascii_lowercase()),
            bucket: bucket.to_string(),
            segments: split_segments(key),
            absolute: true,
        }
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_local(&self) -> bool {
        self.scheme.is_none()
    }

    /// Cloud paths are always absolute
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// True for the bucket root (or `/` and `.` locally)
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Object key without scheme and bucket
    pub fn key(&self) -> String {
        self.segments.join("/")
    }

    /// Key of this path seen as a directory: `key/`, or empty at the bucket root
    pub fn dir_prefix(&self) -> String {
        if self.segments.is_empty() {
            String::new()
        } else {
            format!("{}/", self.key())
        }
    }

    /// `s3://bucket`, `/` for absolute local paths, empty otherwise
    pub fn anchor(&self) -> String {
        match &self.scheme {
            Some(scheme) => format!("{}://{}", scheme, self.bucket),
            None if self.absolute => "/".to_string(),
            None => String::new(),
        }
    }

    /// Anchor followed by every segment
    pub fn parts(&self) -> Vec<String> {
        let anchor = self.anchor();
        let mut parts = Vec::with_capacity(self.segments.len() + 1);
        if !anchor.is_empty() {
            parts.push(anchor);
        }
        parts.extend(self.segments.iter().cloned());
        parts
    }

    /// Final segment, empty at the root
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Final suffix of the name, including the leading dot
    pub fn suffix(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < name.len() => &name[idx..],
            _ => "",
        }
    }

    /// All suffixes of the name (`.tar`, `.gz`)
    pub fn suffixes(&self) -> Vec<String> {
        let name = self.name();
        if name.ends_with('.') {
            return Vec::new();
        }
        let trimmed = name.trim_start_matches('.');
        trimmed
            .split('.')
            .skip(1)
            .map(|s| format!(".{s}"))
            .collect()
    }

    /// Name without its final suffix
    pub fn stem(&self) -> &str {
        let name = self.name();
        let suffix = self.suffix();
        &name[..name.len() - suffix.len()]
    }

    fn with_segments(&self, segments: Vec<String>) -> Self {
        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            segments,
            absolute: self.absolute,
        }
    }

    /// Parent path; the root is its own parent
    pub fn parent(&self) -> Self {
        if self.segments.is_empty() {
            return self.clone();
        }
        let mut segments = self.segments.clone();
        segments.pop();
        self.with_segments(segments)
    }

    /// All ancestors, nearest first
    pub fn ancestors(&self) -> Vec<Self> {
        let mut out = Vec::with_capacity(self.segments.len());
        let mut current = self.clone();
        while !current.segments.is_empty() {
            current = current.parent();
            out.push(current.clone());
        }
        out
    }

    /// Append a relative path; a full URI or an absolute local path replaces
    pub fn join(&self, other: &str) -> Self {
        if split_scheme(other).is_some() {
            if let Ok(value) = Self::parse(other) {
                return value;
            }
        }
        if self.is_local() && other.starts_with('/') {
            return Self::parse_local(other);
        }
        let mut segments = self.segments.clone();
        segments.extend(split_segments(other));
        self.with_segments(segments)
    }

    /// Replace the final segment
    pub fn with_name(&self, name: &str) -> Result<Self> {
        if self.segments.is_empty() {
            return Err(Error::InvalidArgument(format!("{self} has an empty name")));
        }
        if name.is_empty() || name == "." || name.contains('/') {
            return Err(Error::InvalidArgument(format!("invalid name {name:?}")));
        }
        let mut segments = self.segments.clone();
        if let Some(last) = segments.last_mut() {
            *last = name.to_string();
        }
        Ok(self.with_segments(segments))
    }

    /// Replace the final suffix, or drop it with an empty string
    pub fn with_suffix(&self, suffix: &str) -> Result<Self> {
        if !suffix.is_empty() && (!suffix.starts_with('.') || suffix == "." || suffix.contains('/'))
        {
            return Err(Error::InvalidArgument(format!("invalid suffix {suffix:?}")));
        }
        let stem = self.stem().to_string();
        self.with_name(&format!("{stem}{suffix}"))
    }

    /// Replace the stem, keeping the suffix
    pub fn with_stem(&self, stem: &str) -> Result<Self> {
        let suffix = self.suffix().to_string();
        self.with_name(&format!("{stem}{suffix}"))
    }

    /// Collapse `..` segments; cannot climb above the anchor
    pub fn normalized(&self) -> Self {
        let mut segments: Vec<String> = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            if segment == ".." {
                if segments.last().is_some_and(|s| s != "..") {
                    segments.pop();
                } else if !self.absolute {
                    segments.push(segment.clone());
                }
            } else {
                segments.push(segment.clone());
            }
        }
        self.with_segments(segments)
    }

    /// Segments of `self` below `base`
    pub fn relative_to(&self, base: &PathValue) -> Result<Vec<String>> {
        if self.scheme != base.scheme
            || self.bucket != base.bucket
            || self.absolute != base.absolute
            || !self.segments.starts_with(&base.segments)
        {
            return Err(Error::InvalidArgument(format!(
                "{self} is not in the subpath of {base}"
            )));
        }
        Ok(self.segments[base.segments.len()..].to_vec())
    }

    pub fn is_relative_to(&self, base: &PathValue) -> bool {
        self.relative_to(base).is_ok()
    }

    /// Match from the right, segment by segment, like `PurePath.match`
    pub fn matches(&self, pattern: &str) -> bool {
        let pattern_segments: Vec<&str> = pattern
            .trim_end_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if pattern_segments.is_empty() {
            return false;
        }
        if pattern_segments.len() > self.segments.len() {
            return false;
        }
        pattern_segments
            .iter()
            .rev()
            .zip(self.segments.iter().rev())
            .all(|(pat, seg)| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(seg))
                    .unwrap_or(false)
            })
    }

    /// Native path for local values
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.to_string())
    }
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scheme {
            Some(scheme) if self.segments.is_empty() => write!(f, "{}://{}", scheme, self.bucket),
            Some(scheme) => write!(f, "{}://{}/{}", scheme, self.bucket, self.key()),
            None if self.absolute => write!(f, "/{}", self.key()),
            None if self.segments.is_empty() => f.write_str("."),
            None => f.write_str(&self.key()),
        }
    }
}

impl PartialOrd for PathValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts().cmp(&other.parts())
    }
}
