//! User-facing absolute paths, validated before any remote call.

use crate::dropzone::error::{DropError, DropResult};
use crate::dropzone::naming::normalize_segment;
use std::fmt;

/// Normalized absolute path inside the drop zone. The empty segment list
/// is the root `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UploadTarget {
    segments: Vec<String>,
}

impl UploadTarget {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a request path such as `/events/2024`. Relative paths and
    /// `.`/`..` segments are refused; repeated slashes are collapsed.
    pub fn parse(raw: &str) -> DropResult<Self> {
        let raw = raw.trim();
        if !raw.starts_with('/') {
            return Err(DropError::validation(format!(
                "path must be absolute, got '{}'",
                raw
            )));
        }
        let mut segments = Vec::new();
        for seg in raw.split('/').filter(|s| !s.is_empty()) {
            if seg == "." || seg == ".." {
                return Err(DropError::validation("path must not contain '.' or '..'"));
            }
            segments.push(normalize_segment(seg)?);
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, `None` for the root.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Enclosing directory, `None` for the root.
    pub fn parent(&self) -> Option<UploadTarget> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append an already-normalized segment.
    pub fn child(&self, segment: impl Into<String>) -> UploadTarget {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }
}

impl fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for seg in &self.segments {
            write!(f, "/{}", seg)?;
        }
        Ok(())
    }
}

/// Join a remote base directory with further segments.
pub fn join_remote<'a>(base: &str, segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    for seg in segments {
        out.push('/');
        out.push_str(seg);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dropzone::error::DropErrorKind;

    #[test]
    fn root_renders_as_slash() {
        let t = UploadTarget::parse("/").unwrap();
        assert!(t.is_root());
        assert_eq!(t.to_string(), "/");
        assert!(t.parent().is_none());
    }

    #[test]
    fn segments_are_normalized() {
        let t = UploadTarget::parse("/Summer Party//Fotos Ü/").unwrap();
        assert_eq!(t.to_string(), "/Summer_Party/Fotos_Ue");
        assert_eq!(t.leaf(), Some("Fotos_Ue"));
        assert_eq!(t.parent().unwrap().to_string(), "/Summer_Party");
    }

    #[test]
    fn traversal_rejected() {
        for bad in ["", "events", "/a/../b", "/./a", "/a/.."] {
            let err = UploadTarget::parse(bad).unwrap_err();
            assert_eq!(err.kind, DropErrorKind::Validation, "input {:?}", bad);
        }
    }

    #[test]
    fn remote_join() {
        assert_eq!(join_remote("/", ["a", "b"]), "/a/b");
        assert_eq!(join_remote("/srv/drop/", ["a"]), "/srv/drop/a");
        assert_eq!(join_remote("/", []), "/");
        assert_eq!(join_remote("/srv", []), "/srv");
    }
}
