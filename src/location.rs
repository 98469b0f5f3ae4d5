use std::ffi::CString;
use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

/// Where media comes from: a local file path or a network URL. Anything
/// containing a scheme separator (`://`) is treated as a network input,
/// which disables seeking and preloading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    spec: String,
    network: bool,
}

impl Location {
    pub fn new(spec: impl Into<String>) -> Self {
        let spec = spec.into();
        let network = spec.contains("://");
        Self { spec, network }
    }

    pub fn is_network(&self) -> bool {
        self.network
    }

    pub fn as_str(&self) -> &str {
        &self.spec
    }

    /// Scheme of a network location, when it parses as a URL.
    pub fn scheme(&self) -> Option<String> {
        if !self.network {
            return None;
        }
        Url::parse(&self.spec).ok().map(|url| url.scheme().to_owned())
    }

    // XXX: use to_cstring when stable
    pub(crate) fn to_cstring(&self) -> CString {
        CString::new(self.spec.as_str()).unwrap()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

impl From<&str> for Location {
    fn from(spec: &str) -> Self {
        Location::new(spec)
    }
}

impl From<String> for Location {
    fn from(spec: String) -> Self {
        Location::new(spec)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Location::new(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::new(path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_paths_are_not_network() {
        let loc = Location::new("/tmp/movie.mp4");
        assert!(!loc.is_network());
        assert_eq!(loc.scheme(), None);
    }

    #[test]
    fn scheme_marks_network() {
        let loc = Location::new("rtsp://camera.local/stream");
        assert!(loc.is_network());
        assert_eq!(loc.scheme().as_deref(), Some("rtsp"));
    }

    #[test]
    fn bare_separator_is_network_without_scheme() {
        let loc = Location::new("://invalid");
        assert!(loc.is_network());
        assert_eq!(loc.scheme(), None);
    }

    #[test]
    fn from_path() {
        let loc = Location::from(Path::new("clips/a.mkv"));
        assert_eq!(loc.as_str(), "clips/a.mkv");
        assert!(!loc.is_network());
    }
}
