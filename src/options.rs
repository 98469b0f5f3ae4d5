use rsmpeg::ffi;

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::ptr;

/// Owned `AVDictionary`.
pub(crate) struct Dictionary {
    ptr: *mut ffi::AVDictionary,
}

impl Dictionary {
    pub fn new() -> Self {
        Self {
            ptr: ptr::null_mut(),
        }
    }

    /// Take ownership of a dictionary ffmpeg handed back.
    pub unsafe fn own(ptr: *mut ffi::AVDictionary) -> Self {
        Self { ptr }
    }

    /// Release ownership; the pointer must be passed to an ffmpeg call
    /// that consumes or returns it.
    pub unsafe fn disown(mut self) -> *mut ffi::AVDictionary {
        let ptr = self.ptr;
        self.ptr = ptr::null_mut();
        ptr
    }

    pub fn set(&mut self, key: &str, value: &str) {
        let (Ok(key), Ok(value)) = (CString::new(key), CString::new(value)) else {
            return;
        };
        unsafe {
            if ffi::av_dict_set(&mut self.ptr, key.as_ptr(), value.as_ptr(), 0) < 0 {
                panic!("out of memory");
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let key = CString::new(key).ok()?;
        unsafe {
            let entry = ffi::av_dict_get(self.ptr, key.as_ptr(), ptr::null_mut(), 0);
            if entry.is_null() {
                None
            } else {
                Some(CStr::from_ptr((*entry).value).to_string_lossy().into_owned())
            }
        }
    }
}

impl Clone for Dictionary {
    fn clone(&self) -> Self {
        let mut ptr = ptr::null_mut();
        unsafe {
            ffi::av_dict_copy(&mut ptr, self.ptr, 0);
        }
        Self { ptr }
    }
}

impl Drop for Dictionary {
    fn drop(&mut self) {
        unsafe {
            ffi::av_dict_free(&mut self.ptr);
        }
    }
}

/// A wrapper type for ffmpeg demuxer options. Options are applied to the
/// input when it is opened.
#[derive(Clone)]
pub struct Options(Dictionary);

impl Options {
    pub fn new() -> Self {
        Self(Dictionary::new())
    }

    /// Set a raw ffmpeg option.
    pub fn set(&mut self, key: &str, value: &str) {
        self.0.set(key, value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.0.get(key)
    }

    /// Creates options such that ffmpeg will prefer TCP transport when
    /// reading an RTSP stream (over the default UDP format).
    pub fn preset_rtsp_transport_tcp() -> Self {
        let mut opts = Self::new();
        opts.set("rtsp_transport", "tcp");
        opts
    }

    /// Like [`Options::preset_rtsp_transport_tcp`], with socket and I/O
    /// timeouts lowered to sane values.
    pub fn preset_rtsp_transport_tcp_and_sane_timeouts() -> Self {
        let mut opts = Self::preset_rtsp_transport_tcp();
        // These can't be too low because ffmpeg takes its sweet time when
        // connecting to RTSP sources sometimes.
        opts.set("rw_timeout", "16000000");
        opts.set("stimeout", "16000000");
        opts
    }

    /// Convert back to an ffmpeg native dictionary for use with `ffmpeg`
    /// functions.
    pub(crate) fn to_dict(&self) -> Dictionary {
        self.0.clone()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl From<HashMap<String, String>> for Options {
    fn from(item: HashMap<String, String>) -> Self {
        let mut opts = Self::new();
        for (k, v) in item {
            opts.set(&k, &v);
        }
        opts
    }
}

unsafe impl Send for Options {}
unsafe impl Sync for Options {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut opts = Options::new();
        opts.set("probesize", "4096");
        assert_eq!(opts.get("probesize").as_deref(), Some("4096"));
        assert_eq!(opts.get("missing"), None);
    }

    #[test]
    fn rtsp_preset() {
        let opts = Options::preset_rtsp_transport_tcp();
        assert_eq!(opts.get("rtsp_transport").as_deref(), Some("tcp"));
    }

    #[test]
    fn from_hash_map() {
        let mut map = HashMap::new();
        map.insert("fflags".to_string(), "nobuffer".to_string());
        let opts = Options::from(map);
        assert_eq!(opts.get("fflags").as_deref(), Some("nobuffer"));
    }

    #[test]
    fn clone_is_deep() {
        let mut opts = Options::new();
        opts.set("probesize", "4096");
        let copy = opts.clone();
        opts.set("probesize", "8192");
        assert_eq!(copy.get("probesize").as_deref(), Some("4096"));
    }
}
