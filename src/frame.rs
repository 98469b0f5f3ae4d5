use rsmpeg::ffi;

/// Up to this many data planes accompany a decoded frame.
pub const MAX_AV_PLANES: usize = 8;

/// Video formats the host accepts without conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    I420,
    Nv12,
    Yuy2,
    Uyvy,
    Rgba,
    Bgra,
    Bgrx,
}

impl PixelFormat {
    pub(crate) fn from_av(format: ffi::AVPixelFormat) -> Option<Self> {
        match format {
            ffi::AV_PIX_FMT_YUV420P => Some(PixelFormat::I420),
            ffi::AV_PIX_FMT_NV12 => Some(PixelFormat::Nv12),
            ffi::AV_PIX_FMT_YUYV422 => Some(PixelFormat::Yuy2),
            ffi::AV_PIX_FMT_UYVY422 => Some(PixelFormat::Uyvy),
            ffi::AV_PIX_FMT_RGBA => Some(PixelFormat::Rgba),
            ffi::AV_PIX_FMT_BGRA => Some(PixelFormat::Bgra),
            ffi::AV_PIX_FMT_BGR0 => Some(PixelFormat::Bgrx),
            _ => None,
        }
    }
}

/// Audio sample formats the host accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
    U8Planar,
    S16Planar,
    S32Planar,
    F32Planar,
}

impl SampleFormat {
    pub(crate) fn from_av(format: ffi::AVSampleFormat) -> Option<Self> {
        match format {
            ffi::AV_SAMPLE_FMT_U8 => Some(SampleFormat::U8),
            ffi::AV_SAMPLE_FMT_S16 => Some(SampleFormat::S16),
            ffi::AV_SAMPLE_FMT_S32 => Some(SampleFormat::S32),
            ffi::AV_SAMPLE_FMT_FLT => Some(SampleFormat::F32),
            ffi::AV_SAMPLE_FMT_U8P => Some(SampleFormat::U8Planar),
            ffi::AV_SAMPLE_FMT_S16P => Some(SampleFormat::S16Planar),
            ffi::AV_SAMPLE_FMT_S32P => Some(SampleFormat::S32Planar),
            ffi::AV_SAMPLE_FMT_FLTP => Some(SampleFormat::F32Planar),
            _ => None,
        }
    }

    /// Whether each channel occupies its own data plane.
    pub fn is_planar(&self) -> bool {
        matches!(
            self,
            SampleFormat::U8Planar
                | SampleFormat::S16Planar
                | SampleFormat::S32Planar
                | SampleFormat::F32Planar
        )
    }
}

/// Colorimetry the host should assume for a video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Default,
    Bt709,
}

impl ColorSpace {
    pub(crate) fn from_av(space: ffi::AVColorSpace) -> Self {
        if space == ffi::AVCOL_SPC_BT709 {
            ColorSpace::Bt709
        } else {
            ColorSpace::Default
        }
    }
}

/// Color range behavior. `Default` derives the range from the stream;
/// the other values force it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRange {
    Default,
    Partial,
    Full,
}

impl ColorRange {
    pub(crate) fn from_av(range: ffi::AVColorRange) -> Self {
        if range == ffi::AVCOL_RANGE_JPEG {
            ColorRange::Full
        } else {
            ColorRange::Default
        }
    }
}

/// A decoded picture handed to the video callbacks. Plane pointers point
/// into decoder or scaler buffers and are valid only for the duration of
/// the callback.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame {
    pub data: [*const u8; MAX_AV_PLANES],
    pub linesize: [i32; MAX_AV_PLANES],
    pub width: i32,
    pub height: i32,
    pub format: PixelFormat,
    pub colorspace: ColorSpace,
    pub full_range: bool,
    /// Presentation time in host nanoseconds.
    pub timestamp: i64,
}

/// A decoded audio block handed to the audio callback. Same lifetime rule
/// as [`VideoFrame`]: the planes are valid only during the call.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame {
    pub data: [*const u8; MAX_AV_PLANES],
    pub format: SampleFormat,
    pub samples_per_sec: i32,
    pub channels: i32,
    pub frames: i32,
    /// Presentation time in host nanoseconds.
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_pixel_formats_map() {
        assert_eq!(
            PixelFormat::from_av(ffi::AV_PIX_FMT_YUV420P),
            Some(PixelFormat::I420)
        );
        assert_eq!(
            PixelFormat::from_av(ffi::AV_PIX_FMT_BGR0),
            Some(PixelFormat::Bgrx)
        );
        assert_eq!(PixelFormat::from_av(ffi::AV_PIX_FMT_YUV444P10LE), None);
    }

    #[test]
    fn sample_formats_map() {
        assert_eq!(
            SampleFormat::from_av(ffi::AV_SAMPLE_FMT_FLTP),
            Some(SampleFormat::F32Planar)
        );
        assert_eq!(SampleFormat::from_av(ffi::AV_SAMPLE_FMT_DBL), None);
        assert!(SampleFormat::S16Planar.is_planar());
        assert!(!SampleFormat::S16.is_planar());
    }

    #[test]
    fn colorimetry_maps() {
        assert_eq!(ColorSpace::from_av(ffi::AVCOL_SPC_BT709), ColorSpace::Bt709);
        assert_eq!(
            ColorSpace::from_av(ffi::AVCOL_SPC_SMPTE170M),
            ColorSpace::Default
        );
        assert_eq!(
            ColorRange::from_av(ffi::AVCOL_RANGE_JPEG),
            ColorRange::Full
        );
        assert_eq!(
            ColorRange::from_av(ffi::AVCOL_RANGE_MPEG),
            ColorRange::Default
        );
    }
}
