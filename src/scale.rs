use crate::error::{InitFailure, MediaError, Result};
use crate::RawFrame;

use libc::c_int;
use rsmpeg::ffi;
use rsmpeg::swscale::SwsContext;

const FIXED_1_0: c_int = 1 << 16;

/// Pixel formats the host consumes directly.
pub(crate) const HOST_PIX_FMTS: [ffi::AVPixelFormat; 7] = [
    ffi::AV_PIX_FMT_YUV420P,
    ffi::AV_PIX_FMT_NV12,
    ffi::AV_PIX_FMT_YUYV422,
    ffi::AV_PIX_FMT_UYVY422,
    ffi::AV_PIX_FMT_RGBA,
    ffi::AV_PIX_FMT_BGRA,
    ffi::AV_PIX_FMT_BGR0,
];

/// Map a decoder output format onto the nearest format the host accepts.
pub(crate) fn closest_host_format(format: ffi::AVPixelFormat) -> ffi::AVPixelFormat {
    if HOST_PIX_FMTS.contains(&format) {
        return format;
    }

    match format {
        ffi::AV_PIX_FMT_NV21 => ffi::AV_PIX_FMT_NV12,
        // packed 4:2:2 keeps its packing
        ffi::AV_PIX_FMT_YVYU422 => ffi::AV_PIX_FMT_YUYV422,
        // alpha-carrying RGB keeps its component order
        ffi::AV_PIX_FMT_ARGB => ffi::AV_PIX_FMT_RGBA,
        ffi::AV_PIX_FMT_ABGR => ffi::AV_PIX_FMT_BGRA,
        // opaque RGB lands on four-byte BGR with unused alpha
        ffi::AV_PIX_FMT_RGB24
        | ffi::AV_PIX_FMT_BGR24
        | ffi::AV_PIX_FMT_RGB0
        | ffi::AV_PIX_FMT_0RGB
        | ffi::AV_PIX_FMT_0BGR => ffi::AV_PIX_FMT_BGR0,
        _ => ffi::AV_PIX_FMT_YUV420P,
    }
}

fn sws_colorspace(space: ffi::AVColorSpace) -> c_int {
    match space {
        ffi::AVCOL_SPC_BT709 => ffi::SWS_CS_ITU709 as c_int,
        ffi::AVCOL_SPC_FCC => ffi::SWS_CS_FCC as c_int,
        ffi::AVCOL_SPC_SMPTE170M => ffi::SWS_CS_SMPTE170M as c_int,
        ffi::AVCOL_SPC_SMPTE240M => ffi::SWS_CS_SMPTE240M as c_int,
        ffi::AVCOL_SPC_BT2020_NCL | ffi::AVCOL_SPC_BT2020_CL => ffi::SWS_CS_BT2020 as c_int,
        _ => ffi::SWS_CS_ITU601 as c_int,
    }
}

fn sws_range(range: ffi::AVColorRange) -> c_int {
    if range == ffi::AVCOL_RANGE_JPEG {
        1
    } else {
        0
    }
}

/// Converts decoded video into a host-accepted pixel format. Geometry is
/// preserved; only the format is reinterpreted. The destination planes
/// are owned here and reused for every frame.
pub(crate) struct Scaler {
    ctx: SwsContext,
    scaled: RawFrame,
}

impl Scaler {
    /// Build a converter from `src_format` to `dst_format` at identical
    /// geometry. Colorspace coefficients and range come from the stream;
    /// unknown colorspaces fall back to ITU-601.
    pub(crate) fn new(
        width: i32,
        height: i32,
        src_format: ffi::AVPixelFormat,
        dst_format: ffi::AVPixelFormat,
        colorspace: ffi::AVColorSpace,
        color_range: ffi::AVColorRange,
    ) -> Result<Self> {
        let mut ctx = SwsContext::get_context(
            width,
            height,
            src_format,
            width,
            height,
            dst_format,
            ffi::SWS_FAST_BILINEAR,
            None,
            None,
            None,
        )
        .ok_or_else(|| {
            tracing::warn!("failed to initialize scaler");
            MediaError::InitFailed(InitFailure::ScalerInit)
        })?;

        let space = sws_colorspace(colorspace);
        let range = sws_range(color_range);
        unsafe {
            let coeff = ffi::sws_getCoefficients(space);
            ffi::sws_setColorspaceDetails(
                ctx.as_mut_ptr(),
                coeff,
                range,
                coeff,
                range,
                0,
                FIXED_1_0,
                FIXED_1_0,
            );
        }

        let mut scaled = RawFrame::new();
        scaled.set_format(dst_format);
        scaled.set_width(width);
        scaled.set_height(height);
        scaled.alloc_buffer().map_err(|err| {
            tracing::warn!(error = %err, "failed to allocate scaler planes");
            MediaError::InitFailed(InitFailure::FrameAlloc)
        })?;

        Ok(Self { ctx, scaled })
    }

    /// Convert `src` into the owned destination frame.
    pub(crate) fn scale(&mut self, src: &RawFrame) -> Result<&RawFrame> {
        unsafe {
            self.ctx.scale(
                src.data.as_ptr() as *const *const u8,
                src.linesize.as_ptr(),
                0,
                src.height,
                self.scaled.data.as_ptr() as *const *mut u8,
                self.scaled.linesize.as_ptr(),
            )?;
        }
        Ok(&self.scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_formats_are_identity() {
        for format in HOST_PIX_FMTS {
            assert_eq!(closest_host_format(format), format);
        }
    }

    #[test]
    fn near_misses_keep_their_layout() {
        assert_eq!(
            closest_host_format(ffi::AV_PIX_FMT_NV21),
            ffi::AV_PIX_FMT_NV12
        );
        assert_eq!(
            closest_host_format(ffi::AV_PIX_FMT_YVYU422),
            ffi::AV_PIX_FMT_YUYV422
        );
        assert_eq!(
            closest_host_format(ffi::AV_PIX_FMT_ARGB),
            ffi::AV_PIX_FMT_RGBA
        );
        assert_eq!(
            closest_host_format(ffi::AV_PIX_FMT_RGB24),
            ffi::AV_PIX_FMT_BGR0
        );
    }

    #[test]
    fn everything_else_falls_back_to_i420() {
        assert_eq!(
            closest_host_format(ffi::AV_PIX_FMT_YUV444P10LE),
            ffi::AV_PIX_FMT_YUV420P
        );
        assert_eq!(
            closest_host_format(ffi::AV_PIX_FMT_GRAY8),
            ffi::AV_PIX_FMT_YUV420P
        );
        assert_eq!(
            closest_host_format(ffi::AV_PIX_FMT_YUVJ420P),
            ffi::AV_PIX_FMT_YUV420P
        );
    }
}
