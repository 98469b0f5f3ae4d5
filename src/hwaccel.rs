use crate::ffi_hwaccel;
use crate::RawFrame;

use rsmpeg::avcodec::{AVCodec, AVCodecContext};
use rsmpeg::error::RsmpegError;
use rsmpeg::ffi;

/// Device-backed decoding for one codec context. Frames arriving in the
/// device pixel format are transferred to system memory before they reach
/// the presentation path.
pub(crate) struct HWContext {
    pixel_format: ffi::AVPixelFormat,
    _device: ffi_hwaccel::HWDeviceContext,
}

impl HWContext {
    /// Attach the first available device type the codec can decode on.
    /// Returns `None` (software decoding) when no device works out.
    pub(crate) fn new(codec: &AVCodec, codec_context: &mut AVCodecContext) -> Option<Self> {
        for device_type in ffi_hwaccel::available_device_types() {
            let Some(pixel_format) = ffi_hwaccel::codec_hwaccel_pixfmt(codec, device_type) else {
                continue;
            };

            let device = match ffi_hwaccel::HWDeviceContext::new(device_type) {
                Ok(device) => device,
                Err(err) => {
                    tracing::debug!(
                        device_type = device_type as i64,
                        error = %err,
                        "hwdevice creation failed"
                    );
                    continue;
                }
            };

            ffi_hwaccel::set_get_format(codec_context, pixel_format);
            ffi_hwaccel::set_hw_device_ctx(codec_context, &device);
            tracing::info!(
                device_type = device_type as i64,
                "hardware decoding enabled"
            );
            return Some(HWContext {
                pixel_format,
                _device: device,
            });
        }

        tracing::warn!("no usable hardware device, falling back to software decoding");
        None
    }

    pub(crate) fn is_hw_frame(&self, frame: &RawFrame) -> bool {
        frame.format == self.pixel_format
    }

    /// Copy a device frame into system memory.
    pub(crate) fn download(&self, frame: &RawFrame) -> Result<RawFrame, RsmpegError> {
        let mut sw_frame = RawFrame::new();
        ffi_hwaccel::transfer_frame(&mut sw_frame, frame)?;
        Ok(sw_frame)
    }
}
