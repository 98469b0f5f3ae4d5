use rsmpeg::avcodec::{AVCodec, AVCodecContext};
use rsmpeg::avutil::AVFrame;
use rsmpeg::error::RsmpegError;
use rsmpeg::ffi;

pub(crate) struct HWDeviceContext {
    ptr: *mut ffi::AVBufferRef,
}

impl HWDeviceContext {
    pub fn new(device_type: ffi::AVHWDeviceType) -> Result<HWDeviceContext, RsmpegError> {
        let mut ptr: *mut ffi::AVBufferRef = std::ptr::null_mut();

        unsafe {
            match ffi::av_hwdevice_ctx_create(
                (&mut ptr) as *mut *mut ffi::AVBufferRef,
                device_type,
                std::ptr::null(),
                std::ptr::null_mut(),
                0,
            ) {
                0 => Ok(HWDeviceContext { ptr }),
                e => Err(RsmpegError::from(e)),
            }
        }
    }

    unsafe fn ref_raw(&self) -> *mut ffi::AVBufferRef {
        ffi::av_buffer_ref(self.ptr)
    }
}

impl Drop for HWDeviceContext {
    fn drop(&mut self) {
        unsafe {
            ffi::av_buffer_unref(&mut self.ptr);
        }
    }
}

/// Device types usable on this system, in ffmpeg's iteration order.
pub(crate) fn available_device_types() -> Vec<ffi::AVHWDeviceType> {
    let mut types = Vec::new();
    let mut device_type = unsafe { ffi::av_hwdevice_iterate_types(ffi::AV_HWDEVICE_TYPE_NONE) };
    while device_type != ffi::AV_HWDEVICE_TYPE_NONE {
        types.push(device_type);
        device_type = unsafe { ffi::av_hwdevice_iterate_types(device_type) };
    }
    types
}

/// Pixel format the codec produces when decoding on `device_type`, if the
/// codec can decode on that device at all.
pub(crate) fn codec_hwaccel_pixfmt(
    codec: &AVCodec,
    device_type: ffi::AVHWDeviceType,
) -> Option<ffi::AVPixelFormat> {
    let mut i = 0;
    loop {
        unsafe {
            let hw_config = ffi::avcodec_get_hw_config(codec.as_ptr(), i);
            if hw_config.is_null() {
                break None;
            }
            let supports_device_ctx = ((*hw_config).methods as u32
                & ffi::AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX)
                != 0;
            if supports_device_ctx && (*hw_config).device_type == device_type {
                break Some((*hw_config).pix_fmt);
            }
        }
        i += 1;
    }
}

pub(crate) fn set_get_format(codec_context: &mut AVCodecContext, hw_pixfmt: ffi::AVPixelFormat) {
    unsafe {
        (*codec_context.as_mut_ptr()).opaque = hw_pixfmt as _;
        (*codec_context.as_mut_ptr()).get_format = Some(hwaccel_get_format);
    }
}

pub(crate) fn set_hw_device_ctx(
    codec_context: &mut AVCodecContext,
    hardware_device_context: &HWDeviceContext,
) {
    unsafe {
        (*codec_context.as_mut_ptr()).hw_device_ctx = hardware_device_context.ref_raw();
    }
}

/// Copy a device frame's properties and data into a software frame.
pub(crate) fn transfer_frame(
    target_frame: &mut AVFrame,
    hwdevice_frame: &AVFrame,
) -> Result<(), RsmpegError> {
    unsafe {
        match ffi::av_frame_copy_props(target_frame.as_mut_ptr(), hwdevice_frame.as_ptr()) {
            0 => {}
            e => return Err(RsmpegError::from(e)),
        }
        match ffi::av_hwframe_transfer_data(target_frame.as_mut_ptr(), hwdevice_frame.as_ptr(), 0)
        {
            0 => Ok(()),
            e => Err(RsmpegError::from(e)),
        }
    }
}

unsafe extern "C" fn hwaccel_get_format(
    ctx: *mut ffi::AVCodecContext,
    pix_fmts: *const ffi::AVPixelFormat,
) -> ffi::AVPixelFormat {
    let mut p = pix_fmts;
    while *p != ffi::AV_PIX_FMT_NONE {
        if *p == ((*ctx).opaque as i32) as ffi::AVPixelFormat {
            return *p;
        }
        p = p.add(1);
    }
    ffi::AV_PIX_FMT_NONE
}
