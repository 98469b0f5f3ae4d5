use crate::decode::Decoder;
use crate::error::{MediaError, Result};
use crate::flags::SeekFlags;
use crate::location::Location;
use crate::options::{Dictionary, Options};
use crate::rational::Rational;

use libc::c_int;
use rsmpeg::avcodec::AVPacket;
use rsmpeg::avformat::AVFormatContextInput as AvInput;
use rsmpeg::error::RsmpegError;
use rsmpeg::ffi;

use std::ffi::CString;
use std::ptr;

// AV_NOPTS_VALUE is a cast expression bindgen cannot expand.
const AV_NOPTS_VALUE: i64 = i64::MIN;

/// Builds a [`Reader`].
pub struct ReaderBuilder<'a> {
    source: Location,
    format_hint: Option<&'a str>,
    options: Option<&'a Options>,
}

impl<'a> ReaderBuilder<'a> {
    pub fn new(source: impl Into<Location>) -> Self {
        Self {
            source: source.into(),
            format_hint: None,
            options: None,
        }
    }

    /// Force a specific demuxer instead of probing by content.
    pub fn with_format_hint(mut self, format_hint: &'a str) -> Self {
        self.format_hint = Some(format_hint);
        self
    }

    /// Options passed through to the demuxer when the input is opened.
    pub fn with_options(mut self, options: &'a Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Build [`Reader`].
    pub fn build(self) -> Result<Reader> {
        let format = self.format_hint.and_then(find_input_format);
        let options = self.options.map(|options| options.to_dict());
        let input = open_input(&self.source, format, options)?;
        Ok(Reader {
            source: self.source,
            input,
        })
    }
}

fn find_input_format(name: &str) -> Option<*const ffi::AVInputFormat> {
    let cname = CString::new(name).ok()?;
    let format = unsafe { ffi::av_find_input_format(cname.as_ptr()) };
    if format.is_null() {
        tracing::warn!(format = name, "unable to find input format");
        None
    } else {
        Some(format)
    }
}

fn open_input(
    source: &Location,
    format: Option<*const ffi::AVInputFormat>,
    options: Option<Dictionary>,
) -> Result<AvInput> {
    unsafe {
        let mut ps = ptr::null_mut();
        let path = source.to_cstring();
        let mut opts = match options {
            Some(options) => options.disown(),
            None => ptr::null_mut(),
        };

        let ret = ffi::avformat_open_input(
            &mut ps,
            path.as_ptr(),
            format.unwrap_or(ptr::null()),
            &mut opts,
        );

        // reclaim whatever ffmpeg left unconsumed
        let _opts = Dictionary::own(opts);

        match ret {
            0 => match ffi::avformat_find_stream_info(ps, ptr::null_mut()) {
                r if r >= 0 => Ok(AvInput::from_raw(ptr::NonNull::new(ps).unwrap())),
                e => {
                    ffi::avformat_close_input(&mut ps);
                    Err(MediaError::ProbeFailed(RsmpegError::from(e)))
                }
            },
            e => Err(MediaError::OpenFailed(RsmpegError::from(e))),
        }
    }
}

/// Outcome of one packet-ingestion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadStatus {
    Ok,
    Eof,
}

/// Demuxer for a single input; owns the format context.
pub struct Reader {
    pub source: Location,
    pub input: AvInput,
}

impl Reader {
    /// Read one packet and hand it to the decoder bound to its stream.
    /// A packet that matches neither stream is released here.
    pub(crate) fn dispatch(
        &mut self,
        audio: Option<&mut Decoder>,
        video: Option<&mut Decoder>,
    ) -> Result<ReadStatus> {
        let mut pkt = AVPacket::new();

        let ret = unsafe { ffi::av_read_frame(self.input.as_mut_ptr(), pkt.as_mut_ptr()) };
        if ret < 0 {
            return if ret == ffi::AVERROR_EOF {
                Ok(ReadStatus::Eof)
            } else {
                tracing::warn!(source = %self.source, code = ret, "av_read_frame failed");
                Err(MediaError::IoFailed(RsmpegError::from(ret)))
            };
        }

        if pkt.size > 0 {
            let index = pkt.stream_index as usize;
            if let Some(decoder) = audio.filter(|d| d.stream_index() == index) {
                decoder.push(pkt);
            } else if let Some(decoder) = video.filter(|d| d.stream_index() == index) {
                decoder.push(pkt);
            }
        }

        Ok(ReadStatus::Ok)
    }

    /// Seek the decoder's stream to `target` and return the decoder to a
    /// clean pre-roll state. A backward seek snaps to the keyframe at or
    /// before the target.
    pub(crate) fn seek(
        &mut self,
        decoder: &mut Decoder,
        target: i64,
        flags: SeekFlags,
    ) -> Result<()> {
        let seek_target = if flags.contains(SeekFlags::BACKWARD) {
            Rational::from(ffi::AV_TIME_BASE_Q).rescale(target, decoder.time_base())
        } else {
            target
        };

        let ret = unsafe {
            ffi::av_seek_frame(
                self.input.as_mut_ptr(),
                decoder.stream_index() as c_int,
                seek_target,
                flags.bits(),
            )
        };
        if ret < 0 {
            tracing::warn!(source = %self.source, code = ret, "failed to seek");
            return Err(MediaError::SeekFailed);
        }

        decoder.flush();
        Ok(())
    }

    /// Container duration, when the demuxer knows one.
    pub(crate) fn duration(&self) -> Option<i64> {
        let duration = self.input.duration;
        (duration != AV_NOPTS_VALUE).then_some(duration)
    }

    /// Container start time in `AV_TIME_BASE` units, 0 when unknown.
    pub(crate) fn start_time(&self) -> i64 {
        let start_time = self.input.start_time;
        if start_time == AV_NOPTS_VALUE {
            0
        } else {
            start_time
        }
    }
}

unsafe impl Send for Reader {}
