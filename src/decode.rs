use crate::error::{InitFailure, MediaError, Result};
use crate::hwaccel::HWContext;
use crate::io::Reader;
use crate::packet::{PacketQueue, PendingPacket};
use crate::rational::Rational;
use crate::RawFrame;

use libc::c_int;
use rsmpeg::avcodec::{AVCodec, AVCodecContext, AVCodecRef, AVPacket};
use rsmpeg::error::RsmpegError;
use rsmpeg::ffi;

/// Which elementary stream a decoder is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Video,
}

impl StreamKind {
    fn media_type(self) -> ffi::AVMediaType {
        match self {
            StreamKind::Audio => ffi::AVMEDIA_TYPE_AUDIO,
            StreamKind::Video => ffi::AVMEDIA_TYPE_VIDEO,
        }
    }
}

/// The VP8/VP9 reference decoders handle alpha and odd resolutions that
/// the built-in ones do not.
fn find_preferred_decoder(codec_id: ffi::AVCodecID) -> Option<AVCodecRef<'static>> {
    let named = match codec_id {
        ffi::AV_CODEC_ID_VP8 => AVCodec::find_decoder_by_name(c"libvpx"),
        ffi::AV_CODEC_ID_VP9 => AVCodec::find_decoder_by_name(c"libvpx-vp9"),
        _ => None,
    };
    named.or_else(|| AVCodec::find_decoder(codec_id))
}

/// Codecs whose decoders misbehave when frame threading is enabled.
fn decode_thread_count(codec_id: ffi::AVCodecID) -> c_int {
    match codec_id {
        ffi::AV_CODEC_ID_PNG
        | ffi::AV_CODEC_ID_TIFF
        | ffi::AV_CODEC_ID_JPEG2000
        | ffi::AV_CODEC_ID_MPEG4
        | ffi::AV_CODEC_ID_WEBP => 1,
        _ => 0,
    }
}

/// Per-stream decode unit: a queue of owned packets, a codec context and
/// one reusable frame slot. Everything here belongs to the playback
/// thread once the engine is running.
pub struct Decoder {
    ctx: AVCodecContext,
    hw: Option<HWContext>,
    kind: StreamKind,
    stream_index: usize,
    time_base: Rational,
    codec_time_base: Rational,
    queue: PacketQueue,
    frame: Option<RawFrame>,
    frame_pts: i64,
    next_pts: i64,
    last_duration: i64,
    frame_ready: bool,
    eof: bool,
}

impl Decoder {
    /// Bind to the best stream of `kind` and open its decoder.
    pub(crate) fn new(reader: &mut Reader, kind: StreamKind, hw_decoding: bool) -> Result<Self> {
        let stream_index = best_stream(reader, kind)?;

        let stream = reader
            .input
            .streams()
            .get(stream_index)
            .ok_or(MediaError::InitFailed(InitFailure::NoStream))?;
        let codec_id = stream.codecpar().codec_id;
        let time_base = Rational::from(stream.time_base);

        let codec = find_preferred_decoder(codec_id).ok_or_else(|| {
            tracing::warn!(?kind, "failed to find decoder");
            MediaError::InitFailed(InitFailure::NoCodec)
        })?;

        let mut ctx = AVCodecContext::new(&codec);
        ctx.apply_codecpar(&stream.codecpar()).map_err(|err| {
            tracing::warn!(?kind, error = %err, "failed to copy codec parameters");
            MediaError::InitFailed(InitFailure::ParamCopy)
        })?;

        unsafe {
            (*ctx.as_mut_ptr()).thread_count = decode_thread_count(codec_id);
        }

        let hw = if hw_decoding && kind == StreamKind::Video {
            HWContext::new(&codec, &mut ctx)
        } else {
            None
        };

        ctx.open(None).map_err(|err| {
            tracing::warn!(?kind, error = %err, "failed to open decoder");
            MediaError::InitFailed(InitFailure::DecoderOpen)
        })?;

        let codec_time_base = Rational::from(ctx.time_base);

        Ok(Self {
            ctx,
            hw,
            kind,
            stream_index,
            time_base,
            codec_time_base,
            queue: PacketQueue::new(),
            frame: None,
            frame_pts: 0,
            next_pts: 0,
            last_duration: 0,
            frame_ready: false,
            eof: false,
        })
    }

    #[inline]
    pub(crate) fn stream_index(&self) -> usize {
        self.stream_index
    }

    #[inline]
    pub(crate) fn time_base(&self) -> Rational {
        self.time_base
    }

    #[inline]
    pub(crate) fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    #[inline]
    pub(crate) fn clear_ready(&mut self) {
        self.frame_ready = false;
    }

    #[inline]
    pub(crate) fn frame_pts(&self) -> i64 {
        self.frame_pts
    }

    #[inline]
    pub(crate) fn next_pts(&self) -> i64 {
        self.next_pts
    }

    #[inline]
    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }

    pub(crate) fn frame(&self) -> Option<&RawFrame> {
        self.frame.as_ref()
    }

    pub(crate) fn colorspace(&self) -> ffi::AVColorSpace {
        self.ctx.colorspace
    }

    pub(crate) fn color_range(&self) -> ffi::AVColorRange {
        self.ctx.color_range
    }

    /// Append a demuxed packet. Ownership moves into the queue.
    pub(crate) fn push(&mut self, packet: AVPacket) {
        self.queue.push(packet);
    }

    /// Release the pending packet and every queued packet. The frame slot
    /// is left as-is.
    pub(crate) fn clear_packets(&mut self) {
        self.queue.clear();
    }

    /// Flush codec buffers and return to the pre-roll state after a seek.
    pub(crate) fn flush(&mut self) {
        unsafe {
            ffi::avcodec_flush_buffers(self.ctx.as_mut_ptr());
        }
        self.clear_packets();
        self.frame_pts = 0;
        self.frame_ready = false;
        self.eof = false;
    }

    /// Pump queued packets into the codec until a frame is ready or more
    /// input is needed. With `eof` set, a flush packet is synthesized once
    /// the queue runs dry so the codec drains its reordering buffer;
    /// drain-complete flips the decoder's own EOF flag.
    pub(crate) fn pull(&mut self, eof: bool) -> Result<()> {
        self.frame_ready = false;

        if !eof && self.queue.is_empty() {
            return Ok(());
        }

        loop {
            if !self.queue.has_pending() {
                if let Some(pkt) = self.queue.pop() {
                    self.queue.set_pending(PendingPacket::new(pkt));
                } else if !eof {
                    return Ok(());
                }
                // queue dry at EOF: fall through and feed the flush packet
            }

            let (consumed, got_frame) = Self::decode_step(
                &mut self.ctx,
                self.hw.as_ref(),
                &mut self.frame,
                self.queue.pending_packet(),
            )?;

            if !got_frame && consumed == 0 && !self.queue.has_pending() {
                // drain complete
                self.eof = true;
                return Ok(());
            }

            self.frame_ready = got_frame;

            if let Some(pending) = self.queue.pending_mut() {
                if pending.advance(consumed) {
                    self.queue.take_pending();
                }
            }

            if self.frame_ready {
                break;
            }
        }

        let (best_effort, pkt_duration, nb_samples, sample_rate) = match self.frame.as_ref() {
            Some(frame) => (
                frame.best_effort_timestamp,
                frame.duration,
                frame.nb_samples,
                frame.sample_rate,
            ),
            None => return Ok(()),
        };

        let last_pts = self.frame_pts;
        self.frame_pts = self
            .time_base
            .rescale(best_effort, Rational::NANOSECONDS);

        let duration = estimate_duration(
            self.kind == StreamKind::Audio,
            self.frame_pts,
            last_pts,
            pkt_duration,
            nb_samples,
            sample_rate,
            self.codec_time_base,
            self.last_duration,
            self.time_base,
        );
        self.last_duration = duration;
        self.next_pts = self.frame_pts + duration;

        Ok(())
    }

    /// One codec invocation: feed `pkt` (`None` is the flush packet) and
    /// try to pull a frame. Returns bytes consumed and whether the frame
    /// slot was refilled. A full codec consumes nothing and the caller
    /// retries the same packet on its next pass.
    fn decode_step(
        ctx: &mut AVCodecContext,
        hw: Option<&HWContext>,
        slot: &mut Option<RawFrame>,
        pkt: Option<&AVPacket>,
    ) -> Result<(usize, bool)> {
        let consumed = match pkt {
            Some(pkt) => match ctx.send_packet(Some(pkt)) {
                Ok(()) => pkt.size as usize,
                Err(RsmpegError::DecoderFullError) => 0,
                Err(err) => {
                    tracing::warn!(error = %err, "decode failed");
                    return Err(MediaError::DecodeFailed(err));
                }
            },
            None => match ctx.send_packet(None) {
                Ok(()) | Err(RsmpegError::DecoderFlushedError) => 0,
                Err(err) => {
                    tracing::warn!(error = %err, "decode failed");
                    return Err(MediaError::DecodeFailed(err));
                }
            },
        };

        match ctx.receive_frame() {
            Ok(frame) => {
                let frame = match hw {
                    Some(hw) if hw.is_hw_frame(&frame) => match hw.download(&frame) {
                        Ok(sw_frame) => sw_frame,
                        Err(err) => {
                            tracing::error!(error = %err, "failed to download hw frame");
                            return Ok((consumed, false));
                        }
                    },
                    _ => frame,
                };
                *slot = Some(frame);
                Ok((consumed, true))
            }
            Err(RsmpegError::DecoderDrainError) | Err(RsmpegError::DecoderFlushedError) => {
                Ok((consumed, false))
            }
            Err(err) => {
                tracing::warn!(error = %err, "decode failed");
                Err(MediaError::DecodeFailed(err))
            }
        }
    }
}

fn best_stream(reader: &mut Reader, kind: StreamKind) -> Result<usize> {
    let ret = unsafe {
        ffi::av_find_best_stream(
            reader.input.as_mut_ptr(),
            kind.media_type(),
            -1,
            -1,
            std::ptr::null_mut(),
            0,
        )
    };
    if ret < 0 {
        return Err(MediaError::InitFailed(InitFailure::NoStream));
    }
    Ok(ret as usize)
}

/// Estimated presentation duration of the current frame, in host ns. The
/// packet duration wins when the demuxer provides one; after that the
/// spacing to the previous frame, then the stream's own arithmetic.
#[allow(clippy::too_many_arguments)]
fn estimate_duration(
    is_audio: bool,
    frame_pts: i64,
    last_pts: i64,
    pkt_duration: i64,
    nb_samples: i32,
    sample_rate: i32,
    codec_time_base: Rational,
    last_duration: i64,
    stream_time_base: Rational,
) -> i64 {
    if pkt_duration > 0 {
        return stream_time_base.rescale(pkt_duration, Rational::NANOSECONDS);
    }

    if last_pts != 0 {
        return frame_pts - last_pts;
    }

    if is_audio {
        return Rational::new(1, sample_rate).rescale(nb_samples as i64, Rational::NANOSECONDS);
    }

    if last_duration != 0 {
        return last_duration;
    }

    codec_time_base.rescale(codec_time_base.numerator() as i64, Rational::NANOSECONDS)
}

unsafe impl Send for Decoder {}

#[cfg(test)]
mod tests {
    use super::*;

    const TB_90K: Rational = Rational::new(1, 90_000);
    const TB_CODEC: Rational = Rational::new(1, 30);

    #[test]
    fn packet_duration_wins_and_is_rescaled() {
        let duration = estimate_duration(false, 100, 50, 3000, 0, 0, TB_CODEC, 7, TB_90K);
        assert_eq!(duration, 33_333_333);
    }

    #[test]
    fn falls_back_to_frame_spacing() {
        let duration = estimate_duration(
            false,
            66_666_666,
            33_333_333,
            0,
            0,
            0,
            TB_CODEC,
            0,
            TB_90K,
        );
        assert_eq!(duration, 33_333_333);
    }

    #[test]
    fn first_audio_frame_uses_sample_count() {
        let duration = estimate_duration(true, 10, 0, 0, 1024, 48_000, TB_CODEC, 0, TB_90K);
        assert_eq!(duration, 21_333_333);
    }

    #[test]
    fn first_video_frame_prefers_remembered_duration() {
        let duration = estimate_duration(false, 10, 0, 0, 0, 0, TB_CODEC, 40_000_000, TB_90K);
        assert_eq!(duration, 40_000_000);
    }

    #[test]
    fn first_video_frame_last_resort_is_codec_tick() {
        let duration = estimate_duration(false, 10, 0, 0, 0, 0, TB_CODEC, 0, TB_90K);
        assert_eq!(duration, 33_333_333);
    }

    #[test]
    fn single_threaded_codecs_are_pinned() {
        assert_eq!(decode_thread_count(ffi::AV_CODEC_ID_PNG), 1);
        assert_eq!(decode_thread_count(ffi::AV_CODEC_ID_WEBP), 1);
        assert_eq!(decode_thread_count(ffi::AV_CODEC_ID_H264), 0);
    }
}
