use crate::clock::{self, PresentationClock};
use crate::control::Controls;
use crate::decode::{Decoder, StreamKind};
use crate::error::{InitFailure, MediaError, Result};
use crate::flags::SeekFlags;
use crate::frame::{
    AudioFrame, ColorRange, ColorSpace, PixelFormat, SampleFormat, VideoFrame, MAX_AV_PLANES,
};
use crate::io::{ReadStatus, Reader, ReaderBuilder};
use crate::location::Location;
use crate::options::Options;
use crate::scale::{self, Scaler};

use rsmpeg::ffi;

use std::ptr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub type VideoCallback = Box<dyn FnMut(&VideoFrame) + Send>;
pub type AudioCallback = Box<dyn FnMut(&AudioFrame) + Send>;
pub type StoppedCallback = Box<dyn FnMut() + Send>;

/// Host callbacks, all invoked from the playback thread. Every callback
/// is optional; unregistered ones are skipped.
#[derive(Default)]
struct Callbacks {
    video: Option<VideoCallback>,
    audio: Option<AudioCallback>,
    video_preload: Option<VideoCallback>,
    stopped: Option<StoppedCallback>,
}

/// Builds a [`Media`].
///
/// # Example
///
/// ```ignore
/// let media = Media::builder("movie.mp4")
///     .on_video(|frame| println!("frame at {}", frame.timestamp))
///     .on_stopped(|| println!("done"))
///     .build()?;
/// media.play(false);
/// ```
pub struct MediaBuilder {
    source: Location,
    format_hint: Option<String>,
    options: Option<Options>,
    callbacks: Callbacks,
    hw_decoding: bool,
    force_range: ColorRange,
}

impl MediaBuilder {
    pub fn new(source: impl Into<Location>) -> Self {
        Self {
            source: source.into(),
            format_hint: None,
            options: None,
            callbacks: Callbacks::default(),
            hw_decoding: false,
            force_range: ColorRange::Default,
        }
    }

    /// Force a specific demuxer instead of probing by content.
    pub fn with_format_hint(mut self, format_hint: impl Into<String>) -> Self {
        self.format_hint = Some(format_hint.into());
        self
    }

    /// Options passed through to the demuxer.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Prefer hardware decoding for the video stream. Falls back to
    /// software decoding when no device works out.
    pub fn with_hardware_decoding(mut self, enabled: bool) -> Self {
        self.hw_decoding = enabled;
        self
    }

    /// Override the color range reported with every video frame instead
    /// of deriving it from the stream.
    pub fn with_force_range(mut self, range: ColorRange) -> Self {
        self.force_range = range;
        self
    }

    /// Frame delivery during playback.
    pub fn on_video(mut self, callback: impl FnMut(&VideoFrame) + Send + 'static) -> Self {
        self.callbacks.video = Some(Box::new(callback));
        self
    }

    /// Audio block delivery during playback.
    pub fn on_audio(mut self, callback: impl FnMut(&AudioFrame) + Send + 'static) -> Self {
        self.callbacks.audio = Some(Box::new(callback));
        self
    }

    /// One early frame per reset while stopped, so the host has something
    /// to show before playback starts. Never fires for network inputs.
    pub fn on_video_preload(mut self, callback: impl FnMut(&VideoFrame) + Send + 'static) -> Self {
        self.callbacks.video_preload = Some(Box::new(callback));
        self
    }

    /// Transition into the stopped state, either at end of media or after
    /// an explicit stop.
    pub fn on_stopped(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.callbacks.stopped = Some(Box::new(callback));
        self
    }

    /// Open the input, bring up the decoders and spawn the playback
    /// thread. The engine starts suspended; call [`Media::play`].
    pub fn build(self) -> Result<Media> {
        Media::open(self)
    }
}

/// A running playback engine bound to one input. Frames are delivered
/// through the callbacks registered on the builder, paced to wall-clock
/// time. Dropping the handle tears the playback thread down.
pub struct Media {
    controls: Arc<Controls>,
    thread: Option<JoinHandle<()>>,
    has_audio: bool,
    has_video: bool,
}

impl Media {
    pub fn builder(source: impl Into<Location>) -> MediaBuilder {
        MediaBuilder::new(source)
    }

    fn open(builder: MediaBuilder) -> Result<Media> {
        let MediaBuilder {
            source,
            format_hint,
            options,
            callbacks,
            hw_decoding,
            force_range,
        } = builder;

        unsafe {
            ffi::avformat_network_init();
        }
        if let Some(scheme) = source.scheme() {
            tracing::debug!(%scheme, "network input");
        }

        clock::engine_epoch_ns();

        let mut reader = {
            let mut builder = ReaderBuilder::new(source.clone());
            if let Some(hint) = format_hint.as_deref() {
                builder = builder.with_format_hint(hint);
            }
            if let Some(options) = options.as_ref() {
                builder = builder.with_options(options);
            }
            builder.build()?
        };

        let audio = match Decoder::new(&mut reader, StreamKind::Audio, hw_decoding) {
            Ok(decoder) => Some(decoder),
            Err(err) => {
                tracing::debug!(error = %err, "audio decoder unavailable");
                None
            }
        };
        let video = match Decoder::new(&mut reader, StreamKind::Video, hw_decoding) {
            Ok(decoder) => Some(decoder),
            Err(err) => {
                tracing::debug!(error = %err, "video decoder unavailable");
                None
            }
        };

        if audio.is_none() && video.is_none() {
            tracing::warn!(source = %source, "could not initialize audio or video");
            return Err(MediaError::InitFailed(InitFailure::NoStream));
        }

        let controls = Arc::new(Controls::new());
        let has_audio = audio.is_some();
        let has_video = video.is_some();

        let pipeline = Pipeline {
            reader,
            audio,
            video,
            scaler: None,
            scale_format: ffi::AV_PIX_FMT_NONE,
            clock: PresentationClock::default(),
            controls: Arc::clone(&controls),
            callbacks,
            force_range,
            cur_format: None,
            cur_space: ColorSpace::Default,
            cur_range: ColorRange::Default,
            is_network: source.is_network(),
            eof: false,
        };

        let thread = thread::Builder::new()
            .name("rsplayback".into())
            .spawn(move || pipeline.run())
            .map_err(|err| {
                tracing::warn!(error = %err, "could not spawn playback thread");
                MediaError::InitFailed(InitFailure::ThreadSpawn)
            })?;

        Ok(Media {
            controls,
            thread: Some(thread),
            has_audio,
            has_video,
        })
    }

    #[inline]
    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    #[inline]
    pub fn has_video(&self) -> bool {
        self.has_video
    }

    /// Start playback from the beginning. Calling this while already
    /// playing restarts from the beginning instead.
    pub fn play(&self, looping: bool) {
        self.controls.request_play(looping, clock::sys_time_ns());
    }

    /// Stop playback. The stopped callback fires once the playback thread
    /// has wound the session down. No-op when already stopped.
    pub fn stop(&self) {
        self.controls.request_stop();
    }

    /// Stop playback and tear the engine down. Idempotent; also runs on
    /// drop.
    pub fn close(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.controls.request_stop();
            self.controls.request_kill();
            if thread.join().is_err() {
                tracing::warn!("playback thread panicked");
            }
        }
    }
}

impl Drop for Media {
    fn drop(&mut self) {
        self.close();
    }
}

/// Everything the playback thread owns: demuxer, decoders, scaler,
/// presentation clock and callbacks. Only the shared [`Controls`] are
/// ever touched from outside.
struct Pipeline {
    reader: Reader,
    audio: Option<Decoder>,
    video: Option<Decoder>,
    scaler: Option<Scaler>,
    scale_format: ffi::AVPixelFormat,
    clock: PresentationClock,
    controls: Arc<Controls>,
    callbacks: Callbacks,
    force_range: ColorRange,
    cur_format: Option<PixelFormat>,
    cur_space: ColorSpace,
    cur_range: ColorRange,
    is_network: bool,
    eof: bool,
}

unsafe impl Send for Pipeline {}

impl Pipeline {
    /// Playback thread body. Suspends while inactive, otherwise sleeps to
    /// each frame deadline; exits on kill or on a pipeline error.
    fn run(mut self) {
        if let Err(err) = self.reset() {
            tracing::warn!(error = %err, "initial reset failed");
        }

        loop {
            let is_active = self.controls.is_active();
            if !is_active {
                self.controls.wait();
            } else {
                self.clock.sleep_to_deadline();
            }

            let transition = self.controls.take_transition();
            self.clock.play_sys_ts = transition.play_sys_ts;

            if transition.kill {
                break;
            }
            if transition.reset {
                if let Err(err) = self.reset() {
                    tracing::error!(error = %err, "reset failed");
                    return;
                }
                continue;
            }

            if is_active {
                self.emit_video(false);
                self.emit_audio();

                if let Err(err) = self.prepare_frames() {
                    tracing::error!(error = %err, "pipeline stalled");
                    return;
                }
                match self.check_eof() {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(err) => {
                        tracing::error!(error = %err, "reset failed");
                        return;
                    }
                }

                let min_next = self.next_min_pts();
                self.clock.advance(min_next);
            }
        }
    }

    /// Every enabled stream either has a frame buffered or has drained.
    fn ready_to_start(&self) -> bool {
        for decoder in [&self.audio, &self.video].into_iter().flatten() {
            if !decoder.is_eof() && !decoder.frame_ready() {
                return false;
            }
        }
        true
    }

    /// Smallest pts among the buffered frames.
    fn next_min_pts(&self) -> i64 {
        let mut min_next = i64::MAX;
        for decoder in [&self.audio, &self.video].into_iter().flatten() {
            if decoder.frame_ready() {
                min_next = min_next.min(decoder.frame_pts());
            }
        }
        min_next
    }

    /// Largest end-of-frame pts across streams, the amount a loop wrap
    /// advances the base offset by.
    fn base_pts(&self) -> i64 {
        let mut base = 0;
        for decoder in [&self.audio, &self.video].into_iter().flatten() {
            base = base.max(decoder.next_pts());
        }
        base
    }

    /// Pull packets and decode until ready-to-start holds. Builds the
    /// scaler the first time a decoded video frame reveals the real
    /// output format.
    fn prepare_frames(&mut self) -> Result<()> {
        while !self.ready_to_start() {
            if !self.eof {
                match self
                    .reader
                    .dispatch(self.audio.as_mut(), self.video.as_mut())?
                {
                    ReadStatus::Eof => self.eof = true,
                    ReadStatus::Ok => {}
                }
            }

            let eof = self.eof;
            if let Some(video) = self.video.as_mut() {
                if !video.frame_ready() {
                    video.pull(eof)?;
                }
            }
            if let Some(audio) = self.audio.as_mut() {
                if !audio.frame_ready() {
                    audio.pull(eof)?;
                }
            }
        }

        if self.scaler.is_none() {
            let source = match self.video.as_ref() {
                Some(video) if video.frame_ready() => video.frame().map(|frame| {
                    (
                        frame.format,
                        frame.width,
                        frame.height,
                        video.colorspace(),
                        video.color_range(),
                    )
                }),
                _ => None,
            };
            if let Some((src_format, width, height, colorspace, color_range)) = source {
                self.scale_format = scale::closest_host_format(src_format);
                if self.scale_format != src_format {
                    self.scaler = Some(Scaler::new(
                        width,
                        height,
                        src_format,
                        self.scale_format,
                        colorspace,
                        color_range,
                    )?);
                }
            }
        }

        Ok(())
    }

    /// True when every enabled stream has drained. Loops back to the
    /// start, or winds the session down when not looping.
    fn check_eof(&mut self) -> Result<bool> {
        let video_ended = self.video.as_ref().map_or(true, |d| !d.frame_ready());
        let audio_ended = self.audio.as_ref().map_or(true, |d| !d.frame_ready());
        if !(video_ended && audio_ended) {
            return Ok(false);
        }

        self.controls.finish();
        self.reset()?;
        Ok(true)
    }

    /// Return to "ready to play from the start" while keeping host
    /// timestamps monotonic across the wrap.
    fn reset(&mut self) -> Result<()> {
        let (seek_pos, seek_flags) = match self.reader.duration() {
            None => (0, SeekFlags::FRAME),
            Some(_) => (self.reader.start_time(), SeekFlags::BACKWARD),
        };

        // network inputs are forward-only
        if !self.is_network {
            if let Some(audio) = self.audio.as_mut() {
                self.reader.seek(audio, seek_pos, seek_flags)?;
            }
            if let Some(video) = self.video.as_mut() {
                self.reader.seek(video, seek_pos, seek_flags)?;
            }
        }

        self.eof = false;
        let base = self.base_pts();
        self.clock.rebase(base);

        self.prepare_frames()?;

        let min_pts = self.next_min_pts();
        self.clock.anchor(min_pts);

        let (stopping, active) = self.controls.latch_stop();

        if !active && !self.is_network && self.callbacks.video_preload.is_some() {
            self.emit_video(true);
        }
        if stopping {
            if let Some(stopped) = self.callbacks.stopped.as_mut() {
                stopped();
            }
        }

        Ok(())
    }

    /// Send the buffered video frame to the host once its deadline has
    /// been reached. Preload emission leaves the frame buffered.
    fn emit_video(&mut self, preload: bool) {
        let playable = self
            .video
            .as_ref()
            .map_or(false, |d| d.frame_ready() && d.frame_pts() <= self.clock.next_pts_ns);
        if !playable {
            return;
        }

        if !preload {
            if let Some(video) = self.video.as_mut() {
                video.clear_ready();
            }
            if self.callbacks.video.is_none() {
                return;
            }
        }

        let mut data = [ptr::null(); MAX_AV_PLANES];
        let mut linesize = [0i32; MAX_AV_PLANES];
        let (frame_pts, width, height, frame_space, frame_range) = {
            let Some(video) = self.video.as_ref() else {
                return;
            };
            let Some(frame) = video.frame() else {
                return;
            };
            let meta = (
                video.frame_pts(),
                frame.width,
                frame.height,
                frame.colorspace,
                frame.color_range,
            );

            if let Some(scaler) = self.scaler.as_mut() {
                match scaler.scale(frame) {
                    Ok(scaled) => {
                        for i in 0..4 {
                            data[i] = scaled.data[i].cast_const();
                            linesize[i] = scaled.linesize[i];
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "pixel format conversion failed");
                        return;
                    }
                }
            } else {
                for i in 0..MAX_AV_PLANES {
                    data[i] = frame.data[i].cast_const();
                    linesize[i] = frame.linesize[i];
                }
            }
            meta
        };

        let Some(format) = PixelFormat::from_av(self.scale_format) else {
            return;
        };
        let colorspace = ColorSpace::from_av(frame_space);
        let range = match self.force_range {
            ColorRange::Default => ColorRange::from_av(frame_range),
            forced => forced,
        };

        if self.cur_format != Some(format) || self.cur_space != colorspace || self.cur_range != range
        {
            self.cur_format = Some(format);
            self.cur_space = colorspace;
            self.cur_range = range;
            tracing::debug!(?format, ?colorspace, ?range, "video format changed");
        }

        let frame = VideoFrame {
            data,
            linesize,
            width,
            height,
            format,
            colorspace,
            full_range: range == ColorRange::Full,
            timestamp: self
                .clock
                .host_timestamp(frame_pts, clock::engine_epoch_ns()),
        };

        let callback = if preload {
            self.callbacks.video_preload.as_mut()
        } else {
            self.callbacks.video.as_mut()
        };
        if let Some(callback) = callback {
            callback(&frame);
        }
    }

    /// Send the buffered audio block to the host once its deadline has
    /// been reached.
    fn emit_audio(&mut self) {
        let playable = self
            .audio
            .as_ref()
            .map_or(false, |d| d.frame_ready() && d.frame_pts() <= self.clock.next_pts_ns);
        if !playable {
            return;
        }

        if let Some(audio) = self.audio.as_mut() {
            audio.clear_ready();
        }
        if self.callbacks.audio.is_none() {
            return;
        }

        let (frame_pts, data, raw_format, sample_rate, channels, nb_samples) = {
            let Some(audio) = self.audio.as_ref() else {
                return;
            };
            let Some(frame) = audio.frame() else {
                return;
            };
            let mut data = [ptr::null(); MAX_AV_PLANES];
            for i in 0..MAX_AV_PLANES {
                data[i] = frame.data[i].cast_const();
            }
            (
                audio.frame_pts(),
                data,
                frame.format,
                frame.sample_rate,
                frame.ch_layout.nb_channels,
                frame.nb_samples,
            )
        };

        let Some(format) = SampleFormat::from_av(raw_format) else {
            return;
        };

        let block = AudioFrame {
            data,
            format,
            samples_per_sec: sample_rate,
            channels,
            frames: nb_samples,
            timestamp: self
                .clock
                .host_timestamp(frame_pts, clock::engine_epoch_ns()),
        };

        if let Some(callback) = self.callbacks.audio.as_mut() {
            callback(&block);
        }
    }
}
