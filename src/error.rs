use rsmpeg::error::RsmpegError;

pub(crate) type Result<T> = std::result::Result<T, MediaError>;

/// Which step of bringing up a stream decoder (or the engine around it)
/// went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitFailure {
    NoStream,
    NoCodec,
    ContextAlloc,
    ParamCopy,
    DecoderOpen,
    FrameAlloc,
    ScalerInit,
    ThreadSpawn,
}

/// Playback engine errors. Failures coming straight out of the ffmpeg
/// backend are wrapped in `BackendError`.
#[derive(Debug)]
pub enum MediaError {
    OpenFailed(RsmpegError),
    ProbeFailed(RsmpegError),
    InitFailed(InitFailure),
    DecodeFailed(RsmpegError),
    IoFailed(RsmpegError),
    SeekFailed,
    BackendError(RsmpegError),
}

impl std::error::Error for MediaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            MediaError::OpenFailed(ref internal) => Some(internal),
            MediaError::ProbeFailed(ref internal) => Some(internal),
            MediaError::InitFailed(_) => None,
            MediaError::DecodeFailed(ref internal) => Some(internal),
            MediaError::IoFailed(ref internal) => Some(internal),
            MediaError::SeekFailed => None,
            MediaError::BackendError(ref internal) => Some(internal),
        }
    }
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            MediaError::OpenFailed(ref internal) => {
                write!(f, "failed to open input: {}", internal)
            }
            MediaError::ProbeFailed(ref internal) => {
                write!(f, "failed to probe stream info: {}", internal)
            }
            MediaError::InitFailed(cause) => write!(f, "initialization failed: {}", cause),
            MediaError::DecodeFailed(ref internal) => write!(f, "decode failed: {}", internal),
            MediaError::IoFailed(ref internal) => write!(f, "packet read failed: {}", internal),
            MediaError::SeekFailed => write!(f, "failed to seek"),
            MediaError::BackendError(ref internal) => internal.fmt(f),
        }
    }
}

impl std::fmt::Display for InitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let what = match *self {
            InitFailure::NoStream => "no usable stream",
            InitFailure::NoCodec => "no decoder for codec",
            InitFailure::ContextAlloc => "could not allocate codec context",
            InitFailure::ParamCopy => "could not copy codec parameters",
            InitFailure::DecoderOpen => "could not open decoder",
            InitFailure::FrameAlloc => "could not allocate frame",
            InitFailure::ScalerInit => "could not initialize scaler",
            InitFailure::ThreadSpawn => "could not spawn playback thread",
        };
        f.write_str(what)
    }
}

impl From<RsmpegError> for MediaError {
    fn from(internal: RsmpegError) -> MediaError {
        MediaError::BackendError(internal)
    }
}
