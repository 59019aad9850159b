//! Error type shared by the engine, the encoder and both host adapters.

/// Boxed error produced by a synthesis backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad classification of an [`Error`], for hosts that map failures onto
/// their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was rejected before any synthesis work started.
    Validation,
    /// The synthesis pipeline could not be constructed.
    Initialization,
    /// Synthesis ran but produced nothing where audio was required.
    NoOutput,
    /// The backend failed while producing a segment.
    Synthesis,
    /// The container encoder rejected the audio or is unavailable.
    Encoding,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unsupported audio format: {requested}. Supported formats: {supported}")]
    UnsupportedFormat { requested: String, supported: String },
    #[error("Unsupported source type: {0}. Only text input can be converted to audio")]
    UnsupportedSource(String),
    #[error("Text is required for audio generation")]
    TextRequired,
    #[error("Invalid tool parameters: {0}")]
    InvalidParameters(String),
    #[error("Unknown tool name: {0}")]
    UnknownTool(String),
    #[error("Failed to initialize synthesis pipeline: {0}")]
    Initialization(#[source] BoxError),
    #[error("Synthesis failed: {0}")]
    Synthesis(#[source] BoxError),
    #[error("No audio was generated")]
    NoAudioGenerated,
    #[error(
        "ffmpeg not found. Install: Linux: `sudo apt-get install ffmpeg`, \
         macOS: `brew install ffmpeg`, Windows: https://ffmpeg.org/download.html"
    )]
    EncoderNotFound,
    #[error("Audio encoding failed: {0}")]
    Encoding(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat { .. }
            | Self::UnsupportedSource(_)
            | Self::TextRequired
            | Self::InvalidParameters(_)
            | Self::UnknownTool(_) => ErrorKind::Validation,
            Self::Initialization(_) => ErrorKind::Initialization,
            Self::NoAudioGenerated => ErrorKind::NoOutput,
            Self::Synthesis(_) => ErrorKind::Synthesis,
            Self::EncoderNotFound | Self::Encoding(_) => ErrorKind::Encoding,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Self::Encoding(format!("WAV writer: {err}"))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
