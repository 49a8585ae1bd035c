use core::fmt;

#[cfg(debug_assertions)]
mod error_impl {
    use super::{Error, ErrorExt, ErrorKind};

    pub type ErrorInner = Box<Chained>;

    #[derive(Clone, Debug)]
    pub struct Chained {
        kind: &'static ErrorKind,
        context: Vec<&'static str>,
    }
    impl ErrorExt for Error {
        #[inline]
        fn kind(&self) -> ErrorKind {
            *self.inner.kind
        }
        #[inline]
        fn context(&self) -> &[&'static str] {
            &self.inner.context[..]
        }
        #[inline]
        fn chain_ctx(mut self, ctx: &'static str) -> Error {
            self.inner.context.push(ctx);
            self
        }
    }
    impl From<&'static ErrorKind> for Error {
        #[inline]
        fn from(kind: &'static ErrorKind) -> Error {
            Error {
                inner: Box::new(Chained {
                    kind,
                    context: Vec::new(),
                }),
            }
        }
    }
}

#[cfg(not(debug_assertions))]
mod error_impl {
    use super::{Error, ErrorExt, ErrorKind};

    /// In release mode errors are just a thin pointer.
    pub type ErrorInner = &'static ErrorKind;
    impl ErrorExt for Error {
        #[inline]
        fn kind(&self) -> ErrorKind {
            *self.inner
        }
        #[inline]
        fn context(&self) -> &[&'static str] {
            &[]
        }
        #[inline]
        fn chain_ctx(self, _ctx: &'static str) -> Error {
            self
        }
    }
    impl From<&'static ErrorKind> for Error {
        #[inline]
        fn from(inner: &'static ErrorKind) -> Error {
            Error { inner }
        }
    }
}

/// Represents an error while decoding an SMF file or while traversing its event stream.
///
/// This type wraps an `ErrorKind` and, in debug mode, the list of operations that were in
/// progress when the error occurred (innermost first).
/// In release mode it is a newtype wrapper around `&'static ErrorKind`, so the context list is
/// always empty.
///
/// The kind is always the root cause: attaching context never changes what `kind` returns.
#[derive(Clone)]
pub struct Error {
    inner: self::error_impl::ErrorInner,
}
impl Error {
    /// Create a new error with the given `ErrorKind`.
    #[inline]
    pub fn new(kind: &'static ErrorKind) -> Error {
        Error::from(kind)
    }

    /// What went wrong.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        ErrorExt::kind(self)
    }

    /// The operations that were in progress when the error occurred, innermost first.
    ///
    /// Note that this method will always return an empty slice in release mode, since context
    /// is not tracked in release.
    #[inline]
    pub fn context(&self) -> &[&'static str] {
        ErrorExt::context(self)
    }
}
impl fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.kind(), f)
    }
}
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        for ctx in self.context() {
            writeln!(f)?;
            write!(f, "  while: {}", ctx)?;
        }
        Ok(())
    }
}
impl std::error::Error for Error {}

trait ErrorExt {
    fn kind(&self) -> ErrorKind;
    fn context(&self) -> &[&'static str];
    fn chain_ctx(self, ctx: &'static str) -> Error;
}

/// The type of error that occurred.
///
/// Every kind carries a non-normative string literal with details on what exact part of the
/// file was rejected.
///
/// Structural errors (`MalformedHeader`, and `TruncatedStream` while splitting chunks) are raised
/// when loading a file. Errors inside track data are raised by whichever traversal reaches the
/// broken event first (duration calculation, seeking or playback), which then stops.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file does not start with an `MThd` header chunk, or the header contents are invalid.
    MalformedHeader(&'static str),
    /// A read would overrun the bounds of the buffer or of the chunk being read.
    TruncatedStream(&'static str),
    /// A status byte that cannot appear in a Standard Midi File track.
    UnknownStatusByte(&'static str),
    /// An event omitted its status byte before any channel status was seen in its track.
    RunningStatusWithoutContext(&'static str),
    /// The file uses SMPTE time division, but the operation needs ticks per quarter note.
    UnsupportedDivision(&'static str),
    /// Non-fatal error, but the file is clearly corrupted.
    ///
    /// This kind of error is not emitted by default, only if the `strict` crate feature is
    /// enabled.
    Malformed(&'static str),
}
impl ErrorKind {
    /// Get the informative message on what exact part of the MIDI format was not respected.
    #[inline]
    pub fn message(&self) -> &'static str {
        match *self {
            ErrorKind::MalformedHeader(msg) => msg,
            ErrorKind::TruncatedStream(msg) => msg,
            ErrorKind::UnknownStatusByte(msg) => msg,
            ErrorKind::RunningStatusWithoutContext(msg) => msg,
            ErrorKind::UnsupportedDivision(msg) => msg,
            ErrorKind::Malformed(msg) => msg,
        }
    }
}
impl fmt::Display for ErrorKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::MalformedHeader(msg) => write!(f, "malformed header: {}", msg),
            ErrorKind::TruncatedStream(msg) => write!(f, "truncated stream: {}", msg),
            ErrorKind::UnknownStatusByte(msg) => write!(f, "unknown status byte: {}", msg),
            ErrorKind::RunningStatusWithoutContext(msg) => {
                write!(f, "running status without context: {}", msg)
            }
            ErrorKind::UnsupportedDivision(msg) => write!(f, "unsupported division: {}", msg),
            ErrorKind::Malformed(msg) => write!(f, "malformed midi: {}", msg),
        }
    }
}

macro_rules! err_header {
    ($msg:expr) => {{
        const ERR_KIND: &'static ErrorKind = &ErrorKind::MalformedHeader($msg);
        ERR_KIND
    }};
}
macro_rules! err_truncated {
    ($msg:expr) => {{
        const ERR_KIND: &'static ErrorKind = &ErrorKind::TruncatedStream($msg);
        ERR_KIND
    }};
}
macro_rules! err_status {
    ($msg:expr) => {{
        const ERR_KIND: &'static ErrorKind = &ErrorKind::UnknownStatusByte($msg);
        ERR_KIND
    }};
}
macro_rules! err_running_status {
    ($msg:expr) => {{
        const ERR_KIND: &'static ErrorKind = &ErrorKind::RunningStatusWithoutContext($msg);
        ERR_KIND
    }};
}
macro_rules! err_division {
    ($msg:expr) => {{
        const ERR_KIND: &'static ErrorKind = &ErrorKind::UnsupportedDivision($msg);
        ERR_KIND
    }};
}
macro_rules! err_malformed {
    ($msg:expr) => {{
        const ERR_KIND: &'static ErrorKind = &ErrorKind::Malformed($msg);
        ERR_KIND
    }};
}

pub(crate) trait ResultExt<T> {
    fn context(self, ctx: &'static str) -> StdResult<T, Error>;
}
impl<T> ResultExt<T> for StdResult<T, Error> {
    #[inline]
    fn context(self, ctx: &'static str) -> StdResult<T, Error> {
        self.map_err(|err| err.chain_ctx(ctx))
    }
}
impl<T> ResultExt<T> for StdResult<T, &'static ErrorKind> {
    #[inline]
    fn context(self, ctx: &'static str) -> StdResult<T, Error> {
        self.map_err(|errkind| Error::from(errkind).chain_ctx(ctx))
    }
}

/// The result type used by the decoder and the player.
pub type Result<T> = StdResult<T, Error>;
pub(crate) use core::result::Result as StdResult;
