use xiapi_sys::XI_RETURN;

pub type Result<T> = std::result::Result<T, Error>;

/// The error type of this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{call} failed with xiAPI code {code}")]
    Xi { call: &'static str, code: XI_RETURN },
    #[error("camera is not open")]
    NotOpen,
    #[error("frame read failed after {attempts} reopen attempt(s): {source}")]
    ReadFailed {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
    #[error("acquisition interrupted")]
    Interrupted,
    #[error("unsupported image data format code {0}")]
    UnsupportedFormat(u32),
    #[error("invalid region of interest: {0}")]
    InvalidRoi(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("value {0} is out of range for a device property")]
    OutOfRange(u32),
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("TOML deserialization error: {source}")]
    TomlDe {
        #[from]
        source: toml::de::Error,
    },
    #[error("TOML serialization error: {source}")]
    TomlSer {
        #[from]
        source: toml::ser::Error,
    },
    #[cfg(feature = "image")]
    #[error("image error: {source}")]
    Image {
        #[from]
        source: image::ImageError,
    },
}

fn _test_error_is_send() {
    // Compile-time test to ensure Error implements Send trait.
    fn implements<T: Send>() {}
    implements::<Error>();
}

/// Turn an xiAPI return code into a `Result`.
pub(crate) fn check(call: &'static str, code: XI_RETURN) -> Result<()> {
    match code as u32 {
        xiapi_sys::XI_RET::XI_OK => Ok(()),
        _ => Err(Error::Xi { call, code }),
    }
}
