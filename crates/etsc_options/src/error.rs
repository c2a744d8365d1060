//! Option and configuration errors. All of them are reported before any
//! source is parsed.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    #[error("{first} and {second} can not be used simultaneously")]
    Conflict { first: &'static str, second: &'static str },
    #[error("invalid optimization level {0} (available options: 0, 1, 2)")]
    OptLevel(u8),
    #[error("invalid extension '{0}' (available options: ets, ts, js)")]
    Extension(String),
    #[error("--hot-reload and --cold-fix require --generate-patch")]
    PatchWithoutGenerate,
    #[error("no input file, pass a file, an @listfile or --base64Input")]
    NoInput,
    #[error("failed to open list file '{0}'")]
    MissingListFile(String),
    #[error("{path}:{line}: expected 5 fields separated by ';', found {found}")]
    ListFileLine { path: String, line: usize, found: usize },
    #[error("The input string is not a valid base64 data")]
    InvalidBase64,
    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },
    #[error("invalid config '{path}': {message}")]
    Config { path: String, message: String },
}

impl OptionsError {
    pub(crate) fn io(path: impl Into<String>, error: &std::io::Error) -> Self {
        OptionsError::Io { path: path.into(), message: error.to_string() }
    }
}

pub type OptionsResult<T> = Result<T, OptionsError>;
