use rpregs_client::ClientError;

/// Errors raised while converting between physical values and raw words.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A select register was given a name outside its option set.
    #[error("unknown option '{name}' (valid: {})", valid.join(", "))]
    UnknownOption { name: String, valid: Vec<String> },

    /// A select register holds a code that no option maps to.
    #[error("register holds code {0:#x}, which matches no option")]
    UnknownCode(u64),

    /// The value kind does not fit the codec (e.g. a name for a float register).
    #[error("{codec} register cannot take {value}")]
    TypeMismatch {
        codec: &'static str,
        value: String,
    },

    /// A codec parameter (or a device-reported one) is out of range.
    #[error("invalid codec parameter: {0}")]
    InvalidParameter(String),
}

/// Errors raised by register access on a module.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("bus error: {0}")]
    Client(#[from] ClientError),

    /// The module declares no register with this name.
    #[error("module {module} has no register '{name}'")]
    UnknownRegister { module: String, name: String },

    /// No built-in layout is known under this module name.
    #[error("unknown module '{0}'")]
    UnknownModule(String),

    /// Another user of the shared bus panicked while holding it.
    #[error("memory bus lock poisoned")]
    BusPoisoned,
}

pub type Result<T> = std::result::Result<T, RegisterError>;

pub type CodecResult<T> = std::result::Result<T, CodecError>;
