use thiserror::Error;

/// Host selection failed. Fatal: nothing can be adapted until it is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no host runtime installed; call `install_host` or pass `Options::host`")]
    NoHost,
    #[error("host runtime cannot be replaced while {live} adapter(s) use the default host")]
    HostLocked { live: usize },
    #[error("host runtime is missing the `{0}` capability")]
    MissingCapability(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnhookError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("`{name}` was called after `unhook()`")]
    UseAfterDestroy { name: String },

    #[error("`{name}` was called from inside its own render")]
    Reentrant { name: String },

    #[error("host did not commit a render for `{name}`")]
    CommitPending { name: String },
}

/// A mount re-rendered itself more than the limit allows within one host
/// tick. Non-fatal: logged, reported by `Hooked::suspension`, and lifted when
/// the tick ends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{name}` re-rendered itself more than {limit} times in tick {tick}; paused until the next tick")]
pub struct RecursionLimitExceeded {
    pub name: String,
    pub tick: u64,
    pub limit: u32,
}

pub type Result<T, E = EnhookError> = std::result::Result<T, E>;
