use thiserror::Error;

/// Named errors produced by the awaiter / signaling boundary.
///
/// Propagated user errors never go through this type: they are carried as
/// [`anyhow::Error`](anyhow::Error) inside a [`crate::Trial`]. This type is
/// reserved for the small set of errors the core itself raises.
#[derive(Debug, Error)]
pub enum AwaiterError {
    /// A file descriptor trigger named an FD larger than the kernel wait
    /// primitive can represent.
    #[error("file descriptor {fd} exceeds the pselect capacity of {max}")]
    TooManyOpenFiles {
        /// The offending file descriptor.
        fd: libc::c_int,
        /// The largest FD the kernel wait primitive can represent.
        max: libc::c_int,
    },

    /// Installing or removing a signal disposition failed.
    #[error("signal {signal} disposition error: {source}")]
    SignalDisposition {
        /// The signal number involved.
        signal: libc::c_int,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The kernel wait primitive itself failed for a reason other than
    /// "interrupted by a signal" (which is handled internally, never
    /// surfaced to callers).
    #[error("pselect failed: {0}")]
    Pselect(#[source] std::io::Error),
}
