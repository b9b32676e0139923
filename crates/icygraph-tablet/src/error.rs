use thiserror::Error as ThisError;

///
/// TabletError
/// Engine-side failures surfaced to the graph layer. Mutation rejections are
/// per-mutation; everything else fails the scan or the connection.
///

#[derive(Debug, ThisError)]
pub enum TabletError {
    #[error("authentication failed for user {user}")]
    AuthenticationFailed { user: String },

    #[error("table not found: {table}")]
    TableNotFound { table: String },

    #[error("mutation rejected: {reason}")]
    MutationRejected { reason: String },

    #[error("unknown server-side iterator: {name}")]
    UnknownIterator { name: String },

    #[error("iterator {name} failed to build: {reason}")]
    IteratorBuild { name: String, reason: String },

    #[error("scanner is closed")]
    ScannerClosed,
}
