//! Error taxonomy for a conversion run.
//!
//! Both enums travel inside `anyhow::Error`; `main` recovers them with
//! `downcast_ref` to pick an exit code.

use std::path::PathBuf;

use thiserror::Error;

/// Problems with the invocation, detected before any document is read.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("input directory does not exist: {}", .0.display())]
    MissingInputDirectory(PathBuf),

    #[error("output file does not have xml extension: {}", .0.display())]
    OutputNotXml(PathBuf),

    #[error("output directory does not exist: {}", .0.display())]
    MissingOutputDirectory(PathBuf),
}

/// The archive violates an assumption the converter cannot safely guess around.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("found attachment reference that is not unique: {reference}")]
    DuplicateReference { reference: String },

    #[error("no matching {kind} found for reference `{reference}` in `{document}`")]
    AttachmentNotFound {
        kind: &'static str,
        reference: String,
        document: String,
    },

    #[error(
        "multiple potential matching {kind} files found for reference `{reference}` in `{document}`: {candidates:?}"
    )]
    AmbiguousAttachment {
        kind: &'static str,
        reference: String,
        document: String,
        candidates: Vec<String>,
    },

    #[error("unable to determine sender in mms with multiple participants: {participants:?}")]
    UnattributableSender { participants: Vec<String> },

    #[error("could not find participant phone number in `{document}` (empty tel field)")]
    MissingParticipantNumber { document: String },

    #[error("unrecognized attachment extension for {kind}: {}", .path.display())]
    UnsupportedAttachment { kind: &'static str, path: PathBuf },
}
