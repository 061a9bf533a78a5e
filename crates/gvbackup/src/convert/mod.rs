//! Whole-archive conversion: index attachments, walk the conversation pages
//! and stream records into the backup file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::attachments::{ArchiveFiles, AttachmentIndex, AttachmentKind, build_index};
use crate::backup::BackupWriter;
use crate::document::{is_conversation_file, read_document};
use crate::synth::{ConversionContext, synthesize_document};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub messages: usize,
    pub images: usize,
    pub contact_cards: usize,
    pub documents_processed: usize,
    pub documents_skipped: usize,
    pub sms_records: usize,
    pub mms_records: usize,
    pub suppressed_placeholders: usize,
    pub unresolved_references: usize,
}

/// Archive state gathered before any record is written.
#[derive(Debug, Clone)]
pub struct PreparedArchive {
    pub context: ConversionContext,
    pub documents: Vec<PathBuf>,
}

impl PreparedArchive {
    #[must_use]
    pub fn index(&self) -> &AttachmentIndex {
        &self.context.index
    }
}

/// Conversation pages directly inside `in_dir`, in directory listing order.
pub fn list_conversation_documents(in_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(in_dir)
        .with_context(|| format!("failed to list input directory: {}", in_dir.display()))?;

    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in: {}", in_dir.display()))?;
        let path = entry.path();
        if is_conversation_file(&path) {
            documents.push(path);
        }
    }
    Ok(documents)
}

pub fn prepare_archive(in_dir: &Path) -> Result<PreparedArchive> {
    let files = ArchiveFiles::scan(in_dir)?;
    let index = build_index(&files)?;
    let documents = list_conversation_documents(in_dir)?;
    Ok(PreparedArchive {
        context: ConversionContext::new(index, files),
        documents,
    })
}

/// Converts every prepared page into `out_path` and finalizes the file.
pub fn convert_documents(prepared: PreparedArchive, out_path: &Path) -> Result<ConversionStats> {
    let PreparedArchive {
        mut context,
        documents,
    } = prepared;
    let mut stats = ConversionStats {
        images: context.files.count_of(AttachmentKind::Image),
        contact_cards: context.files.count_of(AttachmentKind::ContactCard),
        unresolved_references: context.index.unresolved_count(),
        ..ConversionStats::default()
    };

    let mut writer = BackupWriter::create(out_path)?;
    for path in &documents {
        let document = read_document(path)?;
        context.learn_owner(&document);
        if document.messages.is_empty() {
            stats.documents_skipped += 1;
            continue;
        }

        info!(document = %document.file_name(), "processing conversation page");
        stats.messages += document.messages.len();
        let summary = synthesize_document(&mut context, &document, &mut writer)
            .with_context(|| format!("failed to convert {}", path.display()))?;
        stats.documents_processed += 1;
        stats.suppressed_placeholders += summary.suppressed;
    }

    let counts = writer.counts();
    stats.sms_records = counts.sms;
    stats.mms_records = counts.mms;
    writer.finalize(stats.messages)?;
    Ok(stats)
}

pub fn write_index_report(path: &Path, index: &AttachmentIndex) -> Result<()> {
    let encoded =
        serde_json::to_vec_pretty(&index.to_report()).context("failed to encode index report")?;
    std::fs::write(path, encoded)
        .with_context(|| format!("failed to write index report: {}", path.display()))
}
