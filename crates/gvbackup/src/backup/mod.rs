//! Streaming writer for the backup XML file.
//!
//! Records are appended as soon as they are synthesized. The root element
//! carries the total message count, which is only known at the end, so
//! [`BackupWriter::finalize`] prepends the header in a second pass.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

pub mod record;

pub use record::{
    AddrRole, Direction, MmsAddr, MmsPart, MmsRecord, OutputRecord, SmsRecord, write_record,
};

pub const XML_DECLARATION: &str = "<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>";
pub const BACKUP_COMMENT: &str = "<!--Converted from GV Takeout data -->";
pub const ROOT_CLOSE: &str = "</smses>";

/// Destination for synthesized records.
pub trait RecordSink {
    fn append(&mut self, record: OutputRecord) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WrittenCounts {
    pub sms: usize,
    pub mms: usize,
}

pub struct BackupWriter {
    path: PathBuf,
    out: BufWriter<File>,
    counts: WrittenCounts,
}

impl BackupWriter {
    /// Creates (or truncates) the output file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create backup file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            counts: WrittenCounts::default(),
        })
    }

    #[must_use]
    pub const fn counts(&self) -> WrittenCounts {
        self.counts
    }

    /// Closes the body and rewrites the file with the header in front.
    pub fn finalize(mut self, message_count: usize) -> Result<PathBuf> {
        writeln!(self.out, "{ROOT_CLOSE}").context("failed to close backup root element")?;
        self.out
            .flush()
            .context("failed to flush backup body writer")?;
        drop(self.out);

        prepend_header(&self.path, message_count)?;
        Ok(self.path)
    }
}

impl RecordSink for BackupWriter {
    fn append(&mut self, record: OutputRecord) -> Result<()> {
        write_record(&mut self.out, &record).context("failed to append backup record")?;
        match record {
            OutputRecord::Sms(_) => self.counts.sms += 1,
            OutputRecord::Mms(_) => self.counts.mms += 1,
        }
        Ok(())
    }
}

fn prepend_header(path: &Path, message_count: usize) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(directory)
        .with_context(|| format!("failed to stage backup file in {}", directory.display()))?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        writeln!(writer, "{XML_DECLARATION}").context("failed to write xml declaration")?;
        writeln!(writer, "{BACKUP_COMMENT}").context("failed to write backup comment")?;
        writeln!(writer, r#"<smses count="{message_count}">"#)
            .context("failed to write backup root element")?;

        let mut body = File::open(path)
            .with_context(|| format!("failed to reopen backup body: {}", path.display()))?;
        io::copy(&mut body, &mut writer).context("failed to copy backup body")?;
        writer.flush().context("failed to flush staged backup file")?;
    }

    staged
        .persist(path)
        .map_err(|error| error.error)
        .with_context(|| format!("failed to replace backup file: {}", path.display()))?;
    Ok(())
}
