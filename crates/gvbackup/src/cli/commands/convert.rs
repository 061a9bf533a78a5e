use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Args;

use crate::config::{ConversionPaths, DEFAULT_IN_DIR, DEFAULT_OUT_PATH};
use crate::utils::time::format_elapsed;

#[derive(Debug, Clone, Args)]
pub struct ConvertArgs {
    /// Directory that contains the exported .html pages.
    #[arg(long = "in_dir", short = 'i', value_name = "DIR", default_value = DEFAULT_IN_DIR)]
    pub in_dir: PathBuf,

    /// Destination .xml file for the converted messages.
    #[arg(long = "out_path", short = 'o', value_name = "FILE", default_value = DEFAULT_OUT_PATH)]
    pub out_path: PathBuf,

    /// Also write the attachment reference mapping as JSON.
    #[arg(long, value_name = "FILE")]
    pub index_out: Option<PathBuf>,
}

pub fn run(args: &ConvertArgs, paths: &ConversionPaths) -> Result<()> {
    let started = Instant::now();
    println!(
        "convert: start in_dir={} out_path={}",
        paths.in_dir.display(),
        paths.out_path.display()
    );

    println!("convert: stage index_attachments");
    let prepared = crate::convert::prepare_archive(&paths.in_dir)?;
    println!(
        "convert: checkpoint index_complete references={} unresolved={} documents={}",
        prepared.index().len(),
        prepared.index().unresolved_count(),
        prepared.documents.len()
    );
    if let Some(index_out) = &args.index_out {
        crate::convert::write_index_report(index_out, prepared.index())?;
        println!("convert: checkpoint index_written {}", index_out.display());
    }

    println!("convert: stage write_backup");
    let stats = crate::convert::convert_documents(prepared, &paths.out_path)?;
    println!(
        "convert: checkpoint backup_written {}",
        paths.out_path.display()
    );
    println!(
        "convert: complete messages={} images={} contact_cards={} sms_records={} mms_records={} documents_processed={} documents_skipped={}",
        stats.messages,
        stats.images,
        stats.contact_cards,
        stats.sms_records,
        stats.mms_records,
        stats.documents_processed,
        stats.documents_skipped
    );
    println!("convert: elapsed {}", format_elapsed(started.elapsed()));

    Ok(())
}
