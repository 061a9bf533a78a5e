use clap::Parser;

use super::commands::convert::ConvertArgs;

#[derive(Debug, Parser)]
#[command(
    name = "gvbackup",
    version,
    about = "Convert a Google Voice takeout archive into an SMS Backup & Restore XML file"
)]
pub struct Cli {
    #[command(flatten)]
    pub convert: ConvertArgs,
}
