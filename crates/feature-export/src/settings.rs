use clap::Parser;
use feature_export_lib::Config;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Feature Export - Export a project's stored vector features as GeoJSON, KML or CSV
pub struct Settings {
    /// Project whose features are exported
    #[clap(short, long)]
    pub project: String,

    /// Output format: geojson, kml or csv
    #[clap(short, long, default_value = "geojson")]
    pub format: String,

    /// Base name of the output file (defaults to the configured file stem)
    #[clap(short, long)]
    pub name: Option<String>,

    /// Directory holding the stored projects
    #[clap(short, long, value_name = "DIR", default_value = "store")]
    pub store_dir: PathBuf,

    /// Directory the exported file is written to
    #[clap(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// File name stem used when no name is given
    #[clap(long, default_value = "export")]
    pub default_file_stem: String,

    /// Name written for features that have none
    #[clap(long, default_value = "Sin nombre")]
    pub unnamed_label: String,
}

impl Settings {
    /// Parse the command line, exiting with usage information on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    pub fn config(&self) -> Config {
        Config {
            default_file_stem: self.default_file_stem.clone(),
            unnamed_label: self.unnamed_label.clone(),
        }
    }
}
