use clap::Parser;
use env_logger::Env;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use velostat::{
    get_data_dir, FeedSource, GridSpec, PipelineConfig, Velostat, VelostatError,
    DEFAULT_INFORMATION_URL, DEFAULT_STATUS_URL,
};

/// Enrich bike-share stations with their zones and refresh the day-by-hour availability maps.
#[derive(Debug, Parser)]
#[command(name = "velostat", version, about)]
struct Cli {
    /// Directory holding the station cache, the metrics database and the zone files.
    #[arg(long, env = "VELOSTAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory the GeoJSON outputs are written to [default: <data-dir>/output].
    #[arg(long, env = "VELOSTAT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Station status feed, as a URL or a local file.
    #[arg(long, env = "VELOSTAT_STATUS_FEED", default_value = DEFAULT_STATUS_URL)]
    status_feed: String,

    /// Station information feed, as a URL or a local file.
    #[arg(long, env = "VELOSTAT_INFORMATION_FEED", default_value = DEFAULT_INFORMATION_URL)]
    information_feed: String,

    #[arg(long, env = "VELOSTAT_NEIGHBOURHOOD_ID_PROPERTY")]
    neighbourhood_id_property: Option<String>,

    #[arg(long, env = "VELOSTAT_ARRONDISSEMENT_ID_PROPERTY")]
    arrondissement_id_property: Option<String>,

    #[arg(long, env = "VELOSTAT_COMMUNE_ID_PROPERTY")]
    commune_id_property: Option<String>,

    /// Number of days in the output grid.
    #[arg(long, env = "VELOSTAT_GRID_DAYS", default_value_t = 7)]
    grid_days: u32,

    /// Number of hours in the output grid.
    #[arg(long, env = "VELOSTAT_GRID_HOURS", default_value_t = 24)]
    grid_hours: u32,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig, VelostatError> {
        let data_dir = self
            .data_dir
            .or_else(get_data_dir)
            .ok_or(VelostatError::DataDirResolution)?;
        Ok(PipelineConfig::builder()
            .data_dir(data_dir)
            .maybe_output_dir(self.output_dir)
            .status_feed(FeedSource::from(self.status_feed.as_str()))
            .information_feed(FeedSource::from(self.information_feed.as_str()))
            .maybe_neighbourhood_id_property(self.neighbourhood_id_property)
            .maybe_arrondissement_id_property(self.arrondissement_id_property)
            .maybe_commune_id_property(self.commune_id_property)
            .grid(GridSpec {
                days: self.grid_days,
                hours: self.grid_hours,
            })
            .build())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let result = match Cli::parse().into_config() {
        Ok(config) => Velostat::new(config).run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code(&e);
            error!("Run failed: {:#}", anyhow::Error::from(e));
            ExitCode::from(code)
        }
    }
}

/// 1 when a feed could not be read, 2 for any other failure.
fn exit_code(error: &VelostatError) -> u8 {
    if error.is_fetch_failure() {
        1
    } else {
        2
    }
}
