use clap::Parser;
use sheet_reconcile::logging::LogFormat;
use sheet_reconcile::utils::path_to_forward_slashes;
use sheet_reconcile::{
    CliArgs, LoggingConfig, ReconcileConfig, RunRequest, default_picker, init_logging, run,
};

fn main() -> anyhow::Result<()> {
    // `meta_data_path` may come from a .env file next to the reports
    dotenv::dotenv().ok();

    let logging = LoggingConfig::from_env();
    let _guard = init_logging(&logging)?;

    let cli = CliArgs::parse();
    let config = ReconcileConfig::from_args(&cli)?;

    let picker = default_picker();
    let request = RunRequest::resolve(&cli, picker.as_ref())?;
    let report = run(&request, &config)?;

    if logging.format == LogFormat::Json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!(
            "Comparison complete: {}",
            path_to_forward_slashes(&report.output)
        );
    }
    Ok(())
}
