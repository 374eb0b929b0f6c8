//! chatshot CLI: drives the screenshot core against the real desktop.
//!
//! Usage:
//!   chatshot capture [--display ID] [--source ID] [--out FILE] [--crop]
//!   chatshot diagnostics
//!   chatshot test <SOURCE_ID>
//!   chatshot flags

use chatshot_lib::capture::{
    captured_to_png_bytes, CaptureOptions, ScreenshotOrchestrator, XcapHost,
};
use chatshot_lib::config::CaptureConfig;
use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::sync::Arc;

fn cli() -> Command {
    Command::new("chatshot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Screenshot source probing and HDR-safe capture")
        .subcommand_required(true)
        .subcommand(
            Command::new("capture")
                .about("Capture a screenshot and print its data URL")
                .arg(
                    Arg::new("display")
                        .long("display")
                        .value_name("ID")
                        .help("Target display id")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("source")
                        .long("source")
                        .value_name("ID")
                        .help("Preferred source id or name"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_name("FILE")
                        .help("Write a PNG file instead of printing the data URL"),
                )
                .arg(
                    Arg::new("crop")
                        .long("crop")
                        .action(ArgAction::SetTrue)
                        .help("Apply the virtual-source crop before writing --out"),
                ),
        )
        .subcommand(Command::new("diagnostics").about("Print pipeline diagnostics as JSON"))
        .subcommand(
            Command::new("test")
                .about("Probe a single source")
                .arg(Arg::new("source_id").required(true)),
        )
        .subcommand(Command::new("flags").about("Print renderer launch flags for this host"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let matches = cli().get_matches();
    let config = CaptureConfig::load()?;
    let host = Arc::new(XcapHost::new());

    match matches.subcommand() {
        Some(("capture", args)) => {
            let orchestrator = ScreenshotOrchestrator::with_host(host, config);
            let options = CaptureOptions {
                display_id: args.get_one::<u64>("display").copied(),
                preferred_source_id: args.get_one::<String>("source").cloned(),
            };
            let mut image = orchestrator.capture_screenshot(options).await?;

            match args.get_one::<String>("out") {
                Some(path) => {
                    if !args.get_flag("crop") {
                        image.crop = None;
                    }
                    let png = captured_to_png_bytes(&image)?;
                    std::fs::write(path, &png)?;
                    eprintln!(
                        "Wrote {} ({} bytes, source {}, {})",
                        path,
                        png.len(),
                        image.source_id,
                        image.encoding
                    );
                }
                None => println!("{}", image.data_url),
            }
        }
        Some(("diagnostics", _)) => {
            let orchestrator = ScreenshotOrchestrator::with_host(host, config);
            orchestrator.initialize().await?;
            let diagnostics = orchestrator.diagnostics().await;
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        }
        Some(("test", args)) => {
            let orchestrator = ScreenshotOrchestrator::with_host(host, config);
            let source_id = args
                .get_one::<String>("source_id")
                .map(String::as_str)
                .unwrap_or_default();
            let mut report = orchestrator.test_capture(source_id).await;
            // The data URL is megabytes of base64; report its size instead.
            if let Some(url) = report.data_url.take() {
                eprintln!("data URL: {} chars", url.len());
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(("flags", _)) => {
            let profile = chatshot_lib::launch_profile(host, &config).await;
            eprintln!("mode: {}", profile.mode());
            for arg in profile.launch_flags.to_args() {
                println!("{}", arg);
            }
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}
