//! CLI entry point for StackShot
//!
//! # Usage
//!
//! Preview a plan without touching any device:
//! ```bash
//! stackshot plan --f-stop 5.6 --focal-length 100 --distance 400 --length 100
//! ```
//!
//! Run a sequence and copy the images off the camera:
//! ```bash
//! stackshot shoot --f-stop 5.6 --focal-length 100 --distance 400 --length 100 --archive beetle
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use stackshot::devices;
use stackshot::{
    init_logging, AcquisitionOrchestrator, Config, DeviceJournal, Direction, ImageArchive,
    SequenceOptions, ShotPlan, BUILD_DATE, VERSION,
};
use stackshot_communication::{CameraLink, CameraTransport, StageLink, StagePort};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackshot")]
#[command(about = "Focus-stacking acquisition with a G-code stage and a network camera")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON); defaults to the platform config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use simulated devices instead of the serial port and camera
    #[arg(long, global = true)]
    simulate: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute depth of field, increment and shot count
    Plan(PlanArgs),

    /// Home, set the origin and run one stacking sequence
    Shoot {
        #[command(flatten)]
        plan: PlanArgs,

        /// Copy captured images into this directory
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Delete images from the camera once archived
        #[arg(long, requires = "archive")]
        delete: bool,

        /// Write the run result as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Move back to the origin after the run
        #[arg(long)]
        return_to_origin: bool,
    },

    /// Print the current stage position
    Position,

    /// Print camera battery, capture folder and file count
    CameraStatus,
}

#[derive(Args, Clone, Copy)]
struct PlanArgs {
    /// Aperture f-number
    #[arg(long)]
    f_stop: f64,

    /// Lens focal length in mm
    #[arg(long)]
    focal_length: f64,

    /// Distance from the lens to the subject in mm
    #[arg(long)]
    distance: f64,

    /// Subject length along the travel axis in mm
    #[arg(long)]
    length: f64,

    /// Travel towards negative coordinates
    #[arg(long)]
    reverse: bool,

    /// Circle of confusion in mm (overrides the configured value)
    #[arg(long)]
    coc: Option<f64>,
}

impl PlanArgs {
    fn to_plan(self, config: &Config) -> ShotPlan {
        let direction = if self.reverse {
            Direction::Negative
        } else {
            Direction::Positive
        };
        ShotPlan::new(
            self.focal_length,
            self.f_stop,
            self.distance,
            self.length,
            direction,
        )
        .with_circle_of_confusion(
            self.coc
                .unwrap_or(config.acquisition.circle_of_confusion_mm),
        )
    }
}

struct ShootOptions {
    archive: Option<PathBuf>,
    delete: bool,
    report: Option<PathBuf>,
    return_to_origin: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;
    tracing::debug!("stackshot {} (built {})", VERSION, BUILD_DATE);

    let config = Config::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let journal = DeviceJournal::new();

    match cli.command {
        Commands::Plan(args) => {
            let plan = args.to_plan(&config);
            plan.validate()?;
            println!("{}", plan);
            println!("{}", plan.summary(config.acquisition.seconds_per_shot));
            println!("Hyperfocal distance = {:.3}mm", plan.hyperfocal_distance());
        }
        Commands::Shoot {
            plan,
            archive,
            delete,
            report,
            return_to_origin,
        } => {
            let plan = plan.to_plan(&config);
            plan.validate()?;
            println!("{}", plan.summary(config.acquisition.seconds_per_shot));

            let options = ShootOptions {
                archive,
                delete,
                report,
                return_to_origin,
            };
            if cli.simulate {
                let stage = devices::simulated_stage(&journal);
                let camera = devices::simulated_camera(&journal, &config.camera);
                shoot(stage, camera, &config, &plan, &options)?;
            } else {
                let camera = devices::open_camera(&config.camera)?;
                let stage = devices::open_stage(&config.stage)?;
                shoot(stage, camera, &config, &plan, &options)?;
            }
        }
        Commands::Position => {
            let position = if cli.simulate {
                devices::simulated_stage(&journal).query_position()?
            } else {
                devices::open_stage(&config.stage)?.query_position()?
            };
            println!("{}", position);
        }
        Commands::CameraStatus => {
            if cli.simulate {
                camera_status(devices::simulated_camera(&journal, &config.camera))?;
            } else {
                camera_status(devices::open_camera(&config.camera)?)?;
            }
        }
    }

    Ok(())
}

fn shoot<P: StagePort, T: CameraTransport>(
    stage: StageLink<P>,
    camera: CameraLink<T>,
    config: &Config,
    plan: &ShotPlan,
    options: &ShootOptions,
) -> Result<()> {
    let mut orchestrator =
        AcquisitionOrchestrator::new(stage, camera, SequenceOptions::from(config));

    let result = match orchestrator.run(plan) {
        Ok(result) => result,
        Err(abort) => {
            eprintln!("{}", abort);
            eprintln!("{}", abort.resume_hint());
            bail!("Sequence did not complete");
        }
    };

    println!("{}", result);
    if let Some(pos) = result.final_position {
        println!("Stage left at {}", pos);
    }

    if let Some(path) = &options.report {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    if let Some(dir) = &options.archive {
        let archive = ImageArchive::new(dir).delete_after_save(options.delete);
        let report = archive.store(orchestrator.camera_mut(), &result.captured_files)?;
        println!(
            "Archived {}/{} file(s) to {}",
            report.saved().len(),
            result.captured_files.len(),
            archive.directory().display()
        );
        for resource in report.failed() {
            eprintln!("Not archived: {}", resource);
        }
    }

    if options.return_to_origin {
        orchestrator.reset_to_origin()?;
    }
    orchestrator.stage_mut().beep()?;

    Ok(())
}

fn camera_status<T: CameraTransport>(mut camera: CameraLink<T>) -> Result<()> {
    let battery = camera.battery_status()?;
    println!(
        "Battery: {} ({})",
        battery.level.as_deref().unwrap_or("unknown"),
        battery.quality.as_deref().unwrap_or("unknown")
    );

    let directory = camera.current_directory()?;
    match directory.path.as_deref() {
        Some(path) if directory.is_mounted() => {
            let count = camera.directory_entry_count(path)?;
            println!(
                "Capture folder: {} ({} file(s))",
                path,
                count.contentsnumber.unwrap_or_default()
            );
        }
        _ => println!("No storage card mounted"),
    }

    Ok(())
}
