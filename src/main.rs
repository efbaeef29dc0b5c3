use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use fingerprint_registration::batch::{run_batch, BatchManifest};
use fingerprint_registration::config::{Config, ConfigFormat};
use fingerprint_registration::logging::{init_logging, LoggingPreset};
use fingerprint_registration::raster::{NativeRaster, RasterOps};
use fingerprint_registration::report::{self, OutputOptions};
use fingerprint_registration::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fpreg")]
#[command(about = "Rigid two-point registration and overlap cropping of fingerprint image pairs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raster backend for thresholding, morphology, warping and encoding
    #[arg(long, value_enum, default_value_t = Backend::Native, global = true)]
    backend: Backend,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// image + imageproc
    Native,
    /// OpenCV bindings, requires the `opencv` feature
    Opencv,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a moving image onto a fixed image and write all renderings
    Register {
        /// Image to be transformed
        #[arg(short, long)]
        moving: PathBuf,

        /// Reference image
        #[arg(short, long)]
        fixed: PathBuf,

        /// moving1.x,moving1.y,fixed1.x,fixed1.y,moving2.x,moving2.y,fixed2.x,fixed2.y
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true, required = true)]
        points: Vec<i32>,

        /// Output directory for images and metadata
        #[arg(short, long, default_value = "results/registration")]
        output_dir: PathBuf,

        /// Also write metadata.xml
        #[arg(long)]
        xml: bool,

        /// Also write metadata.json
        #[arg(long)]
        json: bool,
    },

    /// Print segment geometry for a set of control points, without images
    Geometry {
        /// Same ordering as for `register`
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true, required = true)]
        points: Vec<i32>,
    },

    /// Register every pair listed in a TOML manifest, in parallel
    Batch {
        /// Manifest with one [[pair]] table per registration
        #[arg(short, long)]
        manifest: PathBuf,

        /// Each pair writes to <output-dir>/<name>
        #[arg(short, long, default_value = "results/batch")]
        output_dir: PathBuf,

        #[arg(long)]
        xml: bool,

        #[arg(long)]
        json: bool,
    },

    /// Write the default configuration to a file
    InitConfig {
        #[arg(short, long, default_value = "registration.toml")]
        output: PathBuf,

        /// Logging section to start from
        #[arg(long, value_enum, default_value_t = LoggingPreset::Default)]
        logging: LoggingPreset,
    },

    /// Print the library version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let _logging = init_logging(&config.logging.clone().with_verbosity(cli.verbose))
        .context("failed to initialize logging")?;

    match cli.command {
        Commands::Register {
            moving,
            fixed,
            points,
            output_dir,
            xml,
            json,
        } => {
            let raster = make_raster(cli.backend, &config)?;
            handle_register(
                &moving,
                &fixed,
                &points,
                &output_dir,
                OutputOptions { json, xml },
                &config,
                raster,
            )?;
        }
        Commands::Geometry { points } => {
            handle_geometry(&points)?;
        }
        Commands::Batch {
            manifest,
            output_dir,
            xml,
            json,
        } => {
            let raster = make_raster(cli.backend, &config)?;
            handle_batch(&manifest, &output_dir, OutputOptions { json, xml }, &config, raster)?;
        }
        Commands::InitConfig { output, logging } => {
            let format = match output.extension().and_then(|e| e.to_str()) {
                Some("json") => ConfigFormat::Json,
                _ => ConfigFormat::Toml,
            };
            let generated = Config {
                logging: logging.config(),
                ..Config::default()
            };
            generated
                .save_to_file(&output, format)
                .map_err(|e| anyhow::anyhow!("failed to write {}: {}", output.display(), e))?;
            println!("Default configuration written to {}", output.display());
        }
        Commands::Version => {
            println!("fpreg {}", version());
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load_from_file(path)
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path.display(), e))?;
    if let Err(errors) = config.validate() {
        bail!("invalid configuration {}:\n  - {}", path.display(), errors.join("\n  - "));
    }
    Ok(config)
}

fn make_raster(backend: Backend, config: &Config) -> anyhow::Result<Arc<dyn RasterOps>> {
    let compression = config.output.png_compression;
    match backend {
        Backend::Native => Ok(Arc::new(NativeRaster::new().with_compression(compression))),
        Backend::Opencv => opencv_raster(compression),
    }
}

#[cfg(feature = "opencv")]
fn opencv_raster(compression: raster::PngCompression) -> anyhow::Result<Arc<dyn RasterOps>> {
    Ok(Arc::new(
        raster::OpenCvRaster::new().with_compression(compression),
    ))
}

#[cfg(not(feature = "opencv"))]
fn opencv_raster(_compression: raster::PngCompression) -> anyhow::Result<Arc<dyn RasterOps>> {
    bail!("fpreg was built without the `opencv` feature")
}

fn handle_register(
    moving: &Path,
    fixed: &Path,
    points: &[i32],
    output_dir: &Path,
    options: OutputOptions,
    config: &Config,
    raster: Arc<dyn RasterOps>,
) -> anyhow::Result<()> {
    let input = RegistrationInput::from_paths(moving, fixed, points)
        .context("failed to prepare registration input")?;
    println!("Control points:\n{}", input.control_points);

    let mut registrator = Registrator::new(input, config).with_raster(raster);
    print!(
        "{}",
        OverlapEngine::new(config.overlap.clone()).structuring_element_params()
    );
    if let Err(e) = registrator.perform_registration().map(|_| ()) {
        // Padded images help to see why the pair did not overlap
        if registrator.padded_fixed_image().is_ok() {
            let diagnostics = output_dir.join("failed");
            io::write_buffer(
                &diagnostics.join("padded_registered_moving.png"),
                &registrator.padded_registered_moving_image()?,
            )?;
            io::write_buffer(
                &diagnostics.join("padded_fixed.png"),
                &registrator.padded_fixed_image()?,
            )?;
            eprintln!("Padded images written to {}", diagnostics.display());
        }
        return Err(e).context("registration failed");
    }

    let written = report::write_outputs(&registrator, output_dir, options)?;
    print!("{}", report::text_summary(registrator.metadata()?));
    println!("{}", registrator.overlap()?.summary());
    println!("Wrote {} files to {}", written.len(), output_dir.display());
    Ok(())
}

fn handle_geometry(points: &[i32]) -> anyhow::Result<()> {
    let control_points = ControlPoints::from_coordinates(points)?;
    let moving = control_points.moving_segment()?;
    let fixed = control_points.fixed_segment()?;
    let scale = ScaleFactor::between(&moving, &fixed);

    println!("Control points:\n{control_points}");
    print!("{}", moving.summary("moving"));
    print!("{}", fixed.summary("fixed"));
    println!(
        "angle difference (fixed - moving): {:.6} degrees",
        fixed.angle_degrees() - moving.angle_degrees()
    );
    println!("scale factor: {scale}");
    println!(
        "pair distances before registration: #1 {:.6}, #2 {:.6}",
        control_points.unconstrained.distance(),
        control_points.constrained.distance()
    );
    Ok(())
}

fn handle_batch(
    manifest_path: &Path,
    output_dir: &Path,
    options: OutputOptions,
    config: &Config,
    raster: Arc<dyn RasterOps>,
) -> anyhow::Result<()> {
    let manifest = BatchManifest::load(manifest_path)?;
    println!(
        "Registering {} pairs with {} threads...",
        manifest.pairs.len(),
        rayon::current_num_threads()
    );

    let outcomes = run_batch(&manifest, output_dir, config, options, raster);
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(files) => println!("  ok    {} ({} files)", outcome.name, files.len()),
            Err(e) => {
                failed += 1;
                println!("  FAIL  {}: {}", outcome.name, e);
            }
        }
    }
    println!(
        "{} of {} pairs registered",
        outcomes.len() - failed,
        outcomes.len()
    );

    if failed == outcomes.len() && !outcomes.is_empty() {
        bail!("every pair in {} failed", manifest_path.display());
    }
    Ok(())
}
