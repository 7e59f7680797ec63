//! neuroscan CLI for classification and explanation of brain-MRI images.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use image::imageops::FilterType;
use ndarray::Array3;

use neuroscan_core::{ClassList, MriTensor, Normalizer, IMG_SIZE};
use neuroscan_explain::{Method, TargetSpec, XaiEngine};
use neuroscan_models::{checkpoint, TumorClassifier, TumorNetConfig};

/// Backend type for inference and gradient computation.
type EngineBackend = Autodiff<NdArray>;

#[derive(Parser)]
#[command(name = "neuroscan")]
#[command(author, version)]
#[command(about = "Brain tumor MRI classification with visual explanations")]
#[command(long_about = "neuroscan-rs: classify brain MRI slices and render attribution overlays.

EXAMPLES:
  # Show configured classes and available explanation backends
  neuroscan info

  # Classify an image
  neuroscan classify --input scan.png --checkpoint tumor_model.mpk

  # Render a Grad-CAM overlay for the predicted class
  neuroscan explain --input scan.png --checkpoint tumor_model.mpk

  # Render a LIME overlay for an explicit class
  neuroscan explain --input scan.png --method lime --target glioma

AVAILABLE METHODS:
  gradcam (cam)      - gradient class-activation map [default]
  shap (shapley)     - Shapley-value approximation
  lime (surrogate)   - local perturbation-based surrogate")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show class list and explanation-backend capabilities
    Info {
        /// JSON file with the class label list
        #[arg(long, value_name = "FILE")]
        classes: Option<PathBuf>,
    },
    /// Classify a single image
    Classify {
        /// Input image (PNG or JPEG)
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Model checkpoint (*.mpk); untrained weights are used if absent
        #[arg(long, value_name = "FILE")]
        checkpoint: Option<PathBuf>,

        /// JSON file with the class label list
        #[arg(long, value_name = "FILE")]
        classes: Option<PathBuf>,
    },
    /// Compute and render an attribution overlay
    Explain {
        /// Input image (PNG or JPEG)
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Explanation method: gradcam, shap, lime
        #[arg(long, default_value = "gradcam", value_name = "METHOD")]
        method: String,

        /// Target class, by name or index; defaults to the prediction
        #[arg(long, value_name = "CLASS")]
        target: Option<String>,

        /// Output image path
        #[arg(long, default_value = "explanation.png", value_name = "FILE")]
        output: PathBuf,

        /// Model checkpoint (*.mpk); untrained weights are used if absent
        #[arg(long, value_name = "FILE")]
        checkpoint: Option<PathBuf>,

        /// JSON file with the class label list
        #[arg(long, value_name = "FILE")]
        classes: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Info { classes } => info(classes),
        Commands::Classify {
            input,
            checkpoint,
            classes,
        } => classify(input, checkpoint, classes),
        Commands::Explain {
            input,
            method,
            target,
            output,
            checkpoint,
            classes,
        } => explain(input, method, target, output, checkpoint, classes),
    }
}

fn load_classes(path: Option<PathBuf>) -> Result<ClassList> {
    match path {
        Some(path) => ClassList::from_json_file(&path)
            .with_context(|| format!("failed to load class list from {}", path.display())),
        None => Ok(ClassList::brain_tumor()),
    }
}

fn build_engine(
    checkpoint_path: Option<PathBuf>,
    classes: ClassList,
) -> Result<XaiEngine<EngineBackend>> {
    let device = Default::default();
    let config = TumorNetConfig::new(classes.len());
    let mut model = config.init::<EngineBackend>(&device);

    match checkpoint_path {
        Some(path) => {
            model = checkpoint::load_weights(model, &path, &device)
                .with_context(|| format!("failed to load checkpoint {}", path.display()))?;
            tracing::info!(path = %path.display(), "checkpoint loaded");
        }
        None => {
            tracing::warn!("no checkpoint given; using untrained weights");
        }
    }

    let boxed: Box<dyn TumorClassifier<EngineBackend>> = Box::new(model);
    Ok(XaiEngine::new(Some(boxed), classes))
}

/// Decode an image file, resize it to the classifier's input resolution,
/// and standardize it into a model-ready tensor.
fn load_image_tensor(path: &PathBuf) -> Result<MriTensor<EngineBackend>> {
    let img = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .to_rgb8();
    let img = image::imageops::resize(&img, IMG_SIZE as u32, IMG_SIZE as u32, FilterType::Triangle);

    let mut pixels = Array3::<f32>::zeros((3, IMG_SIZE, IMG_SIZE));
    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        pixels[[0, y as usize, x as usize]] = f32::from(r) / 255.0;
        pixels[[1, y as usize, x as usize]] = f32::from(g) / 255.0;
        pixels[[2, y as usize, x as usize]] = f32::from(b) / 255.0;
    }

    let normalized = Normalizer::default().normalize(&pixels);
    let device = Default::default();
    MriTensor::from_chw(&normalized, &device).context("failed to build input tensor")
}

fn parse_target(target: Option<String>) -> TargetSpec {
    match target {
        None => TargetSpec::Predicted,
        Some(raw) => match raw.parse::<usize>() {
            Ok(index) => TargetSpec::Index(index),
            Err(_) => TargetSpec::Label(raw),
        },
    }
}

fn info(classes: Option<PathBuf>) -> Result<()> {
    let classes = load_classes(classes)?;
    let engine: XaiEngine<EngineBackend> = XaiEngine::new(None, classes);

    println!("Classes:");
    for (i, label) in engine.classes().iter().enumerate() {
        println!("  {i}: {label}");
    }

    let caps = engine.capabilities();
    println!("\nExplanation backends:");
    println!("  gradcam  available: {}", caps.cam);
    println!("  shap     available: {}", caps.shapley);
    println!("  lime     available: {}", caps.surrogate);

    let registry = neuroscan_models::registry::default_registry::<EngineBackend>();
    let mut models = registry.list();
    models.sort_unstable();
    println!("\nRegistered models:");
    for name in models {
        println!("  {name}");
    }

    Ok(())
}

fn classify(input: PathBuf, checkpoint: Option<PathBuf>, classes: Option<PathBuf>) -> Result<()> {
    let classes = load_classes(classes)?;
    let engine = build_engine(checkpoint, classes)?;
    let tensor = load_image_tensor(&input)?;

    let prediction = engine.predict(&tensor)?;

    println!(
        "Predicted: {} (confidence {:.3})",
        prediction.label, prediction.confidence
    );
    println!("Probabilities:");
    for (label, prob) in &prediction.probabilities {
        println!("  {label:<12} {prob:.4}");
    }

    Ok(())
}

fn explain(
    input: PathBuf,
    method: String,
    target: Option<String>,
    output: PathBuf,
    checkpoint: Option<PathBuf>,
    classes: Option<PathBuf>,
) -> Result<()> {
    let classes = load_classes(classes)?;
    let engine = build_engine(checkpoint, classes)?;
    let tensor = load_image_tensor(&input)?;

    let method = Method::parse(&method)?;
    let target = parse_target(target);

    let result = engine.explain(&tensor, method, &target)?;

    result
        .rendered
        .save(&output)
        .with_context(|| format!("failed to save overlay to {}", output.display()))?;

    println!(
        "Method {} explained class '{}' (index {})",
        result.method.as_str(),
        result.class_label,
        result.target_class
    );
    if let Some(scale) = result.rendered.scale {
        println!("Color scale max magnitude: {:.6}", scale.max_magnitude);
    }
    if let Some(caption) = &result.rendered.caption {
        println!("Note: {caption}");
    }
    if result.approximate {
        println!("Note: gradient-based approximation, not true Shapley values");
    }
    println!("Saved overlay to {}", output.display());

    Ok(())
}
