use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use bgone::{
    default_threshold, detect_background, format_hex_color, parse_foreground_spec,
    parse_hex_color, process, Color, ForegroundColorSpec, Options,
};

#[derive(Parser, Debug)]
#[command(
    name = "bgone",
    about = "Ultra-fast CLI tool for removing solid background colors from images",
    version,
    author
)]
struct Args {
    /// Input image path
    input: PathBuf,

    /// Output image path (defaults to <input stem>-bgone.png next to the input)
    output: Option<PathBuf>,

    /// Background color in hex format (e.g., fff, ffffff, #ffffff)
    /// If not specified, the background color will be auto-detected
    #[arg(short = 'b', long = "bg", value_name = "COLOR")]
    background_color: Option<String>,

    /// Foreground colors in hex format (e.g., f00, ff0000, #ff0000) or 'auto' for unknown
    /// Multiple colors can be specified for color unmixing
    /// Use 'auto' to let the tool deduce unknown colors (e.g., --fg ff0000 auto auto)
    #[arg(short = 'f', long = "fg", num_args = 1.., value_name = "COLOR")]
    foreground_colors: Option<Vec<String>>,

    /// Only express pixels through the declared/deduced foreground colors
    #[arg(short = 's', long)]
    strict: bool,

    /// Color closeness threshold between 0 and 1
    #[arg(short = 't', long, value_name = "FLOAT")]
    threshold: Option<f32>,

    /// Crop fully transparent borders from the output
    #[arg(long)]
    trim: bool,

    /// Print the detected background color and exit
    #[arg(long)]
    detect: bool,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            bail!("threshold must be between 0 and 1 (got {threshold})");
        }
    }
    let threshold = args.threshold.unwrap_or_else(default_threshold);

    let input = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read input image: {}", args.input.display()))?;

    if args.detect {
        let detected = detect_background(&input)?;
        println!("{}", format_hex_color(detected));
        return Ok(());
    }

    let background = determine_background_color(&args, &input)?;

    let foreground_specs = args
        .foreground_colors
        .as_deref()
        .map(parse_foreground_specs)
        .transpose()?;
    let foreground = match foreground_specs {
        Some(specs)
            if specs
                .iter()
                .any(|spec| matches!(spec, ForegroundColorSpec::Auto)) =>
        {
            Some(deduce_and_report(&input, &specs, background, threshold)?)
        }
        other => other,
    };

    let options = Options {
        input,
        background: Some(background),
        foreground,
        strict: args.strict,
        threshold: Some(threshold),
        trim: args.trim,
    };

    let progress = spinner("Removing background...");
    let png = process(&options)?;
    progress.finish_and_clear();

    let output_path = match args.output {
        Some(path) => path,
        None => default_output_path(&args.input),
    };
    std::fs::write(&output_path, png)
        .with_context(|| format!("Failed to write output image: {}", output_path.display()))?;
    println!("✓ Saved to {}", output_path.display());

    Ok(())
}

/// Parse and validate foreground color specifications from command line arguments
fn parse_foreground_specs(color_strings: &[String]) -> Result<Vec<ForegroundColorSpec>> {
    color_strings
        .iter()
        .enumerate()
        .map(|(i, spec_str)| {
            parse_foreground_spec(spec_str).with_context(|| {
                format!(
                    "Invalid foreground color specification #{}: {}",
                    i + 1,
                    spec_str
                )
            })
        })
        .collect()
}

/// Determine background color either from user input or auto-detection
fn determine_background_color(args: &Args, input: &[u8]) -> Result<Color> {
    if let Some(bg_str) = &args.background_color {
        parse_hex_color(bg_str).context("Invalid background color")
    } else {
        let progress = spinner("Auto-detecting background color...");
        let detected = detect_background(input)?;
        progress.finish_and_clear();
        println!(
            "✓ Auto-detected background color: {}",
            format_hex_color(detected)
        );
        Ok(detected)
    }
}

/// Resolve 'auto' foreground slots and report what was deduced
fn deduce_and_report(
    input: &[u8],
    specs: &[ForegroundColorSpec],
    background: Color,
    threshold: f32,
) -> Result<Vec<ForegroundColorSpec>> {
    let progress = spinner("Deducing unknown colors...");
    let image = image::load_from_memory(input)
        .context("Failed to decode input image")?
        .to_rgba8();
    let resolved = bgone::deduce::deduce_unknown_colors(&image, specs, background, threshold)?;
    progress.finish_and_clear();

    let deduced: Vec<String> = specs
        .iter()
        .zip(&resolved)
        .filter(|(spec, _)| matches!(spec, ForegroundColorSpec::Auto))
        .map(|(_, color)| format_hex_color(*color))
        .collect();
    let plural = if deduced.len() == 1 { "color" } else { "colors" };
    println!(
        "✓ Deduced {} unknown {}: {}",
        deduced.len(),
        plural,
        deduced.join(" ")
    );

    Ok(resolved.into_iter().map(ForegroundColorSpec::Known).collect())
}

/// Pick `<stem>-bgone.png` next to the input, avoiding existing files
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("output");
    let dir = input.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut candidate = dir.join(format!("{stem}-bgone.png"));
    let mut counter = 1u32;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}-bgone-{counter}.png"));
        counter += 1;
    }
    candidate
}

/// Create a steadily ticking spinner with consistent styling
fn spinner(message: &'static str) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("Failed to create progress bar style"),
    );
    progress.set_message(message);
    progress.enable_steady_tick(std::time::Duration::from_millis(100));
    progress
}
