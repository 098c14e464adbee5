// ============================================================================
// CVisionTool CLI - headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   cvisiontool -i coins.png --action hough_circle --param method=4 --param dp=1.5 \
//       --param min_dist=20 --param param1=300 --param param2=0.9 \
//       --param min_radius=0 --param max_radius=0 -o circles.png
//   cvisiontool -i shots/*.jpg --recipe cleanup.json --output-dir out/
//   cvisiontool -i mask.png --action erosion --param shape=2 --param anchor=3
//
// No GUI is opened in CLI mode. Every file goes through the same
// ActionProcessor the GUI uses.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use serde_json::Value;

use crate::actions::{Action, ActionKind, RawAction};
use crate::error::{ActionError, IoError};
use crate::io::{load_image, load_recipe_actions, save_image};
use crate::processor::ActionProcessor;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// CVisionTool headless image processor.
#[derive(Parser, Debug)]
#[command(
    name = "cvisiontool",
    about = "CVisionTool headless batch image processor",
    long_about = "Apply morphology, inRange thresholding and Hough circle detection to\n\
                  image files without opening the GUI. Actions come either from a\n\
                  recipe file (exported from the GUI) or from --action/--param.\n\n\
                  Example:\n  \
                  cvisiontool -i photo.png --action dilation --param shape=0 --param anchor=2 -o out.png\n  \
                  cvisiontool -i *.jpg --recipe steps.json --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Recipe file: JSON array of {"action_type", "params"} objects, applied in order.
    #[arg(short, long, value_name = "RECIPE.json", conflicts_with = "action")]
    pub recipe: Option<PathBuf>,

    /// Single action to apply, by tag (erosion, dilation, morphological_gradient,
    /// morphological_opening, morphological_closing, in_range, hough_circle).
    #[arg(short, long, value_name = "TAG")]
    pub action: Option<String>,

    /// Parameter for --action as key=value. Values are read as JSON when they
    /// parse (numbers, arrays), otherwise as plain strings.
    #[arg(short, long = "param", value_name = "KEY=VALUE", requires = "action")]
    pub params: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Files keep their stem.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Extension used with --output-dir or when writing next to the input.
    #[arg(short, long, default_value = "png", value_name = "EXT")]
    pub format: String,

    /// Print per-step and per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Whether the real process arguments ask for CLI mode.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let actions = match build_actions(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let processor = ActionProcessor::new();
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            &args.format,
        ) else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(&processor, input_path, &output_path, &actions, args.verbose) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

pub fn run_one(
    processor: &ActionProcessor,
    input: &Path,
    output: &Path,
    actions: &[Action],
    verbose: bool,
) -> Result<(), IoError> {
    let mut image = load_image(input)?;
    for action in actions {
        let step = Instant::now();
        image = processor.process(action, &image)?;
        if verbose {
            println!(
                "  {} ({:.0}ms)",
                action.describe(),
                step.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
    save_image(&image, output)
}

// ============================================================================
// Helpers
// ============================================================================

/// Actions from `--recipe`, or the single `--action` with its `--param`s.
/// Neither given means a plain load and re-save.
fn build_actions(args: &CliArgs) -> Result<Vec<Action>, IoError> {
    if let Some(path) = &args.recipe {
        return load_recipe_actions(path);
    }
    let Some(tag) = &args.action else {
        return Ok(Vec::new());
    };
    Ok(vec![parse_action(tag, &args.params)?])
}

pub fn parse_action(tag: &str, params: &[String]) -> Result<Action, ActionError> {
    if ActionKind::from_tag(tag).is_none_or(|k| k == ActionKind::ImageLoaded) {
        return Err(ActionError::UnsupportedAction(tag.to_string()));
    }
    let mut raw = RawAction::new(tag);
    for param in params {
        let (key, value) = param
            .split_once('=')
            .ok_or_else(|| ActionError::invalid(param, "expected KEY=VALUE"))?;
        let value = value.trim();
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        raw = raw.with_param(key.trim(), value);
    }
    Action::try_from(&raw)
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
pub fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, single-file input)
/// 2. `--output-dir` (batch directory, filename from input stem)
/// 3. Next to the input with the new extension, suffixed `_out` if that
///    would overwrite the input.
pub fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    ext: &str,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}
