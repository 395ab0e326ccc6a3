//! End-to-end classification flow for the label-image binary.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use nr_device::EmulatedDevice;
use nr_interp::{Interpreter, InterpreterOptions, DEFAULT_TIMEOUT};
use nr_tensor::TensorView;

use crate::classify::top_k;
use crate::cli::Args;
use crate::imageprep;
use crate::labels::load_labels;

/// Classify `args.image` with `args.model_file`, writing the report to `out`.
///
/// Prints the model's input and output descriptors, then one line per
/// top-k classification as `score: label`, best first.
pub fn run(args: &Args, out: &mut impl Write) -> Result<()> {
    let labels = load_labels(&args.label_file)?;

    let device = Arc::new(EmulatedDevice::with_seed(args.seed));
    let timeout = if args.timeout_nanos > 0 {
        Duration::from_nanos(args.timeout_nanos as u64)
    } else {
        DEFAULT_TIMEOUT
    };
    let options = InterpreterOptions {
        timeout,
        ..InterpreterOptions::default()
    };
    let mut interp = Interpreter::with_options(device, &args.model_file, options)
        .with_context(|| format!("failed to load {}", args.model_file.display()))?;
    if let Ok(caps) = interp.device_capabilities() {
        info!(%caps, "device ready");
    }

    writeln!(out, "Input details:")?;
    for desc in interp.input_info() {
        writeln!(out, "{desc}")?;
    }
    writeln!(out, "Output details:")?;
    for desc in interp.output_info() {
        writeln!(out, "{desc}")?;
    }

    let input = interp
        .input_info()
        .first()
        .cloned()
        .context("model has no input tensors")?;
    let data = imageprep::prepare(&args.image, &input)?;
    let view = TensorView::new(input.elem_type, input.shape.clone(), input.quant, &data)?;
    interp.set_input(0, &view)?;
    interp.invoke()?;

    // Scores come out dequantized through the output descriptor's scale
    // and zero point.
    let scores = interp.output(0)?.to_f32();
    for c in top_k(&scores, args.top_k) {
        let label = labels
            .get(c.class)
            .map(String::as_str)
            .unwrap_or("<unknown>");
        writeln!(out, "{:08.6}: {}", c.score, label)?;
    }
    Ok(())
}
