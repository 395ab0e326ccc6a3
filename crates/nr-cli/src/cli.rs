use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "label-image", version, about = "Classify an image on the emulated NPU")]
pub struct Args {
    /// Image to classify
    #[arg(short, long, default_value = "grace_hopper.bmp")]
    pub image: PathBuf,

    /// Compiled model container
    #[arg(
        short,
        long = "model_file",
        default_value = "mobilenet_v1_0.25_224_quant_vela.tflite"
    )]
    pub model_file: PathBuf,

    /// Class labels, one per line
    #[arg(short, long = "label_file", default_value = "labels.txt")]
    pub label_file: PathBuf,

    /// Number of top classifications to print
    #[arg(long = "top_k", default_value_t = 5)]
    pub top_k: usize,

    /// Invoke deadline in nanoseconds; zero or negative selects the default
    #[arg(short, long = "timeout", default_value_t = 60_000_000_000)]
    pub timeout_nanos: i64,

    /// Seed for the emulated device
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}
