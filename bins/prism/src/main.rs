//! prism: CLI front end for the Prism image proxy core.

use anyhow::Context;
use clap::{Parser, Subcommand};
use prism_geometry::CropPoint;
use prism_imaging::{detect_format, CompressionOptions, Processor};
use prism_storage::{CircuitBreakerConfig, GatewayBuilder};
use prism_telemetry::RegistrySink;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "prism")]
#[command(about = "Image transforms and object-store fetches")]
#[command(version)]
struct Cli {
    /// Print collected metrics as JSON on exit
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect image format from file
    Detect {
        /// Path to image file
        path: PathBuf,
    },
    /// Crop or resize an image, optionally converting format
    Transform {
        /// Path to input image
        input: PathBuf,
        /// Path to write the transformed image
        output: PathBuf,
        /// Target width in pixels (0 derives from height)
        #[arg(long, default_value_t = 0)]
        width: u32,
        /// Target height in pixels (0 derives from width)
        #[arg(long, default_value_t = 0)]
        height: u32,
        /// Crop to the target instead of stretching, anchored here
        /// (top, bottom, left, right, topleft, topright, bottomleft,
        /// bottomright, center)
        #[arg(long)]
        crop: Option<CropPoint>,
        /// Convert to grayscale
        #[arg(long)]
        grayscale: bool,
        /// Output format (jpeg, png, webp, gif); source format when omitted
        #[arg(long, default_value = "")]
        format: String,
        /// JPEG quality, 1-100
        #[arg(long, default_value_t = 85)]
        quality: u8,
    },
    /// Composite a watermark over a base image
    Watermark {
        /// Path to base image
        input: PathBuf,
        /// Path to write the watermarked image
        output: PathBuf,
        /// Path to the overlay image
        #[arg(long)]
        overlay: PathBuf,
        /// Overlay opacity, 0-255
        #[arg(long, default_value_t = 128)]
        opacity: u8,
    },
    /// Fetch an object from the configured backend
    Fetch {
        /// Object key
        key: String,
        /// Path to write the fetched bytes
        output: PathBuf,
        /// Bucket name
        #[arg(long, env = "PRISM_BUCKET")]
        bucket: String,
        /// Bucket region, used to derive the endpoint
        #[arg(long, env = "PRISM_REGION")]
        region: Option<String>,
        /// Explicit backend endpoint, overriding the region
        #[arg(long, env = "PRISM_ENDPOINT")]
        endpoint: Option<String>,
        /// Access key sent as a request header
        #[arg(long, env = "PRISM_ACCESS_KEY")]
        access_key: Option<String>,
        /// Access secret sent as a request header
        #[arg(long, env = "PRISM_SECRET_KEY")]
        secret_key: Option<String>,
        /// Backend timeout in milliseconds
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    prism_telemetry::init()?;
    let cli = Cli::parse();

    let sink = Arc::new(RegistrySink::new());

    match cli.command {
        Commands::Detect { path } => {
            let data = std::fs::read(&path).with_context(|| format!("reading {path:?}"))?;
            let format = detect_format(&data)?;
            println!("Format: {}", format.name());
            println!("MIME: {}", format.mime_type());
        }

        Commands::Transform {
            input,
            output,
            width,
            height,
            crop,
            grayscale,
            format,
            quality,
        } => {
            let data = std::fs::read(&input).with_context(|| format!("reading {input:?}"))?;
            let processor = Processor::with_compression(CompressionOptions {
                jpeg_quality: quality,
                ..CompressionOptions::default()
            })
            .with_sink(sink.clone());

            let (mut img, source) = processor.decode(&data)?;
            if let Some(point) = crop {
                img = processor.crop(&img, width, height, point)?;
            } else if width > 0 || height > 0 {
                img = processor.resize(img, width, height);
            }
            if grayscale {
                img = processor.grayscale(&img);
            }

            let encoded = processor.encode(&img, &format, source)?;
            std::fs::write(&output, &encoded).with_context(|| format!("writing {output:?}"))?;
            println!(
                "Wrote {} ({}x{}, {} bytes)",
                output.display(),
                img.width(),
                img.height(),
                encoded.len()
            );
        }

        Commands::Watermark {
            input,
            output,
            overlay,
            opacity,
        } => {
            let base = std::fs::read(&input).with_context(|| format!("reading {input:?}"))?;
            let overlay =
                std::fs::read(&overlay).with_context(|| format!("reading {overlay:?}"))?;

            let processor = Processor::new().with_sink(sink.clone());
            let encoded = processor.watermark(&base, &overlay, opacity)?;
            std::fs::write(&output, &encoded).with_context(|| format!("writing {output:?}"))?;
            println!("Wrote {} ({} bytes)", output.display(), encoded.len());
        }

        Commands::Fetch {
            key,
            output,
            bucket,
            region,
            endpoint,
            access_key,
            secret_key,
            timeout_ms,
        } => {
            let mut builder = GatewayBuilder::new()
                .with_bucket_name(bucket)
                .with_circuit_breaker(CircuitBreakerConfig {
                    timeout: Duration::from_millis(timeout_ms),
                    ..CircuitBreakerConfig::default()
                });
            if let Some(region) = region {
                builder = builder.with_bucket_region(region);
            }
            if let Some(endpoint) = endpoint {
                builder = builder.with_endpoint(endpoint);
            }
            if let Some(access_key) = access_key {
                builder = builder.with_access_key(access_key);
            }
            if let Some(secret_key) = secret_key {
                builder = builder.with_secret_key(secret_key);
            }

            let gateway = builder.build()?.with_sink(sink.clone());
            let object = gateway.fetch(&key).await?;
            std::fs::write(&output, &object.data)
                .with_context(|| format!("writing {output:?}"))?;
            println!(
                "Wrote {} ({} bytes, {})",
                output.display(),
                object.data.len(),
                object.content_type.as_deref().unwrap_or("unknown type")
            );
        }
    }

    if cli.metrics {
        println!("{}", serde_json::to_string_pretty(&sink.export_json())?);
    }

    Ok(())
}
