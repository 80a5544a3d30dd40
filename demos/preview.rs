use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use theta_live_view::{DEFAULT_HOST, Error, Frame, LiveViewSource, LiveViewStream, StreamConfig};
use tracing_subscriber::EnvFilter;

/// Print live preview frames from a THETA camera.
#[derive(Parser)]
struct Args {
    /// Camera address, optionally with a port.
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    /// Session id from `camera.startSession` (API 2.0 cameras only).
    #[arg(long)]
    session_id: Option<String>,
    /// Stop after this many frames.
    #[arg(long, default_value_t = 60)]
    frames: u64,
    /// Write the last frame received to this file.
    #[arg(long)]
    save: Option<std::path::PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let mut stream = LiveViewStream::new(StreamConfig::default());
    let frame_count = Arc::new(AtomicU64::new(0));
    let count_clone = frame_count.clone();
    let (tx, rx) = mpsc::channel::<Result<Frame, Error>>();

    stream.set_delegate(Some(Box::new(move |result| {
        if let Ok(frame) = &result {
            let n = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            println!(
                "Frame {}: #{} {}x{} ts={:.3}s bytes={}",
                n,
                frame.sequence(),
                frame.size().width,
                frame.size().height,
                frame.timestamp().as_secs_f64(),
                frame.jpeg().len(),
            );
        }
        let _ = tx.send(result);
    })));

    println!("Connecting to {}", args.host);
    stream.start(&args.host, args.session_id.as_deref())?;

    let mut last = None;
    while frame_count.load(Ordering::Relaxed) < args.frames {
        match rx.recv_timeout(Duration::from_secs(30)) {
            Ok(Ok(frame)) => last = Some(frame),
            Ok(Err(e)) if e.is_terminal() => return Err(e.into()),
            Ok(Err(e)) => eprintln!("skipping frame: {e}"),
            Err(_) => return Err("no frames for 30s".into()),
        }
    }

    stream.cancel()?;
    println!(
        "\nDone. Received {} frames.",
        frame_count.load(Ordering::Relaxed)
    );

    if let (Some(path), Some(frame)) = (args.save, last) {
        std::fs::write(&path, frame.jpeg())?;
        println!("Saved last frame to {}", path.display());
    }
    Ok(())
}
