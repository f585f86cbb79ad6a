//! Loopback demo
//!
//! Pushes a sine tone through the encode pipeline, a lossy in-process link
//! and the decode pipeline, then reports what came out the other end.
//!
//! Usage: `loopback [config.toml] [drop-every-n] [seconds]`

use anyhow::{Context, Result};
use std::thread;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opus_transcode::{
    config::TranscodeConfig,
    transcode::{DecodePipeline, EncodePipeline},
    TranscodeError,
};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) if path != "-" => TranscodeConfig::load(&path)
            .with_context(|| format!("loading config from {path}"))?,
        _ => TranscodeConfig::default(),
    };
    let drop_every: u64 = args
        .next()
        .map(|s| s.parse())
        .transpose()
        .context("invalid drop interval")?
        .unwrap_or(10);
    let seconds: u64 = args
        .next()
        .map(|s| s.parse())
        .transpose()
        .context("invalid duration")?
        .unwrap_or(5);

    tracing::info!(
        "Loopback: {}Hz, {} frames, ring of {}, FEC {}, dropping every {}th unit",
        config.sample_rate,
        config.frame_duration,
        config.max_frames,
        if config.fec { "on" } else { "off" },
        drop_every
    );

    let encoder = EncodePipeline::opus(&config)?;
    let decoder = DecodePipeline::opus(&config)?;
    let frame_size = encoder.frame_size();
    let total_frames = seconds * 1000 / config.frame_duration.as_duration().as_millis().max(1) as u64;
    let sample_rate = config.sample_rate as f32;

    let (frames_out, gaps) = thread::scope(|s| -> Result<(u64, u64)> {
        // Application producing PCM
        let producer = s.spawn(|| -> Result<(), TranscodeError> {
            let mut phase = 0f32;
            for _ in 0..total_frames {
                let mut frame = encoder.alloc();
                for sample in frame.iter_mut() {
                    *sample = (phase.sin() * 8000.0) as i16;
                    phase += 440.0 * 2.0 * std::f32::consts::PI / sample_rate;
                }
                encoder.write_blocking(&frame)?;
            }
            encoder.finalize()
        });

        // Lossy network link
        let link = s.spawn(|| -> Result<u64, TranscodeError> {
            let mut dropped = 0;
            loop {
                match encoder.read_frame() {
                    Ok(unit) if drop_every > 0 && unit.sequence % drop_every == drop_every - 1 => {
                        dropped += 1;
                    }
                    Ok(unit) => match decoder.write_blocking(&unit) {
                        Ok(()) => {}
                        Err(TranscodeError::Corrupted { .. }) => {
                            tracing::warn!("Dropping corrupted unit {}", unit.sequence);
                        }
                        Err(e) => return Err(e),
                    },
                    Err(TranscodeError::EndOfStream) => break,
                    Err(e) => return Err(e),
                }
            }
            decoder.finalize()?;
            Ok(dropped)
        });

        // Application consuming PCM
        let mut frames_out = 0u64;
        let mut gaps = 0u64;
        let mut next = 0u64;
        loop {
            match decoder.read_frame() {
                Ok((frame, position)) => {
                    if position != next {
                        gaps += 1;
                        tracing::debug!(
                            "Gap of {} samples at {}",
                            position.saturating_sub(next),
                            next
                        );
                    }
                    next = position + frame.len() as u64;
                    frames_out += 1;
                }
                Err(TranscodeError::EndOfStream) => break,
                Err(e) => {
                    // Release the producer and link before the scope joins them
                    let _ = encoder.close();
                    let _ = decoder.close();
                    return Err(e.into());
                }
            }
        }

        producer
            .join()
            .map_err(|_| anyhow::anyhow!("producer panicked"))??;
        let dropped = link
            .join()
            .map_err(|_| anyhow::anyhow!("link panicked"))??;
        tracing::info!("Link dropped {} units", dropped);
        Ok((frames_out, gaps))
    })?;

    let enc = encoder.stats();
    let dec = decoder.stats();
    println!("\n=== Loopback Statistics ===");
    println!("  Frames in:          {}", total_frames);
    println!("  Frames out:         {}", frames_out);
    println!("  Encoded bytes:      {} (avg {:.0}/frame)", enc.bytes_produced, enc.bytes_produced as f64 / enc.frames_encoded.max(1) as f64);
    println!("  Recovered via FEC:  {}", dec.frames_recovered);
    println!("  Lost:               {}", dec.frames_lost);
    println!("  Gaps seen by reader: {}", gaps);
    println!("  Max buffered:       enc {} / dec {}", enc.max_buffered, dec.max_buffered);
    println!("  Elapsed:            {:?}", decoder.elapsed());
    println!("  Frame size:         {} samples", frame_size);

    encoder.close()?;
    decoder.close()?;
    Ok(())
}
