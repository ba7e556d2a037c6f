//!   airtrack-rs:   replay decoded aircraft reports through the tracking core
//!
//!  One thread applies samples to the store while another takes snapshots,
//!  the way a live feed and its web clients share the aircraft list.

use std::fs::File;
use std::io::{self, BufReader};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use airtrack::config::Config;
use airtrack::feed::{self, FeedProcessor, FeedSample, FeedStats};
use airtrack::store::AircraftStateStore;
use airtrack::sync::SyncPayload;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_args();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if config.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    info!("airtrack-rs starting...");
    info!("Configuration: {:?}", config);

    let samples = match config.filename.as_deref() {
        Some("-") | None => feed::read_samples(io::stdin().lock()),
        Some(path) => File::open(path)
            .map_err(Into::into)
            .and_then(|f| feed::read_samples(BufReader::new(f))),
    };
    let samples = match samples {
        Ok(samples) => samples,
        Err(e) => {
            error!("Error reading samples: {}", e);
            return Err(e.into());
        }
    };
    info!("Loaded {} samples", samples.len());

    let store = Arc::new(AircraftStateStore::new());
    let (sample_tx, sample_rx): (Sender<FeedSample>, Receiver<FeedSample>) = bounded(1024);
    let running = Arc::new(AtomicBool::new(true));

    let processor_handle = {
        let processor = FeedProcessor::new(
            Arc::clone(&store),
            config.sanity.clone(),
            config.trail.clone(),
            config.short_trail_secs,
        );
        thread::spawn(move || process_samples(sample_rx, processor))
    };

    let reader_handle = {
        let store = Arc::clone(&store);
        let running = Arc::clone(&running);
        let interval = Duration::from_millis(config.snapshot_interval_ms.max(1));
        thread::spawn(move || {
            let mut watermark = 0;
            while running.load(Ordering::Relaxed) {
                let snapshot = store.take_snapshot(Utc::now());
                let payload = SyncPayload::build(&snapshot, watermark);
                info!(
                    "Snapshot: {} aircraft, {} changed since {}, max version {}",
                    snapshot.len(),
                    payload.aircraft.len(),
                    watermark,
                    snapshot.max_data_version
                );
                watermark = snapshot.max_data_version;
                thread::sleep(interval);
            }
        })
    };

    for sample in samples {
        if sample_tx.send(sample).is_err() {
            break;
        }
    }
    drop(sample_tx);

    let stats = join_processor(processor_handle);
    running.store(false, Ordering::Relaxed);
    reader_handle.join().ok();
    let stats = stats?;

    let snapshot = store.take_snapshot(Utc::now());
    info!(
        "Finished: {} aircraft, max version {}",
        snapshot.len(),
        snapshot.max_data_version
    );

    if config.json {
        println!("{}", SyncPayload::build(&snapshot, 0).to_json()?);
    }
    if config.stats {
        println!("Samples processed:  {}", stats.samples);
        println!("Altitudes rejected: {}", stats.rejected_altitudes);
        println!("Positions rejected: {}", stats.rejected_positions);
        println!("Trail resets:       {}", stats.trail_resets);
    }

    Ok(())
}

fn process_samples(rx: Receiver<FeedSample>, mut processor: FeedProcessor) -> FeedStats {
    while let Ok(sample) = rx.recv() {
        processor.process(&sample);
    }
    processor.stats()
}

fn join_processor(handle: JoinHandle<FeedStats>) -> Result<FeedStats, String> {
    handle.join().map_err(|_| {
        error!("Feed processor thread panicked");
        "feed processor thread panicked".to_string()
    })
}
