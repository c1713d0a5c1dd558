//! End-to-end tests for the engine
//!
//! A synthetic source is fed through the real pipeline and UDP sender to a
//! socket owned by the test, covering:
//! - startup validation and typed startup errors
//! - end-of-input shutdown with queue flush
//! - datagram framing as seen by a receiver

use std::time::Duration;

use firemix_audio::config::{AppConfig, BucketMapSource, OnsetPolicy};
use firemix_audio::engine::backend::{FeederBackend, Pacing, SyntheticSource, SyntheticSpec};
use firemix_audio::engine::{Engine, ShutdownReason};
use firemix_audio::error::StartupError;
use firemix_audio::spectrum::LogSpacedLayout;
use firemix_audio::transport::{decode, Datagram};
use tokio::net::UdpSocket;

const SAMPLE_RATE: u32 = 8_000;
const WINDOW: usize = 256;
const BUCKETS: usize = 24;

fn init_test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build test runtime")
}

fn test_config(port: u16) -> AppConfig {
    let mut config = AppConfig::default();
    config.audio.block_capacity = WINDOW;
    config.analysis.window_size = WINDOW;
    config.analysis.hop_size = WINDOW;
    config.analysis.spectrum_interval_samples = WINDOW as u64;
    config.analysis.onset_policy = OnsetPolicy::Continue;
    config.spectrum.bucket_map = BucketMapSource::LogSpaced(LogSpacedLayout {
        bucket_count: BUCKETS,
        min_hz: 60.0,
        max_hz: 3_500.0,
        ..LogSpacedLayout::default()
    });
    config.network.host = "127.0.0.1".to_string();
    config.network.port = port;
    config.network.queue_capacity = 1024;
    config.telemetry.report_interval_secs = 0;
    config
}

fn synthetic_backend(duration_secs: f32) -> Box<FeederBackend> {
    let spec = SyntheticSpec {
        sample_rate: SAMPLE_RATE,
        duration_secs: Some(duration_secs),
        tone_hz: 330.0,
        click_interval_ms: 200.0,
        noise_amplitude: 0.0,
        ..SyntheticSpec::default()
    };
    Box::new(FeederBackend::new(
        Box::new(SyntheticSource::new(spec)),
        WINDOW,
        Pacing::Unpaced,
    ))
}

async fn drain(socket: &UdpSocket) -> Vec<Datagram> {
    let mut buf = vec![0u8; 4096];
    let mut datagrams = Vec::new();
    while let Ok(Ok(len)) =
        tokio::time::timeout(Duration::from_millis(300), socket.recv(&mut buf)).await
    {
        datagrams.push(decode(&buf[..len]).expect("datagram should decode"));
    }
    datagrams
}

#[test]
fn test_synthetic_session_reaches_receiver() {
    let runtime = init_test_runtime();
    runtime.block_on(async {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let config = test_config(port);

        let engine = Engine::start(&config, synthetic_backend(1.0))
            .await
            .expect("engine should start");
        assert_eq!(engine.destination().port(), port);

        let shutdown = engine.shutdown_signal();
        tokio::time::timeout(Duration::from_secs(5), shutdown.wait())
            .await
            .expect("input should end");
        assert_eq!(shutdown.reason(), Some(ShutdownReason::EndOfInput));

        let totals = engine.stop(ShutdownReason::Requested).await.unwrap();
        let datagrams = drain(&receiver).await;

        // 8000 samples / 256 per window
        assert_eq!(totals.windows, 31);
        assert_eq!(totals.events_dropped, 0);
        assert_eq!(totals.datagrams_sent as usize, datagrams.len());

        let spectra: Vec<&Vec<f32>> = datagrams
            .iter()
            .filter_map(|d| match d {
                Datagram::Spectrum { values } => Some(values),
                _ => None,
            })
            .collect();
        assert_eq!(spectra.len() as u64, totals.spectra);
        assert_eq!(spectra.len(), 31);
        assert!(spectra.iter().all(|v| v.len() == BUCKETS));

        let pitches: Vec<f32> = datagrams
            .iter()
            .filter_map(|d| match d {
                Datagram::Pitch { frequency, .. } => Some(*frequency),
                _ => None,
            })
            .collect();
        assert_eq!(pitches.len() as u64, totals.pitches);
        let near_tone = pitches.iter().filter(|f| (**f - 330.0).abs() < 10.0).count();
        assert!(
            near_tone * 2 > pitches.len(),
            "most pitch estimates should track the tone: {:?}",
            pitches
        );

        let onsets = datagrams
            .iter()
            .filter(|d| matches!(d, Datagram::Onset))
            .count();
        assert!(onsets >= 1, "clicks should produce onsets");
        assert_eq!(onsets as u64, totals.onsets);
    });
}

#[test]
fn test_invalid_config_is_rejected_before_start() {
    let runtime = init_test_runtime();
    runtime.block_on(async {
        let mut config = test_config(9);
        config.analysis.hop_size = WINDOW * 2;

        let result = Engine::start(&config, synthetic_backend(0.1)).await;
        assert!(matches!(result, Err(StartupError::Config(_))));
    });
}

#[test]
fn test_bucket_map_file_must_match_window() {
    let runtime = init_test_runtime();
    runtime.block_on(async {
        let path = std::env::temp_dir().join(format!(
            "firemix-map-mismatch-{}.json",
            std::process::id()
        ));
        let map = LogSpacedLayout {
            bucket_count: 16,
            ..LogSpacedLayout::default()
        }
        .generate(WINDOW * 2, SAMPLE_RATE)
        .unwrap();
        std::fs::write(&path, map.to_json_pretty().unwrap()).unwrap();

        let mut config = test_config(9);
        config.spectrum.bucket_map = BucketMapSource::File { path: path.clone() };

        let result = Engine::start(&config, synthetic_backend(0.1)).await;
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(StartupError::Config(_))));
    });
}

#[test]
fn test_requested_stop_before_end_of_input() {
    let runtime = init_test_runtime();
    runtime.block_on(async {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = test_config(receiver.local_addr().unwrap().port());

        let spec = SyntheticSpec {
            sample_rate: SAMPLE_RATE,
            duration_secs: None,
            ..SyntheticSpec::default()
        };
        let backend = FeederBackend::new(
            Box::new(SyntheticSource::new(spec)),
            WINDOW,
            Pacing::Realtime,
        );
        let engine = Engine::start(&config, Box::new(backend)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let shutdown = engine.shutdown_signal();
        engine.stop(ShutdownReason::Requested).await.unwrap();
        assert_eq!(shutdown.reason(), Some(ShutdownReason::Requested));
    });
}
