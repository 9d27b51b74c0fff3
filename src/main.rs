use clap::Parser;
use sentinel_edge_rs::{
    camera::FrameGrabber,
    config::{load_config, Settings},
    error::Result as SentinelResult,
    pipeline::{AlertPipeline, CameraStage, PlayerStage, TtsStage, VisionStage},
    playback::AudioPlayer,
    sensor::SensorListener,
    tts::ElevenLabsTts,
    vision::GeminiVision,
};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> SentinelResult<()> {
    // Initialize logging
    env_logger::init();
    log::info!("Initializing sentinel-edge-rs");

    let settings = Settings::parse();

    // Check for the mandatory API key before touching any hardware
    dotenvy::dotenv().ok();
    if env::var("GEMINI_API_KEY").is_err() {
        eprintln!("GEMINI_API_KEY environment variable not set");
        eprintln!("   Please set it with: export GEMINI_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let api_config = load_config()?;

    // Sensor link. Unopenable port is fatal before polling begins.
    let mut sensor = match SensorListener::open(&settings.serial_port, settings.serial_baud) {
        Ok(sensor) => sensor,
        Err(e) => {
            log::error!("CRITICAL: {}", e);
            eprintln!("Please check the sensor connection and port name (e.g. /dev/ttyUSB0)");
            std::process::exit(1);
        }
    };

    let vision = GeminiVision::new(api_config.gemini_key().to_string())?;
    log::info!("Gemini client initialized");

    // Speech is best-effort: without a key, alert cycles run silent.
    let synthesizer = match api_config.elevenlabs_key() {
        Some(key) => {
            let tts = ElevenLabsTts::new(key.to_string())?;
            log::info!("ElevenLabs client initialized");
            Some(TtsStage {
                tts,
                clip_path: settings.alert_audio_path.clone(),
            })
        }
        None => None,
    };

    let player = AudioPlayer::probe();

    let pipeline = AlertPipeline::new(
        CameraStage {
            grabber: FrameGrabber::new()?,
            url: settings.camera_url.clone(),
            snapshot_path: settings.snapshot_path.clone(),
        },
        VisionStage { vision },
        synthesizer,
        PlayerStage { player },
    );

    println!("\n{}", "=".repeat(30));
    println!("SENTINEL EDGE - ARMED AND READY");
    println!("Listening for sensor signals on {}...", sensor.port_name());
    println!("{}\n", "=".repeat(30));

    let poll_interval = Duration::from_millis(settings.poll_interval_ms);

    // One signal listener for the whole run, so an interrupt landing
    // mid-cycle is not lost between select registrations.
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // ARMED: polling below. PROCESSING: blocked inside run_cycle. The
    // loop re-arms unconditionally after every cycle; triggers arriving
    // mid-cycle are lost by design.
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                println!("\nShutdown signal received. Closing ports and exiting.");
                break;
            }
            _ = tokio::time::sleep(poll_interval) => {
                match sensor.poll_trigger() {
                    Ok(true) => match pipeline.run_cycle_until(&mut shutdown).await {
                        Some(outcome) => log::info!("Cycle finished ({:?}), re-armed", outcome),
                        None => {
                            println!("\nShutdown signal received. Closing ports and exiting.");
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        log::error!("CRITICAL: {}. Exiting.", e);
                        break;
                    }
                }
            }
        }
    }

    // Dropping the listener closes the port.
    drop(sensor);
    println!("Serial port closed. System shutdown.");
    Ok(())
}
