#[cfg(not(feature = "streaming"))]
fn main() {
    eprintln!(
        "The emu-audio CLI requires the \"streaming\" feature. Rebuild with `--features streaming` to enable playback."
    );
}

#[cfg(feature = "streaming")]
mod cli {
    use std::env;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use anyhow::{bail, Context};
    use emu_audio::export::drain_to_wav;
    use emu_audio::streaming::DEFAULT_SAMPLE_RATE;
    use emu_audio::{AudioComponent, AudioDevice, RealtimeStream, StreamConfig, TracingLogger};
    use parking_lot::Mutex;

    /// Video frames per second of the pretend core
    const CORE_FPS: f64 = 60.0;
    const AMPLITUDE: f64 = 8000.0;

    /// Stand-in for an emulation core: a stereo sine produced one video frame at a time
    struct ToneCore {
        rate: f64,
        tone_hz: f64,
        phase: f64,
        /// Fractional frames carried into the next video frame
        carry: f64,
        frame: Vec<i16>,
    }

    impl ToneCore {
        fn new(rate: f64, tone_hz: f64) -> Self {
            ToneCore {
                rate,
                tone_hz,
                phase: 0.0,
                carry: 0.0,
                frame: Vec::new(),
            }
        }

        fn run_frame(&mut self) -> &[i16] {
            let exact = self.rate / CORE_FPS + self.carry;
            let frames = exact.floor() as usize;
            self.carry = exact - frames as f64;

            let step = std::f64::consts::TAU * self.tone_hz / self.rate;
            self.frame.clear();
            for _ in 0..frames {
                let v = (self.phase.sin() * AMPLITUDE) as i16;
                self.frame.extend_from_slice(&[v, v]);
                self.phase = (self.phase + step) % std::f64::consts::TAU;
            }
            &self.frame
        }
    }

    struct Options {
        core_rate: f64,
        output_rate: u32,
        tone_hz: f64,
        seconds: f64,
        wav_path: Option<String>,
        config_path: Option<String>,
    }

    fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> anyhow::Result<T> {
        let value = value.with_context(|| format!("{flag} requires an argument"))?;
        value
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid value for {flag}: {value}"))
    }

    fn parse_args() -> anyhow::Result<Option<Options>> {
        let mut options = Options {
            core_rate: 32_040.5,
            output_rate: DEFAULT_SAMPLE_RATE,
            tone_hz: 440.0,
            seconds: 3.0,
            wav_path: None,
            config_path: None,
        };

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--core-rate" => options.core_rate = parse_value(&arg, args.next())?,
                "--output-rate" => options.output_rate = parse_value(&arg, args.next())?,
                "--tone" => options.tone_hz = parse_value(&arg, args.next())?,
                "--seconds" => options.seconds = parse_value(&arg, args.next())?,
                "--wav" => options.wav_path = Some(parse_value(&arg, args.next())?),
                "--config" => options.config_path = Some(parse_value(&arg, args.next())?),
                "--help" | "-h" => return Ok(None),
                _ => bail!("Unknown argument: {arg}"),
            }
        }

        Ok(Some(options))
    }

    fn print_usage() {
        eprintln!(
            "Usage:\n  emu-audio [--core-rate <Hz>] [--output-rate <Hz>] [--tone <Hz>] [--seconds <s>] [--wav <file>] [--config <file.json>]\n\nFlags:\n  --core-rate <Hz>     Rate the pretend core produces audio at (default 32040.5)\n  --output-rate <Hz>   Device rate (default {DEFAULT_SAMPLE_RATE}, overridden by --config)\n  --tone <Hz>          Sine frequency (default 440)\n  --seconds <s>        Duration (default 3)\n  --wav <file>         Capture to WAV instead of playing\n  --config <file>      JSON stream configuration\n  -h, --help           Show this help\n"
        );
    }

    fn load_config(options: &Options) -> anyhow::Result<StreamConfig> {
        match &options.config_path {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config '{path}'"))?;
                Ok(StreamConfig::from_json_str(&json)?)
            }
            None => Ok(StreamConfig::low_latency(options.output_rate)),
        }
    }

    fn capture(options: &Options, path: &str) -> anyhow::Result<()> {
        let base = load_config(options)?;
        // Hold the whole capture, plus slack for the resampler's rounding
        let latency_ms = (options.seconds * 1000.0).ceil() as u32 + 100;
        let config = StreamConfig {
            ring_buffer_size: StreamConfig::with_latency(base.sample_rate, latency_ms)
                .ring_buffer_size,
            ..base
        };

        let mut stream = RealtimeStream::new(config, Box::new(TracingLogger))?;
        if !stream.set_rate(options.core_rate) {
            bail!("Core rate {} Hz rejected by the resampler", options.core_rate);
        }

        let mut core = ToneCore::new(options.core_rate, options.tone_hz);
        let video_frames = (options.seconds * CORE_FPS).round() as usize;
        for _ in 0..video_frames {
            stream.mix(core.run_frame());
        }

        let frames = drain_to_wav(&stream.get_buffer(), path, config.sample_rate)?;
        println!(
            "Captured {frames} frames ({:.2}s at {} Hz) to {path}",
            frames as f64 / config.sample_rate as f64,
            config.sample_rate
        );
        Ok(())
    }

    fn play(options: &Options) -> anyhow::Result<()> {
        let config = load_config(options)?;
        let stream = RealtimeStream::new(config, Box::new(TracingLogger))?;
        let audio_device = AudioDevice::new(config.sample_rate, stream.get_buffer())?;

        let stream = Arc::new(Mutex::new(stream));
        if !stream.lock().set_rate(options.core_rate) {
            bail!("Core rate {} Hz rejected by the resampler", options.core_rate);
        }

        println!(
            "Playing {} Hz tone: core {} Hz -> device {} Hz, buffer {:.1} ms",
            options.tone_hz,
            options.core_rate,
            config.sample_rate,
            config.latency_ms()
        );

        let running = Arc::new(AtomicBool::new(true));
        let producer_running = Arc::clone(&running);
        let producer_stream = Arc::clone(&stream);
        let core_rate = options.core_rate;
        let tone_hz = options.tone_hz;

        // Emulation thread: one video frame of audio every 1/60 s
        let producer_thread = thread::spawn(move || {
            let mut core = ToneCore::new(core_rate, tone_hz);
            let frame_time = Duration::from_secs_f64(1.0 / CORE_FPS);
            let mut next = Instant::now();
            while producer_running.load(Ordering::Relaxed) {
                producer_stream.lock().mix(core.run_frame());
                next += frame_time;
                if let Some(wait) = next.checked_duration_since(Instant::now()) {
                    thread::sleep(wait);
                }
            }
        });

        let playback_start = Instant::now();
        let total = Duration::from_secs_f64(options.seconds);
        while playback_start.elapsed() < total {
            thread::sleep(Duration::from_millis(250));
            let stats = stream.lock().get_stats();
            println!(
                "[{:.1}s] Buffer: {:>5.1}% | Underruns: {} | Overflows: {}",
                playback_start.elapsed().as_secs_f32(),
                stats.fill_percentage * 100.0,
                stats.underrun_count,
                stats.overflow_count
            );
        }

        running.store(false, Ordering::Relaxed);
        producer_thread
            .join()
            .map_err(|_| anyhow::anyhow!("Producer thread panicked during shutdown"))?;
        audio_device.finish();

        let final_stats = stream.lock().get_stats();
        println!("\n=== Playback Statistics ===");
        println!(
            "Duration:          {:.2} seconds",
            playback_start.elapsed().as_secs_f32()
        );
        println!("Core frames mixed: {}", final_stats.frames_mixed);
        println!("Underrun events:   {}", final_stats.underrun_count);
        println!("Overflow events:   {}", final_stats.overflow_count);
        println!("Buffer latency:    {:.1} ms", config.latency_ms());

        Ok(())
    }

    pub fn run() -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();

        let Some(options) = parse_args()? else {
            print_usage();
            return Ok(());
        };

        match options.wav_path.as_deref() {
            Some(path) => capture(&options, path),
            None => play(&options),
        }
    }
}

#[cfg(feature = "streaming")]
fn main() -> anyhow::Result<()> {
    cli::run()
}
