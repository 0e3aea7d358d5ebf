// Simulated device inputs
//
// One pair of timers per server: a random digital-input flip and a sampled sine wave
// on analog channel 0. Both push unconditionally, listeners or not.

use crate::bank::ChannelBank;
use crate::broadcast::SseMessage;
use iopanel_core::event::SamplePayload;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Rounded `offset + amplitude * sin(angle)`, angle advanced by `step` radians per sample
#[derive(Debug, Clone)]
pub struct SineGenerator {
    angle: f64,
    offset: f64,
    amplitude: f64,
    step: f64,
}

impl Default for SineGenerator {
    fn default() -> Self {
        Self {
            angle: 0.0,
            offset: 50.0,
            amplitude: 10.0,
            step: 100.0,
        }
    }
}

impl SineGenerator {
    pub fn new(offset: f64, amplitude: f64, step: f64) -> Self {
        Self {
            angle: 0.0,
            offset,
            amplitude,
            step,
        }
    }

    pub fn next_sample(&mut self) -> i64 {
        let value = (self.offset + self.amplitude * self.angle.sin()).round() as i64;
        self.angle += self.step;
        value
    }
}

pub struct InputSimulator {
    bank: Arc<ChannelBank>,
    digital_period: Duration,
    analog_period: Duration,
}

impl InputSimulator {
    pub fn new(bank: Arc<ChannelBank>, digital_period: Duration, analog_period: Duration) -> Self {
        Self {
            bank,
            digital_period,
            analog_period,
        }
    }

    /// Spawn both timers; abort the handles to stop them
    pub fn spawn(self) -> [JoinHandle<()>; 2] {
        let bank = Arc::clone(&self.bank);
        let period = self.digital_period;
        let digital = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the immediate first tick
            interval.tick().await;
            loop {
                interval.tick().await;
                flip_random_input(&bank);
            }
        });

        let bank = Arc::clone(&self.bank);
        let period = self.analog_period;
        let analog = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut wave = SineGenerator::default();
            interval.tick().await;
            loop {
                interval.tick().await;
                emit_analog(&bank, wave.next_sample());
            }
        });

        [digital, analog]
    }
}

fn flip_random_input(bank: &ChannelBank) {
    let count = bank.input_count();
    if count == 0 {
        return;
    }
    let (num, on) = {
        let mut rng = rand::thread_rng();
        (rng.gen_range(0..count), rng.gen_bool(0.5))
    };
    let payload = SamplePayload {
        num: num as u32,
        value: u8::from(on),
    };
    let announce = match SseMessage::json("digital-input", &payload) {
        Ok(message) => message,
        Err(e) => {
            warn!(target: "simulator", error = %e, "Failed to encode digital-input");
            return;
        }
    };
    if let Err(e) = bank.set_input(num, on, Some(announce)) {
        warn!(target: "simulator", num, error = %e, "Simulated input rejected");
        return;
    }
    debug!(target: "simulator", num, value = on, "digital-input");
}

fn emit_analog(bank: &ChannelBank, value: i64) {
    let payload = SamplePayload { num: 0, value };
    match SseMessage::json("analog-input", &payload) {
        Ok(message) => {
            bank.broadcaster().broadcast(message);
        }
        Err(e) => warn!(target: "simulator", error = %e, "Failed to encode analog-input"),
    }
}
