// Analog input widget: rolling trend of pushed samples
use super::Attributes;
use crate::buffer::RollingSampleBuffer;
use crate::bus::{DeviceEvents, SubscriptionId};
use crate::channel::ChannelNum;
use crate::event::EventKind;
use crate::{PanelError, Result};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Affine map from a channel value to a plot y coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogScale {
    min: f64,
    max: f64,
    plot_height: f64,
}

impl AnalogScale {
    /// Height of the plot area in view-box units
    pub const PLOT_HEIGHT: f64 = 80.0;

    /// Rejects `min == max` and non-finite bounds, which would make the map divide by zero
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || min == max {
            return Err(PanelError::InvalidScale { min, max });
        }
        Ok(Self {
            min,
            max,
            plot_height: Self::PLOT_HEIGHT,
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// `round(plot_height - (plot_height / (max - min)) * value)`
    pub fn to_display(&self, value: f64) -> i64 {
        (self.plot_height - (self.plot_height / (self.max - self.min)) * value).round() as i64
    }
}

/// Horizontal layout of the trend line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendGeometry {
    pub margin_left: f64,
    pub margin_right: f64,
    pub step: f64,
}

impl Default for TrendGeometry {
    fn default() -> Self {
        Self {
            margin_left: 30.0,
            margin_right: 190.0,
            step: 5.0,
        }
    }
}

impl TrendGeometry {
    /// Number of points that fit between the margins
    pub fn capacity(&self) -> usize {
        if self.step <= 0.0 || self.margin_right <= self.margin_left {
            return 0;
        }
        ((self.margin_right - self.margin_left) / self.step).floor() as usize
    }

    /// SVG path through the samples, newest at the right margin
    pub fn path<'a>(&self, samples: impl IntoIterator<Item = &'a i64>) -> String {
        let mut path = String::new();
        for (i, y) in samples.into_iter().enumerate() {
            let x = self.margin_right - i as f64 * self.step;
            if path.is_empty() {
                let _ = write!(path, "M {} {}", x, y);
            } else {
                let _ = write!(path, " {} {}", x, y);
            }
        }
        path
    }
}

#[derive(Debug)]
struct Trend {
    samples: RollingSampleBuffer<i64>,
    latest: Option<f64>,
}

struct AnalogChannel {
    num: ChannelNum,
    name: Option<String>,
    scale: AnalogScale,
    geometry: TrendGeometry,
    trend: Mutex<Trend>,
    disposed: AtomicBool,
    path_tx: watch::Sender<String>,
}

impl AnalogChannel {
    fn trend(&self) -> MutexGuard<'_, Trend> {
        self.trend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, value: f64) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let y = self.scale.to_display(value);
        let path = {
            let mut trend = self.trend();
            trend.samples.push(y);
            trend.latest = Some(value);
            self.geometry.path(trend.samples.iter())
        };
        self.path_tx.send_replace(path);
    }
}

/// Trend widget fed by `analog-input` push events
pub struct AnalogInputWidget {
    channel: Arc<AnalogChannel>,
    events: Arc<DeviceEvents>,
    subscription: SubscriptionId,
}

impl AnalogInputWidget {
    /// Requires `num`, `min` and `max`
    pub fn create(attributes: &Attributes, events: &Arc<DeviceEvents>) -> Result<Self> {
        let num = attributes.num()?;
        let scale = AnalogScale::new(attributes.number("min")?, attributes.number("max")?)?;
        Ok(Self::with_scale(
            num,
            attributes.name(),
            scale,
            TrendGeometry::default(),
            events,
        ))
    }

    pub fn with_scale(
        num: ChannelNum,
        name: Option<String>,
        scale: AnalogScale,
        geometry: TrendGeometry,
        events: &Arc<DeviceEvents>,
    ) -> Self {
        let (path_tx, _) = watch::channel(String::new());
        let channel = Arc::new(AnalogChannel {
            num,
            name,
            scale,
            geometry,
            trend: Mutex::new(Trend {
                samples: RollingSampleBuffer::new(geometry.capacity()),
                latest: None,
            }),
            disposed: AtomicBool::new(false),
            path_tx,
        });

        let weak = Arc::downgrade(&channel);
        let subscription = events.subscribe(EventKind::AnalogInput, move |event| {
            if event.num != num {
                return;
            }
            if let (Some(channel), Some(value)) = (weak.upgrade(), event.as_level()) {
                channel.record(value);
            }
        });

        Self {
            channel,
            events: Arc::clone(events),
            subscription,
        }
    }

    /// Append a raw channel value to the trend
    pub fn record(&self, value: f64) {
        self.channel.record(value);
    }

    pub fn num(&self) -> ChannelNum {
        self.channel.num
    }

    pub fn name(&self) -> Option<&str> {
        self.channel.name.as_deref()
    }

    pub fn scale(&self) -> AnalogScale {
        self.channel.scale
    }

    /// Display coordinates, newest first
    pub fn samples(&self) -> Vec<i64> {
        self.channel.trend().samples.to_vec()
    }

    pub fn capacity(&self) -> usize {
        self.channel.trend().samples.capacity()
    }

    /// Last raw value received
    pub fn latest(&self) -> Option<f64> {
        self.channel.trend().latest
    }

    pub fn trend_path(&self) -> String {
        self.channel.path_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<String> {
        self.channel.path_tx.subscribe()
    }

    pub fn dispose(&self) {
        self.channel.disposed.store(true, Ordering::Release);
        self.events.unsubscribe(self.subscription);
    }
}

impl Drop for AnalogInputWidget {
    fn drop(&mut self) {
        self.events.unsubscribe(self.subscription);
    }
}
