//! PIR motion sensor.
//!
//! `PirSensor` wraps a binary motion-presence signal. Each call to
//! `motion_detected` is a fresh point-in-time read of the pin; the sensor
//! keeps no state and does no debouncing. Debounce (the cooldown after a
//! trigger) is the orchestrator's job.
//!
//! Backends:
//! - GPIO via rppal (feature `gpio-rppal`), BCM pin numbering
//! - scripted readings for machines without the hardware

use anyhow::Result;

#[cfg(feature = "gpio-rppal")]
use anyhow::Context;

use std::collections::VecDeque;

/// PIR sensor handle.
///
/// Owned by the orchestrator for the process lifetime. `cleanup` consumes the
/// handle, so a read after cleanup does not compile.
pub struct PirSensor {
    backend: SensorBackend,
}

enum SensorBackend {
    #[cfg(feature = "gpio-rppal")]
    Gpio(GpioSensor),
    Scripted(ScriptedSensor),
}

impl PirSensor {
    /// Claim the PIR pin (BCM numbering) on the GPIO controller.
    #[cfg(feature = "gpio-rppal")]
    pub fn open(pin: u8) -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new().context("open gpio controller")?;
        let pin = gpio
            .get(pin)
            .with_context(|| format!("claim PIR pin {}", pin))?
            .into_input();
        Ok(Self {
            backend: SensorBackend::Gpio(GpioSensor { pin }),
        })
    }

    #[cfg(not(feature = "gpio-rppal"))]
    pub fn open(pin: u8) -> Result<Self> {
        anyhow::bail!(
            "PIR pin {} requires the gpio-rppal feature; use --stub-hardware off the device",
            pin
        )
    }

    /// Sensor that replays a fixed script of readings, then reads false
    /// forever.
    pub fn scripted(readings: Vec<bool>) -> Self {
        Self {
            backend: SensorBackend::Scripted(ScriptedSensor::new(readings, false)),
        }
    }

    /// Sensor that replays a script of readings in a cycle. Used by
    /// `--stub-hardware` daemon runs to trigger periodically.
    pub fn cycling(readings: Vec<bool>) -> Self {
        Self {
            backend: SensorBackend::Scripted(ScriptedSensor::new(readings, true)),
        }
    }

    /// Point-in-time read of the motion signal.
    pub fn motion_detected(&mut self) -> Result<bool> {
        match &mut self.backend {
            #[cfg(feature = "gpio-rppal")]
            SensorBackend::Gpio(sensor) => Ok(sensor.pin.is_high()),
            SensorBackend::Scripted(sensor) => Ok(sensor.next_reading()),
        }
    }

    /// Release the pin claim. Consumes the sensor.
    pub fn cleanup(self) {
        // rppal resets the pin to its original mode on drop; the scripted
        // backend has nothing to release.
        match self.backend {
            #[cfg(feature = "gpio-rppal")]
            SensorBackend::Gpio(sensor) => drop(sensor),
            SensorBackend::Scripted(_) => {}
        }
        log::debug!("PIR sensor released");
    }
}

#[cfg(feature = "gpio-rppal")]
struct GpioSensor {
    pin: rppal::gpio::InputPin,
}

struct ScriptedSensor {
    readings: VecDeque<bool>,
    cycle: bool,
}

impl ScriptedSensor {
    fn new(readings: Vec<bool>, cycle: bool) -> Self {
        Self {
            readings: readings.into(),
            cycle,
        }
    }

    fn next_reading(&mut self) -> bool {
        let Some(reading) = self.readings.pop_front() else {
            return false;
        };
        if self.cycle {
            self.readings.push_back(reading);
        }
        reading
    }
}
