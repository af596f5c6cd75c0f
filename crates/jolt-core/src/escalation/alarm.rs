//! Audible alarm ownership and volume ramp.
//!
//! The alarm starts quiet and gets louder as the countdown runs out, so a
//! possibly injured user is not blasted right away but urgency still builds.

/// Volume at the very start of a countdown.
pub const MIN_VOLUME: f32 = 0.1;

/// Volume for `remaining` seconds left out of `total`.
///
/// Rises linearly from `min_volume` (nothing elapsed) to `1.0` (expired).
pub fn volume_for(remaining: u8, total: u8, min_volume: f32) -> f32 {
    if total == 0 {
        return 1.0;
    }
    let remaining = remaining.min(total) as f32;
    let elapsed_fraction = 1.0 - remaining / total as f32;
    (min_volume + (1.0 - min_volume) * elapsed_fraction).clamp(0.0, 1.0)
}

/// Audio output the alarm plays through.
pub trait AlarmDevice: Send {
    fn play(&mut self, volume: f32);
    fn set_volume(&mut self, volume: f32);
    fn stop(&mut self);
}

/// Device that makes no sound.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAlarm;

impl AlarmDevice for SilentAlarm {
    fn play(&mut self, _volume: f32) {}
    fn set_volume(&mut self, _volume: f32) {}
    fn stop(&mut self) {}
}

/// Sole owner of the alarm device.
///
/// Dropping the guard stops any sound, so every exit path out of a session
/// releases the device.
pub struct Alarm {
    device: Box<dyn AlarmDevice>,
    sounding: bool,
}

impl Alarm {
    pub fn new(device: Box<dyn AlarmDevice>) -> Self {
        Self {
            device,
            sounding: false,
        }
    }

    /// Start playing, or adjust the volume if already playing.
    pub fn sound(&mut self, volume: f32) {
        if self.sounding {
            self.device.set_volume(volume);
        } else {
            tracing::debug!(volume, "alarm on");
            self.device.play(volume);
            self.sounding = true;
        }
    }

    pub fn silence(&mut self) {
        if self.sounding {
            tracing::debug!("alarm off");
            self.device.stop();
            self.sounding = false;
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        self.silence();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl AlarmDevice for Recorder {
        fn play(&mut self, volume: f32) {
            self.0.lock().unwrap().push(format!("play {volume:.2}"));
        }
        fn set_volume(&mut self, volume: f32) {
            self.0.lock().unwrap().push(format!("volume {volume:.2}"));
        }
        fn stop(&mut self) {
            self.0.lock().unwrap().push("stop".into());
        }
    }

    #[test]
    fn ramp_endpoints() {
        assert!((volume_for(15, 15, MIN_VOLUME) - 0.1).abs() < 1e-6);
        assert!((volume_for(0, 15, MIN_VOLUME) - 1.0).abs() < 1e-6);
        assert!((volume_for(10, 15, MIN_VOLUME) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn ramp_is_monotonic() {
        let volumes: Vec<f32> = (0..=15).rev().map(|n| volume_for(n, 15, MIN_VOLUME)).collect();
        assert!(volumes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ramp_handles_zero_total() {
        assert_eq!(volume_for(0, 0, MIN_VOLUME), 1.0);
    }

    #[test]
    fn play_then_adjust_then_stop() {
        let recorder = Recorder::default();
        let mut alarm = Alarm::new(Box::new(recorder.clone()));
        alarm.sound(0.1);
        alarm.sound(0.5);
        alarm.silence();
        alarm.silence();
        assert_eq!(
            *recorder.0.lock().unwrap(),
            ["play 0.10", "volume 0.50", "stop"]
        );
    }

    #[test]
    fn drop_stops_sounding_alarm() {
        let recorder = Recorder::default();
        {
            let mut alarm = Alarm::new(Box::new(recorder.clone()));
            alarm.sound(0.3);
        }
        assert_eq!(recorder.0.lock().unwrap().last().map(String::as_str), Some("stop"));
    }
}
