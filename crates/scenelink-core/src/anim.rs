//! Time-based progress animations
//!
//! An [`Anim`] only tracks progress from 0.0 to 1.0 over a duration; what is
//! being animated is up to the caller (see [`lerp`]).

use crate::{Error, Result};
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Anim {
    duration: f64,
    t: f64,
    progress: f64,
    active: bool,
    finished: bool,
    last_update: Option<Instant>,
}

impl Anim {
    /// Create an inactive animation lasting `duration` seconds
    pub fn new(duration: f64) -> Result<Self> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(Error::InvalidDuration(duration));
        }

        Ok(Self {
            duration,
            t: 0.0,
            progress: 0.0,
            active: false,
            finished: false,
            last_update: None,
        })
    }

    pub fn start(&mut self) {
        self.t = 0.0;
        self.progress = 0.0;
        self.active = true;
        self.finished = false;
        self.last_update = None;
    }

    /// Advance by `dt` seconds, or by the wall-clock time since the previous
    /// clock-driven update when `dt` is `None`.
    pub fn update(&mut self, dt: Option<f64>) {
        if !self.active {
            return;
        }

        let dt = match dt {
            Some(dt) => dt,
            None => {
                let now = Instant::now();
                let dt = self
                    .last_update
                    .map(|last| now.duration_since(last).as_secs_f64())
                    .unwrap_or(0.0);
                self.last_update = Some(now);
                dt
            }
        };

        self.t += dt.max(0.0);
        self.progress = (self.t / self.duration).min(1.0);
        if self.t >= self.duration {
            self.active = false;
            self.finished = true;
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn elapsed(&self) -> f64 {
        self.t
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Linear interpolation between two arrays at `progress`
pub fn lerp<const N: usize>(from: &[f64; N], to: &[f64; N], progress: f64) -> [f64; N] {
    std::array::from_fn(|i| from[i] + (to[i] - from[i]) * progress)
}

/// Handle for an animation owned by an [`AnimManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimId(u64);

/// Drives a set of animations from one clock
#[derive(Debug)]
pub struct AnimManager {
    anims: Vec<(AnimId, Anim)>,
    next_id: u64,
    remove_finished: bool,
    last_update: Option<Instant>,
}

impl AnimManager {
    pub fn new(remove_finished: bool) -> Self {
        Self {
            anims: Vec::new(),
            next_id: 1,
            remove_finished,
            last_update: None,
        }
    }

    pub fn add(&mut self, anim: Anim) -> AnimId {
        let id = AnimId(self.next_id);
        self.next_id += 1;
        self.anims.push((id, anim));
        id
    }

    /// Start `anim` and take ownership of it
    pub fn start(&mut self, mut anim: Anim) -> AnimId {
        anim.start();
        self.add(anim)
    }

    pub fn get(&self, id: AnimId) -> Option<&Anim> {
        self.anims.iter().find(|(aid, _)| *aid == id).map(|(_, a)| a)
    }

    pub fn remove(&mut self, id: AnimId) -> bool {
        let before = self.anims.len();
        self.anims.retain(|(aid, _)| *aid != id);
        if self.anims.len() == before {
            warn!("AnimManager.remove: unknown anim {:?}", id);
            return false;
        }
        true
    }

    pub fn clear(&mut self) {
        self.anims.clear();
    }

    pub fn len(&self) -> usize {
        self.anims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anims.is_empty()
    }

    /// Advance every animation by the same `dt` (wall clock when `None`)
    pub fn update(&mut self, dt: Option<f64>) {
        let dt = match dt {
            Some(dt) => dt,
            None => {
                let now = Instant::now();
                let dt = self
                    .last_update
                    .map(|last| now.duration_since(last).as_secs_f64())
                    .unwrap_or(0.0);
                self.last_update = Some(now);
                dt
            }
        };

        for (_, anim) in self.anims.iter_mut() {
            anim.update(Some(dt));
        }

        if self.remove_finished {
            self.anims.retain(|(_, anim)| !anim.is_finished());
        }
    }
}

impl Default for AnimManager {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_duration() {
        assert_eq!(Anim::new(0.0).unwrap_err(), Error::InvalidDuration(0.0));
        assert!(Anim::new(f64::NAN).is_err());
    }

    #[test]
    fn test_progress_and_finish() {
        let mut anim = Anim::new(1.0).unwrap();
        anim.update(Some(0.5));
        assert_eq!(anim.progress(), 0.0, "inactive anim must not advance");

        anim.start();
        anim.update(Some(0.25));
        assert!((anim.progress() - 0.25).abs() < 1e-9);
        assert!(anim.is_active());

        anim.update(Some(1.0));
        assert_eq!(anim.progress(), 1.0);
        assert!(!anim.is_active());
        assert!(anim.is_finished());
    }

    #[test]
    fn test_first_clock_update_is_zero() {
        let mut anim = Anim::new(10.0).unwrap();
        anim.start();
        anim.update(None);
        assert_eq!(anim.elapsed(), 0.0);
    }

    #[test]
    fn test_lerp() {
        let out = lerp(&[0.0, 10.0, -2.0], &[1.0, 20.0, 2.0], 0.5);
        assert_eq!(out, [0.5, 15.0, 0.0]);
    }

    #[test]
    fn test_manager_removes_finished() {
        let mut manager = AnimManager::new(true);
        let short = manager.start(Anim::new(0.1).unwrap());
        let long = manager.start(Anim::new(1.0).unwrap());

        manager.update(Some(0.2));
        assert!(manager.get(short).is_none());
        assert!(manager.get(long).is_some());
        assert_eq!(manager.len(), 1);

        assert!(manager.remove(long));
        assert!(!manager.remove(long));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_manager_keeps_finished() {
        let mut manager = AnimManager::new(false);
        let id = manager.start(Anim::new(0.1).unwrap());
        manager.update(Some(1.0));
        assert!(manager.get(id).map(|a| a.is_finished()).unwrap_or(false));
    }
}
