//! Lock-free parameter slots shared between the control and audio threads
//!
//! The control thread (UI, host automation, state restore) writes whole
//! [`CompressorParameters`] snapshots into a slot. The audio thread checks
//! the slot's generation once per block and copies the slot out only when it
//! changed. Neither side takes a lock or allocates.
//!
//! Each slot is a sequence lock. The generation is odd while a write is in
//! flight and even once it is complete. A reader that sees an odd generation,
//! or a generation that moved while it copied the fields, discards the copy.

use std::hint;
use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;

use super::CompressorParameters;
use crate::dsp::crossover::MAX_BANDS;
use crate::error::{Result, ThreebandError};

/// Cloneable handle the control side keeps to push parameter updates
pub type ParameterHandle = Arc<SharedParameters>;

/// Atomic storage for one band
#[derive(Debug)]
pub struct BandSlot {
    threshold_db: AtomicF32,
    attack_ms: AtomicF32,
    release_ms: AtomicF32,
    ratio: AtomicF32,
    knee_db: AtomicF32,
    makeup_gain_db: AtomicF32,
    bypass: AtomicBool,
    generation: AtomicU32,
    /// Most recent gain reduction in dB, written by the audio thread
    gain_reduction_db: AtomicF32,
}

impl BandSlot {
    fn new(params: CompressorParameters) -> Self {
        Self {
            threshold_db: AtomicF32::new(params.threshold_db),
            attack_ms: AtomicF32::new(params.attack_ms),
            release_ms: AtomicF32::new(params.release_ms),
            ratio: AtomicF32::new(params.ratio),
            knee_db: AtomicF32::new(params.knee_db),
            makeup_gain_db: AtomicF32::new(params.makeup_gain_db),
            bypass: AtomicBool::new(params.bypass),
            generation: AtomicU32::new(0),
            gain_reduction_db: AtomicF32::new(0.0),
        }
    }

    fn store(&self, params: CompressorParameters) {
        // Claim the slot: move from an even generation to the next odd one
        let mut current = self.generation.load(Ordering::Relaxed);
        loop {
            if current % 2 == 1 {
                hint::spin_loop();
                current = self.generation.load(Ordering::Relaxed);
                continue;
            }
            match self.generation.compare_exchange_weak(
                current,
                current.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        // Field stores must not become visible before the odd generation
        fence(Ordering::Release);

        self.threshold_db.store(params.threshold_db, Ordering::Relaxed);
        self.attack_ms.store(params.attack_ms, Ordering::Relaxed);
        self.release_ms.store(params.release_ms, Ordering::Relaxed);
        self.ratio.store(params.ratio, Ordering::Relaxed);
        self.knee_db.store(params.knee_db, Ordering::Relaxed);
        self.makeup_gain_db.store(params.makeup_gain_db, Ordering::Relaxed);
        self.bypass.store(params.bypass, Ordering::Relaxed);
        // Back to even: publishes the field stores above
        self.generation
            .store(current.wrapping_add(2), Ordering::Release);
    }

    fn load_fields(&self) -> CompressorParameters {
        CompressorParameters {
            threshold_db: self.threshold_db.load(Ordering::Relaxed),
            attack_ms: self.attack_ms.load(Ordering::Relaxed),
            release_ms: self.release_ms.load(Ordering::Relaxed),
            ratio: self.ratio.load(Ordering::Relaxed),
            knee_db: self.knee_db.load(Ordering::Relaxed),
            makeup_gain_db: self.makeup_gain_db.load(Ordering::Relaxed),
            bypass: self.bypass.load(Ordering::Relaxed),
        }
    }

    /// Consistent copy of the slot, or `None` if a write overlapped the read
    #[inline]
    fn try_read(&self) -> Option<(CompressorParameters, u32)> {
        let before = self.generation.load(Ordering::Acquire);
        if before % 2 == 1 {
            return None;
        }
        let snapshot = self.load_fields();
        fence(Ordering::Acquire);
        let after = self.generation.load(Ordering::Relaxed);
        (before == after).then_some((snapshot, before))
    }

    /// Consistent copy of the slot, waiting out any write in progress
    ///
    /// Control side only; the audio thread uses [`poll`](Self::poll).
    pub(crate) fn read(&self) -> (CompressorParameters, u32) {
        loop {
            if let Some(read) = self.try_read() {
                return read;
            }
            hint::spin_loop();
        }
    }

    /// Current generation; advances by two with every completed write
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Copy the slot out if its generation differs from `seen`
    ///
    /// Returns the snapshot and the generation it belongs to. Returns `None`
    /// when nothing changed, and also when a write is in progress or landed
    /// during the copy; the caller keeps `seen` and retries next block.
    #[inline]
    pub fn poll(&self, seen: u32) -> Option<(CompressorParameters, u32)> {
        if self.generation.load(Ordering::Relaxed) == seen {
            return None;
        }
        self.try_read()
            .filter(|&(_, generation)| generation != seen)
    }
}

/// Per-band parameter slots and gain-reduction meters
#[derive(Debug)]
pub struct SharedParameters {
    slots: [BandSlot; MAX_BANDS],
    band_count: AtomicUsize,
}

impl SharedParameters {
    /// Create shared storage with `band_count` active bands at default parameters
    pub fn new(band_count: usize) -> Self {
        Self {
            slots: std::array::from_fn(|_| BandSlot::new(CompressorParameters::default())),
            band_count: AtomicUsize::new(band_count.clamp(1, MAX_BANDS)),
        }
    }

    /// Number of active bands
    pub fn band_count(&self) -> usize {
        self.band_count.load(Ordering::Acquire)
    }

    pub(crate) fn set_band_count(&self, band_count: usize) {
        self.band_count
            .store(band_count.clamp(1, MAX_BANDS), Ordering::Release);
    }

    fn check_band(&self, band: usize) -> Result<()> {
        let band_count = self.band_count();
        if band < band_count {
            Ok(())
        } else {
            Err(ThreebandError::BandIndexOutOfRange {
                index: band,
                band_count,
            })
        }
    }

    /// Store parameters for a band, clamping them into range
    pub fn store(&self, band: usize, params: CompressorParameters) -> Result<()> {
        self.check_band(band)?;
        self.slots[band].store(params.clamped());
        Ok(())
    }

    /// Current parameters of a band
    pub fn load(&self, band: usize) -> Result<CompressorParameters> {
        self.check_band(band)?;
        Ok(self.slots[band].read().0)
    }

    /// Reset every slot (active or not) to default parameters
    pub fn reset_to_defaults(&self) {
        for slot in &self.slots {
            slot.store(CompressorParameters::default());
        }
    }

    /// Gain reduction in dB most recently applied to a band (0 = none)
    pub fn gain_reduction_db(&self, band: usize) -> Result<f32> {
        self.check_band(band)?;
        Ok(self.slots[band].gain_reduction_db.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn slot(&self, band: usize) -> &BandSlot {
        &self.slots[band]
    }

    #[inline]
    pub(crate) fn publish_gain_reduction(&self, band: usize, reduction_db: f32) {
        self.slots[band]
            .gain_reduction_db
            .store(reduction_db, Ordering::Relaxed);
    }

    pub(crate) fn clear_meters(&self) {
        for slot in &self.slots {
            slot.gain_reduction_db.store(0.0, Ordering::Relaxed);
        }
    }
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_store_and_load_clamps() {
        let shared = SharedParameters::new(3);
        let params = CompressorParameters {
            ratio: 0.5,
            attack_ms: -10.0,
            ..Default::default()
        };
        shared.store(1, params).unwrap();

        let loaded = shared.load(1).unwrap();
        assert_eq!(loaded.ratio, 1.0);
        assert_eq!(loaded.attack_ms, 0.1);
    }

    #[test]
    fn test_band_index_checked() {
        let shared = SharedParameters::new(2);
        assert!(shared.load(1).is_ok());
        assert!(matches!(
            shared.store(2, CompressorParameters::default()),
            Err(ThreebandError::BandIndexOutOfRange { index: 2, band_count: 2 })
        ));
    }

    #[test]
    fn test_poll_only_on_change() {
        let shared = SharedParameters::new(1);
        let slot = shared.slot(0);
        let seen = slot.generation();
        assert!(slot.poll(seen).is_none());

        shared
            .store(
                0,
                CompressorParameters {
                    threshold_db: -20.0,
                    ..Default::default()
                },
            )
            .unwrap();

        let (snapshot, generation) = slot.poll(seen).expect("generation should advance");
        assert_eq!(snapshot.threshold_db, -20.0);
        assert!(slot.poll(generation).is_none());
    }

    #[test]
    fn test_updates_from_control_thread() {
        let shared: ParameterHandle = Arc::new(SharedParameters::new(3));
        let writer = Arc::clone(&shared);

        thread::spawn(move || {
            for i in 0..100 {
                writer
                    .store(
                        2,
                        CompressorParameters {
                            threshold_db: -(i as f32) * 0.5,
                            ..Default::default()
                        },
                    )
                    .unwrap();
            }
        })
        .join()
        .unwrap();

        assert_eq!(shared.load(2).unwrap().threshold_db, -49.5);
    }

    #[test]
    fn test_poll_never_mixes_two_writes() {
        let gentle = CompressorParameters {
            threshold_db: -10.0,
            attack_ms: 1.0,
            release_ms: 10.0,
            ratio: 2.0,
            knee_db: 1.0,
            makeup_gain_db: 1.0,
            bypass: false,
        };
        let heavy = CompressorParameters {
            threshold_db: -50.0,
            attack_ms: 400.0,
            release_ms: 4000.0,
            ratio: 50.0,
            knee_db: 20.0,
            makeup_gain_db: 20.0,
            bypass: true,
        };

        let shared: ParameterHandle = Arc::new(SharedParameters::new(1));
        let done = Arc::new(AtomicBool::new(false));
        let writer = {
            let shared = Arc::clone(&shared);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut flip = false;
                while !done.load(Ordering::Relaxed) {
                    let params = if flip { heavy } else { gentle };
                    shared.store(0, params).unwrap();
                    flip = !flip;
                }
            })
        };

        let slot = shared.slot(0);
        let mut seen = 0;
        let mut applied = 0_usize;
        let deadline = Instant::now() + Duration::from_millis(300);
        while Instant::now() < deadline {
            if let Some((snapshot, generation)) = slot.poll(seen) {
                assert!(
                    snapshot == gentle || snapshot == heavy,
                    "mixed snapshot: {:?}",
                    snapshot
                );
                assert_eq!(generation % 2, 0);
                seen = generation;
                applied += 1;
            }
            let loaded = shared.load(0).unwrap();
            assert!(loaded == gentle || loaded == heavy, "mixed load: {:?}", loaded);
        }

        done.store(true, Ordering::Relaxed);
        writer.join().unwrap();
        assert!(applied > 0);
    }

    #[test]
    fn test_generation_advances_by_two_per_write() {
        let shared = SharedParameters::new(1);
        let before = shared.slot(0).generation();
        shared.store(0, CompressorParameters::default()).unwrap();
        assert_eq!(shared.slot(0).generation(), before + 2);
    }
}
