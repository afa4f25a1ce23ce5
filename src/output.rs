//! Offline outputs for a [`GrainMixer`](crate::GrainMixer).

#[cfg(feature = "wav-output")]
pub mod wav;
