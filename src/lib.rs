#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod config;
mod distribution;
mod effect;
mod envelope;
mod error;
mod grain;
mod location;
mod mixer;
mod model;
#[cfg(feature = "wav-output")]
mod output;
mod parameter;
mod player;
mod source;
mod spatializer;
mod stream;
mod trigger;

// public, flat re-exports
pub use error::Error;

pub use config::{EngineConfig, RenderTime, CHANNEL_COUNT, MAX_OFFSET_FRAMES};

pub use distribution::{
    random, transform::ExtendedTransformFn,
    Component, Distribution, DistributionType, MixtureMode, Polarity, Transform,
};

pub use envelope::{EnvelopeType, GrainEnvelope};
pub use grain::Grain;
pub use location::{Location, SpatialMode};
pub use model::{GrainModel, ModelParameter, RateMode};

pub use source::{sine::SineSynth, GrainSource, GrainSynth, VoiceId, VoiceStatus};
pub use spatializer::{Spatializer, StereoSpatializer, SPEED_OF_SOUND};

pub use trigger::{ImpulseTrigger, LiveInput, LiveTrigger, TriggerOnset, TriggerProcessor};

pub use mixer::{GrainMixer, MixerEffect, StreamId};
pub use player::GrainPlayer;
pub use stream::{GrainStream, TriggerMode};

#[cfg(feature = "wav-output")]
pub use output::wav::WavOutput;

pub use effect::{Effect, EffectId};
pub use parameter::{FloatParameter, FloatParameterValue};

// public mods
pub mod utils;

pub mod effects {
    //! Set of basic DSP effect implementations, usable as per-stream effects.

    pub use super::effect::{
        compressor::CompressorEffect, eq::EqEffect, reverb::ReverbEffect,
        widener::WidenerEffect,
    };
}
