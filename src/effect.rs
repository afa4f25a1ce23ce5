use four_cc::FourCC;

use crate::{config::RenderTime, parameter::FloatParameter, Error};

// -------------------------------------------------------------------------------------------------

pub mod compressor;
pub mod eq;
pub mod reverb;
pub mod widener;

// -------------------------------------------------------------------------------------------------

/// Effects manipulate interleaved stereo `f32` buffers in-place in the real-time audio thread.
///
/// After an effect got added to a stream or mixer, its parameters can only be changed by
/// sending parameter updates via the [`GrainPlayer`](crate::GrainPlayer). This ensures that the
/// actual effect processing state is not mutated outside of the audio thread. Use
/// [`Effect::parameters`] to query the available parameters before adding the effect.
///
/// NB: all `process_XXX` functions are called in real-time audio threads, so they must not
/// block or allocate. All other functions are called in the main thread to set up the effect.
pub trait Effect: Send + 'static {
    /// A unique, static name for the effect, used for logging.
    fn name(&self) -> &'static str;

    /// Parameter descriptors of this effect.
    fn parameters(&self) -> Vec<&FloatParameter>;

    /// Initializes the effect with the stream's or mixer's output properties.
    ///
    /// Called once before the effect is used in a non real-time thread, so it's safe to allocate
    /// buffers here. If an error is returned, the effect will not be added.
    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
    ) -> Result<(), Error>;

    /// Processes an interleaved buffer in-place.
    fn process(&mut self, output: &mut [f32], time: &RenderTime);

    /// Handles a parameter update in the real-time thread.
    fn process_parameter_update(&mut self, id: FourCC, value: f32) -> Result<(), Error>;

    /// Clears all internal processing state, e.g. delay lines and filter memories.
    fn process_reset(&mut self) {}
}

// -------------------------------------------------------------------------------------------------

/// Unique id of an effect within an [`EffectChain`].
pub type EffectId = usize;

// -------------------------------------------------------------------------------------------------

/// A serial chain of boxed effects.
#[derive(Default)]
pub struct EffectChain {
    effects: Vec<(EffectId, Box<dyn Effect>)>,
    next_id: EffectId,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Initialize and append the given effect. Returns the id of the new effect.
    pub fn add(
        &mut self,
        mut effect: Box<dyn Effect>,
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
    ) -> Result<EffectId, Error> {
        effect.initialize(sample_rate, channel_count, max_frames)?;
        let id = self.next_id;
        self.next_id += 1;
        log::debug!("Adding effect '{}' with id {id}", effect.name());
        self.effects.push((id, effect));
        Ok(id)
    }

    /// Remove an effect by id and return it.
    pub fn remove(&mut self, id: EffectId) -> Result<Box<dyn Effect>, Error> {
        let position = self
            .effects
            .iter()
            .position(|(effect_id, _)| *effect_id == id)
            .ok_or(Error::EffectNotFoundError(id))?;
        Ok(self.effects.remove(position).1)
    }

    /// Name of the effect with the given id.
    pub fn effect_name(&self, id: EffectId) -> Option<&'static str> {
        self.effects
            .iter()
            .find(|(effect_id, _)| *effect_id == id)
            .map(|(_, effect)| effect.name())
    }

    /// Run all effects in order on the given buffer.
    pub fn process(&mut self, output: &mut [f32], time: &RenderTime) {
        for (_, effect) in self.effects.iter_mut() {
            effect.process(output, time);
        }
    }

    /// Forward a parameter update to the effect with the given id.
    pub fn process_parameter_update(
        &mut self,
        effect_id: EffectId,
        parameter_id: FourCC,
        value: f32,
    ) -> Result<(), Error> {
        let (_, effect) = self
            .effects
            .iter_mut()
            .find(|(id, _)| *id == effect_id)
            .ok_or(Error::EffectNotFoundError(effect_id))?;
        effect.process_parameter_update(parameter_id, value)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::widener::WidenerEffect;

    #[test]
    fn chain() {
        let mut chain = EffectChain::new();
        let id = chain
            .add(Box::new(WidenerEffect::new()), 44100, 2, 64)
            .unwrap();
        assert_eq!(chain.effect_name(id), Some(WidenerEffect::EFFECT_NAME));
        assert!(chain
            .process_parameter_update(id, WidenerEffect::MIX_ID, 0.5)
            .is_ok());
        assert!(chain
            .process_parameter_update(id, FourCC(*b"????"), 0.5)
            .is_err());
        assert!(matches!(
            chain.process_parameter_update(id + 1, WidenerEffect::MIX_ID, 0.5),
            Err(Error::EffectNotFoundError(_))
        ));

        let mut buffer = vec![0.5; 128];
        chain.process(&mut buffer, &RenderTime::default());
        assert!(buffer.iter().all(|v| v.is_finite()));

        assert!(chain.remove(id).is_ok());
        assert!(chain.is_empty());
        assert!(chain.remove(id).is_err());
    }

    #[test]
    fn rejects_mono() {
        let mut chain = EffectChain::new();
        assert!(chain
            .add(Box::new(WidenerEffect::new()), 44100, 1, 64)
            .is_err());
        assert_eq!(chain.len(), 0);
    }
}
