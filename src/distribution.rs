//! Stochastic parameter generation: mixtures of weighted distribution components, pinned
//! constants and scripted override sequences.

use std::collections::VecDeque;

use rand::{rngs::SmallRng, SeedableRng};
use strum::{Display, EnumCount, EnumString, VariantNames};

use crate::Error;

// -------------------------------------------------------------------------------------------------

pub mod random;
pub mod transform;

pub use transform::Transform;

// -------------------------------------------------------------------------------------------------

/// Distribution family of a single mixture component.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumCount, VariantNames,
)]
pub enum DistributionType {
    /// Always draws 0, so the component returns its mean.
    #[default]
    Constant,
    /// Uniform in range [0, 1).
    Uniform,
    /// Standard normal.
    Gaussian,
    /// Standard Cauchy.
    Cauchy,
    /// Unit rate exponential.
    Exponential,
    /// Gamma with the component's shape and unit scale.
    Gamma,
}

/// Sign adjustment of a component's unit draw, applied before scaling and shifting.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumCount, VariantNames,
)]
pub enum Polarity {
    /// `raw * scale + mean`
    #[default]
    Unchanged,
    /// `|raw| * scale + mean`
    Positive,
    /// `-|raw| * scale + mean`
    Negative,
    /// Positive or negative, picked by a fair coin flip. Allows one sided families such as
    /// the exponential one to produce symmetric output.
    RandomSymmetric,
}

/// How components of a mixture get selected.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumCount, VariantNames,
)]
pub enum MixtureMode {
    /// Select a component randomly, with a probability proportional to its weight.
    #[default]
    Stochastic,
    /// Cycle through all components in order.
    Sequential,
}

// -------------------------------------------------------------------------------------------------

/// A single weighted component of a [`Distribution`] mixture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    pub kind: DistributionType,
    pub mean: f64,
    pub scale: f64,
    pub polarity: Polarity,
    /// Shape parameter. Only used by [`DistributionType::Gamma`].
    pub shape: f64,
    weight: f64,
}

impl Component {
    pub fn new(kind: DistributionType, mean: f64, scale: f64) -> Self {
        Self {
            kind,
            mean,
            scale,
            polarity: Polarity::Unchanged,
            shape: 1.0,
            weight: 1.0,
        }
    }

    /// A component which always returns the given value.
    pub fn constant(value: f64) -> Self {
        Self::new(DistributionType::Constant, value, 0.0)
    }

    pub fn with_polarity(self, polarity: Polarity) -> Self {
        Self { polarity, ..self }
    }

    pub fn with_shape(self, shape: f64) -> Self {
        Self { shape, ..self }
    }

    /// Relative weight. Weights get normalized when the component is added to a mixture.
    pub fn with_weight(self, weight: f64) -> Self {
        Self { weight, ..self }
    }

    /// The component's weight. Normalized, when the component is part of a mixture.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    fn draw(&self, rng: &mut SmallRng) -> f64 {
        let raw = match self.kind {
            DistributionType::Constant => 0.0,
            DistributionType::Uniform => random::uniform(rng),
            DistributionType::Gaussian => random::gaussian(rng),
            DistributionType::Cauchy => random::cauchy(rng),
            DistributionType::Exponential => random::exponential(rng),
            DistributionType::Gamma => random::gamma(rng, self.shape),
        };
        let signed = match self.polarity {
            Polarity::Unchanged => raw,
            Polarity::Positive => raw.abs(),
            Polarity::Negative => -raw.abs(),
            Polarity::RandomSymmetric => {
                if random::coin(rng) {
                    -raw.abs()
                } else {
                    raw.abs()
                }
            }
        };
        signed * self.scale + self.mean
    }
}

// -------------------------------------------------------------------------------------------------

/// A configurable statistical sampler, producing one scalar per [`sample`](Self::sample) call.
///
/// Values get resolved in the following order, first match wins:
/// 1. pending override values (FIFO), see [`push_override`](Self::push_override),
/// 2. a pinned constant, see [`set_constant`](Self::set_constant),
/// 3. a draw from the weighted component mixture.
///
/// Results then optionally get rounded to integers and transformed.
///
/// An empty mixture without a constant or overrides samples NaN: callers treat NaN as
/// "no value" (e.g. trigger rates as "never fire").
#[derive(Debug)]
pub struct Distribution {
    constant: Option<f64>,
    components: Vec<Component>,
    mixture_mode: MixtureMode,
    sequence_index: usize,
    integer_mode: bool,
    overrides: VecDeque<f64>,
    transform: Option<Transform>,
    rng: SmallRng,
}

impl Default for Distribution {
    fn default() -> Self {
        Self::new()
    }
}

impl Distribution {
    /// Default capacity of the override queue.
    const OVERRIDES_CAPACITY: usize = 16;

    /// Create a new empty distribution with a randomly seeded random number generator.
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }

    /// Create a new empty distribution with a deterministically seeded random number generator.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    /// Create a new distribution, which is pinned to the given constant value.
    pub fn from_constant(value: f64) -> Self {
        let mut distribution = Self::new();
        distribution.set_constant(value);
        distribution
    }

    /// Create a new distribution with the given single component.
    pub fn from_component(component: Component) -> Self {
        let mut distribution = Self::new();
        distribution.set_single_component(component);
        distribution
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            constant: None,
            components: Vec::new(),
            mixture_mode: MixtureMode::default(),
            sequence_index: 0,
            integer_mode: false,
            overrides: VecDeque::with_capacity(Self::OVERRIDES_CAPACITY),
            transform: None,
            rng,
        }
    }

    /// Re-seed the internal random number generator, e.g. to create reproducible sequences.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Draw a single value.
    pub fn sample(&mut self) -> f64 {
        let value = if let Some(value) = self.overrides.pop_front() {
            value
        } else if let Some(value) = self.constant {
            value
        } else {
            let index = match self.mixture_mode {
                MixtureMode::Stochastic => self.select_stochastic_component(),
                MixtureMode::Sequential => self.select_sequential_component(),
            };
            match index {
                Some(index) => self.components[index].draw(&mut self.rng),
                None => return f64::NAN,
            }
        };
        let value = if self.integer_mode {
            (value + 0.5).floor()
        } else {
            value
        };
        // temporarily move out the transform, so it can access the distribution
        if let Some(mut transform) = self.transform.take() {
            let transformed = transform.apply(value, self);
            self.transform = Some(transform);
            transformed
        } else {
            value
        }
    }

    fn select_stochastic_component(&mut self) -> Option<usize> {
        match self.components.len() {
            0 => None,
            1 => Some(0),
            count => {
                let draw = random::uniform(&mut self.rng);
                let mut sum = 0.0;
                for (index, component) in self.components.iter().enumerate() {
                    sum += component.weight;
                    if draw < sum {
                        return Some(index);
                    }
                }
                // rounding errors in the weight sum
                Some(count - 1)
            }
        }
    }

    fn select_sequential_component(&mut self) -> Option<usize> {
        if self.components.is_empty() {
            return None;
        }
        if self.sequence_index >= self.components.len() {
            self.sequence_index = 0;
        }
        let index = self.sequence_index;
        self.sequence_index += 1;
        Some(index)
    }

    // ---------------------------------------------------------------------------------------------

    /// The pinned constant value, if any.
    pub fn constant(&self) -> Option<f64> {
        self.constant
    }

    /// Pin the distribution to a constant value. Short-circuits the mixture until cleared.
    pub fn set_constant(&mut self, value: f64) {
        self.constant = Some(value);
    }

    /// Remove a pinned constant, so the mixture gets sampled again.
    pub fn clear_constant(&mut self) {
        self.constant = None;
    }

    // ---------------------------------------------------------------------------------------------

    /// Number of queued override values.
    pub fn pending_overrides(&self) -> usize {
        self.overrides.len()
    }

    /// Queue a value, which gets returned by a following `sample` call before anything else.
    pub fn push_override(&mut self, value: f64) {
        self.overrides.push_back(value);
    }

    /// Queue a sequence of values. See [`push_override`](Self::push_override).
    pub fn push_overrides<I: IntoIterator<Item = f64>>(&mut self, values: I) {
        self.overrides.extend(values);
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    // ---------------------------------------------------------------------------------------------

    pub fn mixture_mode(&self) -> MixtureMode {
        self.mixture_mode
    }

    pub fn set_mixture_mode(&mut self, mode: MixtureMode) {
        self.mixture_mode = mode;
    }

    pub fn is_integer_mode(&self) -> bool {
        self.integer_mode
    }

    /// When enabled, all results get rounded to the nearest integer, rounding half up.
    pub fn set_integer_mode(&mut self, enabled: bool) {
        self.integer_mode = enabled;
    }

    // ---------------------------------------------------------------------------------------------

    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    /// Apply the given pure function to all results.
    pub fn set_transform(&mut self, transform: fn(f64) -> f64) {
        self.transform = Some(Transform::Plain(transform));
    }

    /// Apply the given stateful function to all results.
    pub fn set_extended_transform<F>(&mut self, transform: F)
    where
        F: FnMut(f64, &Distribution) -> f64 + Send + 'static,
    {
        self.transform = Some(Transform::Extended(Box::new(transform)));
    }

    pub fn clear_transform(&mut self) {
        self.transform = None;
    }

    // ---------------------------------------------------------------------------------------------

    /// All mixture components with their normalized weights.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    /// Normalized weight of the component at the given index.
    pub fn component_weight(&self, index: usize) -> Option<f64> {
        self.components.get(index).map(|c| c.weight)
    }

    /// Add a new component to the mixture and return its index. Adding a component removes a
    /// pinned constant.
    pub fn add_component(&mut self, component: Component) -> Result<usize, Error> {
        Self::validate_weight(component.weight)?;
        self.constant = None;
        self.components.push(component);
        self.normalize_weights();
        Ok(self.components.len() - 1)
    }

    /// Remove the component at the given index.
    pub fn remove_component(&mut self, index: usize) -> Result<Component, Error> {
        if index >= self.components.len() {
            return Err(Error::ParameterError(format!(
                "component index {index} out of range (component count: {})",
                self.components.len()
            )));
        }
        let component = self.components.remove(index);
        self.normalize_weights();
        Ok(component)
    }

    /// Remove all components from the mixture.
    pub fn remove_all_components(&mut self) {
        self.components.clear();
        self.sequence_index = 0;
    }

    /// Set the relative weight of a component and renormalize all weights.
    pub fn set_component_weight(&mut self, index: usize, weight: f64) -> Result<(), Error> {
        Self::validate_weight(weight)?;
        let component_count = self.components.len();
        let component = self.components.get_mut(index).ok_or_else(|| {
            Error::ParameterError(format!(
                "component index {index} out of range (component count: {component_count})"
            ))
        })?;
        component.weight = weight;
        self.normalize_weights();
        Ok(())
    }

    /// Replace the mixture with the given single component.
    pub fn set_single_component(&mut self, component: Component) {
        self.remove_all_components();
        self.constant = None;
        self.components.push(component.with_weight(1.0));
    }

    /// Replace the mixture with a discrete distribution over the given values. Without weights,
    /// all values are equally likely.
    pub fn set_discrete(&mut self, values: &[f64], weights: Option<&[f64]>) -> Result<(), Error> {
        if let Some(weights) = weights {
            if weights.len() != values.len() {
                return Err(Error::ParameterError(format!(
                    "discrete weight count ({}) must match the value count ({})",
                    weights.len(),
                    values.len()
                )));
            }
            for weight in weights {
                Self::validate_weight(*weight)?;
            }
        }
        self.remove_all_components();
        self.constant = None;
        for (index, value) in values.iter().enumerate() {
            let weight = weights.map_or(1.0, |weights| weights[index]);
            self.components
                .push(Component::constant(*value).with_weight(weight));
        }
        self.normalize_weights();
        Ok(())
    }

    fn validate_weight(weight: f64) -> Result<(), Error> {
        if weight.is_finite() && weight >= 0.0 {
            Ok(())
        } else {
            Err(Error::ParameterError(format!(
                "component weight must be a finite, positive number, but is {weight}"
            )))
        }
    }

    fn normalize_weights(&mut self) {
        if self.components.is_empty() {
            return;
        }
        let sum = self.components.iter().map(|c| c.weight).sum::<f64>();
        if sum > 0.0 {
            for component in self.components.iter_mut() {
                component.weight /= sum;
            }
        } else {
            let weight = 1.0 / self.components.len() as f64;
            for component in self.components.iter_mut() {
                component.weight = weight;
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_sum(distribution: &Distribution) -> f64 {
        distribution.components().iter().map(|c| c.weight()).sum()
    }

    #[test]
    fn weight_normalization() {
        let mut distribution = Distribution::with_seed(0);
        distribution
            .add_component(Component::constant(1.0).with_weight(2.0))
            .unwrap();
        assert!((weight_sum(&distribution) - 1.0).abs() < 1e-12);
        distribution
            .add_component(Component::constant(2.0).with_weight(6.0))
            .unwrap();
        assert!((weight_sum(&distribution) - 1.0).abs() < 1e-12);
        assert!((distribution.component_weight(0).unwrap() - 0.25).abs() < 1e-12);

        distribution.set_component_weight(0, 3.0).unwrap();
        assert!((weight_sum(&distribution) - 1.0).abs() < 1e-12);

        distribution
            .add_component(Component::constant(3.0).with_weight(0.5))
            .unwrap();
        distribution.remove_component(1).unwrap();
        assert_eq!(distribution.components().len(), 2);
        assert!((weight_sum(&distribution) - 1.0).abs() < 1e-12);

        // all zero weights fall back to equal weights
        distribution.set_component_weight(0, 0.0).unwrap();
        distribution.set_component_weight(1, 0.0).unwrap();
        assert_eq!(distribution.component_weight(0), Some(0.5));
        assert_eq!(distribution.component_weight(1), Some(0.5));

        assert!(distribution.set_component_weight(5, 1.0).is_err());
        assert!(distribution.set_component_weight(0, -1.0).is_err());
        assert!(distribution.set_component_weight(0, f64::NAN).is_err());
        assert!(distribution.remove_component(5).is_err());
    }

    #[test]
    fn empty_mixture_is_nan() {
        let mut distribution = Distribution::with_seed(0);
        assert!(distribution.sample().is_nan());
        distribution.set_integer_mode(true);
        distribution.set_transform(|_| 1.0);
        assert!(distribution.sample().is_nan());
    }

    #[test]
    fn overrides_are_fifo() {
        let mut distribution = Distribution::with_seed(0);
        distribution.set_constant(7.0);
        distribution.push_overrides([1.0, 2.0]);
        distribution.push_override(3.0);
        assert_eq!(distribution.pending_overrides(), 3);
        assert_eq!(distribution.sample(), 1.0);
        assert_eq!(distribution.sample(), 2.0);
        assert_eq!(distribution.sample(), 3.0);
        assert_eq!(distribution.pending_overrides(), 0);
        assert_eq!(distribution.sample(), 7.0);

        distribution.push_override(4.0);
        distribution.clear_overrides();
        assert_eq!(distribution.sample(), 7.0);
    }

    #[test]
    fn constants() {
        let mut distribution =
            Distribution::from_component(Component::new(DistributionType::Uniform, 10.0, 1.0));
        distribution.set_constant(5.0);
        assert_eq!(distribution.sample(), 5.0);
        distribution.clear_constant();
        let value = distribution.sample();
        assert!((10.0..11.0).contains(&value));

        // adding components removes the constant
        distribution.set_constant(5.0);
        distribution.add_component(Component::constant(1.0)).unwrap();
        assert_eq!(distribution.constant(), None);
    }

    #[test]
    fn sequential_mixture() {
        let mut distribution = Distribution::with_seed(0);
        distribution.set_discrete(&[1.0, 2.0, 3.0], None).unwrap();
        distribution.set_mixture_mode(MixtureMode::Sequential);
        let values = (0..7).map(|_| distribution.sample()).collect::<Vec<_>>();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn stochastic_mixture() {
        let mut distribution = Distribution::with_seed(42);
        distribution
            .set_discrete(&[0.0, 1.0], Some(&[1.0, 3.0]))
            .unwrap();
        assert_eq!(distribution.component_weight(1), Some(0.75));
        let count = 10000;
        let ones = (0..count).filter(|_| distribution.sample() == 1.0).count();
        let ratio = ones as f64 / count as f64;
        assert!((ratio - 0.75).abs() < 0.03, "{ratio}");

        assert!(distribution.set_discrete(&[0.0, 1.0], Some(&[1.0])).is_err());
    }

    #[test]
    fn integer_rounding() {
        let mut distribution = Distribution::with_seed(0);
        distribution.set_integer_mode(true);
        distribution.push_overrides([2.5, 2.49, -2.5, -2.51]);
        assert_eq!(distribution.sample(), 3.0);
        assert_eq!(distribution.sample(), 2.0);
        assert_eq!(distribution.sample(), -2.0);
        assert_eq!(distribution.sample(), -3.0);
    }

    #[test]
    fn polarity() {
        let mut distribution = Distribution::with_seed(1);
        distribution.set_single_component(
            Component::new(DistributionType::Gaussian, 10.0, 2.0).with_polarity(Polarity::Positive),
        );
        assert!((0..1000).all(|_| distribution.sample() >= 10.0));

        distribution.set_single_component(
            Component::new(DistributionType::Gaussian, 10.0, 2.0).with_polarity(Polarity::Negative),
        );
        assert!((0..1000).all(|_| distribution.sample() <= 10.0));

        // symmetric exponential (Laplace)
        distribution.set_single_component(
            Component::new(DistributionType::Exponential, 0.0, 1.0)
                .with_polarity(Polarity::RandomSymmetric),
        );
        let values = (0..10000).map(|_| distribution.sample()).collect::<Vec<_>>();
        let negatives = values.iter().filter(|v| **v < 0.0).count();
        assert!((negatives as f64 / values.len() as f64 - 0.5).abs() < 0.03);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < 0.05, "{mean}");
    }

    #[test]
    fn scale_and_shift() {
        let mut distribution = Distribution::with_seed(3);
        distribution.set_single_component(Component::new(DistributionType::Uniform, -1.0, 2.0));
        for _ in 0..1000 {
            let value = distribution.sample();
            assert!((-1.0..1.0).contains(&value));
        }
        distribution.set_single_component(Component::new(DistributionType::Constant, 4.0, 10.0));
        assert_eq!(distribution.sample(), 4.0);
    }

    #[test]
    fn transforms() {
        let mut distribution = Distribution::with_seed(0);
        distribution.set_constant(-20.0);
        distribution.set_transform(transform::db_to_gain);
        assert!((distribution.sample() - 0.1).abs() < 1e-12);

        // extended transforms can keep state and access their distribution
        let mut counter = 0.0;
        distribution.set_extended_transform(move |value, distribution| {
            counter += 1.0;
            value + counter + distribution.pending_overrides() as f64
        });
        assert_eq!(distribution.sample(), -19.0);
        distribution.push_override(0.0);
        assert_eq!(distribution.sample(), 2.0);

        // transforms run after integer rounding
        distribution.set_transform(|value| value / 2.0);
        distribution.set_integer_mode(true);
        distribution.push_override(2.6);
        assert_eq!(distribution.sample(), 1.5);

        distribution.clear_transform();
        assert!(!distribution.has_transform());
        assert_eq!(distribution.sample(), -20.0);
    }

    #[test]
    fn seeded_determinism() {
        let component = Component::new(DistributionType::Gaussian, 0.0, 1.0);
        let mut a = Distribution::with_seed(123);
        let mut b = Distribution::with_seed(123);
        a.set_single_component(component);
        b.set_single_component(component);
        for _ in 0..100 {
            assert_eq!(a.sample(), b.sample());
        }
    }
}
