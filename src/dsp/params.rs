//! Stage parameter model
//!
//! Every stage owns its parameters through an `Arc<ParamSet>`. Values are
//! stored as the bit pattern of an `f64` inside an `AtomicU64`, so an editor
//! thread can update a parameter while the audio thread is processing and the
//! reader always sees either the old or the new value.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{AuraError, Result};

/// Static description of one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            default,
        }
    }
}

/// A named float parameter with a declared range
#[derive(Debug)]
pub struct StageParameter {
    spec: ParamSpec,
    value: AtomicU64,
}

impl StageParameter {
    fn new(spec: ParamSpec) -> Self {
        let value = AtomicU64::new(spec.default.to_bits());
        Self { spec, value }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn range(&self) -> (f64, f64) {
        (self.spec.min, self.spec.max)
    }

    pub fn default_value(&self) -> f64 {
        self.spec.default
    }

    /// Current value
    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }

    fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.spec.min && value <= self.spec.max
    }

    fn store(&self, value: f64) {
        self.value.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// The parameter set of one stage
///
/// The `version` counter is bumped on every successful write so stages can
/// cheaply detect that derived state (filter coefficients, time constants)
/// must be recomputed.
#[derive(Debug)]
pub struct ParamSet {
    stage: &'static str,
    params: Vec<StageParameter>,
    version: AtomicU64,
}

impl ParamSet {
    pub fn new(stage: &'static str, specs: Vec<ParamSpec>) -> Self {
        Self {
            stage,
            params: specs.into_iter().map(StageParameter::new).collect(),
            version: AtomicU64::new(0),
        }
    }

    /// Stage kind this set belongs to (used in error messages)
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over parameters in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &StageParameter> {
        self.params.iter()
    }

    /// Current write version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn find(&self, name: &str) -> Result<&StageParameter> {
        self.params
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| AuraError::UnknownParameter {
                stage: self.stage.to_string(),
                param: name.to_string(),
            })
    }

    /// Read a parameter by name
    pub fn get(&self, name: &str) -> Result<f64> {
        Ok(self.find(name)?.get())
    }

    /// Read a parameter by declaration index
    ///
    /// Stages use this on the processing path; indices come from their own
    /// constant tables so they are always in range.
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.params[index].get()
    }

    /// Validate and store a new value
    ///
    /// Out-of-range or non-finite values are rejected and leave the set
    /// untouched.
    pub fn set(&self, name: &str, value: f64) -> Result<()> {
        let param = self.find(name)?;
        if !param.contains(value) {
            let (min, max) = param.range();
            return Err(AuraError::InvalidParameter {
                stage: self.stage.to_string(),
                param: name.to_string(),
                value,
                min,
                max,
            });
        }
        param.store(value);
        self.version.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Apply a batch of values, validating all of them before writing any
    pub fn apply(&self, values: &BTreeMap<String, f64>) -> Result<()> {
        for (name, &value) in values {
            let param = self.find(name)?;
            if !param.contains(value) {
                let (min, max) = param.range();
                return Err(AuraError::InvalidParameter {
                    stage: self.stage.to_string(),
                    param: name.clone(),
                    value,
                    min,
                    max,
                });
            }
        }
        for (name, &value) in values {
            self.set(name, value)?;
        }
        Ok(())
    }

    /// Snapshot all values by name
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.params
            .iter()
            .map(|p| (p.name().to_string(), p.get()))
            .collect()
    }

    /// Create an independent copy holding the same values
    pub fn duplicate(&self) -> Self {
        let copy = Self::new(
            self.stage,
            self.params.iter().map(|p| p.spec.clone()).collect(),
        );
        for (dst, src) in copy.params.iter().zip(&self.params) {
            dst.store(src.get());
        }
        copy
    }
}
