//! Unit emission trait - backend abstraction
//!
//! Lets the generator write validator units in more than one textual form.

use crate::backend::ValidatorUnit;
use crate::utils::Result;

/// Renders a validator unit to source text
pub trait UnitEmitter {
    /// Render one unit
    fn emit(&mut self, unit: &ValidatorUnit) -> Result<String>;

    /// File extension of emitted units, without the dot
    fn extension(&self) -> &str;

    /// Get the emitter name
    fn name(&self) -> &str;
}
