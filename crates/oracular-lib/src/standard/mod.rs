//! The bundled call library.
//!
//! Loaded into a fresh [`CallFactory`] at engine construction. Hosts can
//! register further calls through the factory before any expression is
//! acquired.

pub mod boolean;
pub mod strings;
pub mod template;

#[cfg(test)]
mod boolean_tests;

pub use template::define_template;

use crate::Result;
use crate::calls::CallFactory;

/// Registers every bundled call.
pub fn load(factory: &mut CallFactory) -> Result<()> {
    boolean::load(factory)?;
    strings::load(factory)?;
    template::load(factory)?;
    Ok(())
}
