//! DefinitelyTyped checkout model: descriptor types and enumeration.

pub mod descriptor;
pub mod enumerate;
