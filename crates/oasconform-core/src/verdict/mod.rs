//! Verdict module - violations, findings, and the final pass/fail judgement

mod finding;
mod policy;
mod violation;

pub use finding::{Category, Finding};
pub use policy::{Verdict, VerdictStatus};
pub use violation::Violation;
