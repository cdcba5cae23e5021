//! Routing core for the JuriAid case-intake flow.
//!
//! An orchestrator reply is decoded into [`model::AnalysisResponse`], reduced to an
//! [`classify::OutcomePayload`] and mapped to a [`decide::Directive`] that tells the
//! presentation layer what to show next.

pub mod classify;
pub mod decide;
pub mod error;
pub mod intake;
pub mod model;

pub use classify::{classify, classify_at, OutcomePayload, ToolFlags};
pub use decide::{
    categorize, decide, route, CaseMeta, ChoiceOption, Destination, Directive, OutcomeCategory,
    Routed, ViewPayload,
};
pub use error::{ClassificationError, IntakeError, ResultsDefect};
pub use intake::{NewCase, Priority};
