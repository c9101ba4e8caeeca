//! Terminal side of the apply engine
//!
//! The declarative crate plans, diffs and drives materialization. This
//! module renders diffs and progress and asks for confirmation.

pub mod differ;
pub mod executor;

pub use differ::display_diff;
pub use executor::{BarProgress, PromptConfirm, print_partial, print_summary};
