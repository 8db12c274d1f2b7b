mod apply;
mod run;

pub use run::run;

#[cfg(test)]
pub(crate) use {apply::UpdateOutcome, run::sync};
