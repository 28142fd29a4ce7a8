//! Defines the [`Termination`] trait.

use std::{convert::Infallible, fmt::Debug, process};

/// Extends [`std::process::Termination`] with a way to inspect the outcome.
///
/// Programs that open a preview window hand their body to [`crate::gui::run`], which never
/// returns: the windowing event loop owns the main thread, so the process is exited from the
/// thread running the program body, with a status derived from this trait.
pub trait Termination: process::Termination {
    fn is_success(&self) -> bool;
}

impl Termination for Infallible {
    fn is_success(&self) -> bool {
        match *self {}
    }
}

impl Termination for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn is_success(&self) -> bool {
        match self {
            Ok(term) => term.is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results() {
        assert!(Ok::<(), anyhow::Error>(()).is_success());
        assert!(!Err::<(), _>(anyhow::anyhow!("camera unplugged")).is_success());
    }
}
