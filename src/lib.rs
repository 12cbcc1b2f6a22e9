//! Core library for the aideon-tokens command line application.
//!
//! The library keeps a design-token repository in two equivalent shapes: a
//! single canonical document and a modular directory of per-set files. The
//! transformations between them live in [`aideon::tokens::split`] and
//! [`aideon::tokens::consolidate`], the checks that certify a modular
//! directory under [`aideon::tokens::validate`], and the machinery that makes
//! mutations reversible in [`aideon::tokens::backup`] and
//! [`aideon::tokens::recovery`]. [`aideon::tokens::sync`] wires them together
//! for the command-line interface.

pub mod aideon;

pub use aideon::tokens::{
    Result, TokenError, backup, config, consolidate, diff, error, io, logging, model, recovery,
    reference, split, sync, validate, watch,
};
