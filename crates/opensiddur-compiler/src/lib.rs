/*
 * lib.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Document compilation and conditional-text resolution.
//!
//! The compiler turns JLPTEI source documents into self-contained
//! compiled documents: transclusion references are expanded against a
//! pinned generation of the [`index::ProjectIndex`], feature scopes and
//! three-valued conditionals are resolved, and standoff annotations are
//! merged in at the anchors they target.
//!
//! The top-level entry point is [`compile::compile`]; everything it
//! needs (index generation, [`settings::Settings`], cancellation token)
//! is passed explicitly, so concurrent compiles never share mutable
//! state.

pub mod annotate;
pub mod compile;
pub mod emit;
pub mod error;
pub mod expand;
pub mod index;
pub mod resolver;
pub mod scope;
pub mod settings;
pub mod truth;

pub use compile::{Compiled, StartRef, compile};
pub use error::{CompileError, CompileWarning, Result};
pub use index::{IndexHandle, NoteKind, NoteTarget, ProjectIndex, StandoffNote};
pub use settings::{Priorities, Settings};
