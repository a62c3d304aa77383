// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![deny(unsafe_code)]

//! # il2cpp-bridge
//!
//! The bytecode-generating core of an IL2CPP interop generator. Given the
//! managed metadata an IL2CPP build leaves behind, where every method body
//! was compiled to native code and stripped from the assemblies, it
//! rewrites each assembly so that managed code can call into and be called
//! from the native runtime.
//!
//! ## Features
//!
//! - **Two type universes** - `System.*` primitives for the bridging layer,
//!   `Il2CppSystem.*` object wrappers for the native layer, and conversions
//!   between them
//! - **Initialization classes** - per-type companions that resolve native
//!   class pointers, field offsets and method handles once, lazily
//! - **ABI bridge** - a native call body for every stripped method, with
//!   argument marshalling shared per assembly and parameter count
//! - **Body translation** - recovered original bodies rewritten instruction
//!   by instruction, falling back to the bridge when that cannot be done
//!   soundly
//! - **Unstripping** - members and bodies recovered from companion
//!   assemblies
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use il2cpp_bridge::prelude::*;
//!
//! let mut ctx = AppContext::new();
//! // ... populate the context with the game's assemblies ...
//!
//! let config = GeneratorConfig::default();
//! PassScheduler::from_config(&config)?.run(&mut ctx)?;
//!
//! let stats = DerivedStats::from_log(&ctx.events);
//! println!("{} translated, {} bridged", stats.translations, stats.bridge_bodies);
//! # Ok::<(), il2cpp_bridge::Error>(())
//! ```
//!
//! ## Architecture
//!
//! The passes in [`passes`] run once each, in a fixed order, over a single
//! [`AppContext`]. They communicate through the typed side tables in
//! [`model::SideTables`]; a datum an earlier pass guarantees is required,
//! and its absence is reported as [`Error::Invariant`].
//!
//! ### Instruction model
//!
//! [`assembly`] holds the opcode set and the symbolic instruction lists
//! every generated body is built from. Branch targets are instruction
//! identities, so splicing instructions never invalidates a label.
//!
//! ### Type system
//!
//! [`typesystem`] defines [`typesystem::TypeExpr`] and the folds over it.
//! [`signature`] describes companion assemblies independently of the arena,
//! and [`resolver`] maps those signatures onto arena nodes.
//!
//! ### Compilers
//!
//! [`translation`] recovers and translates original bodies. The ABI bridge
//! lives in [`passes::NativeMethodBodyPass`].
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. A method that cannot be
//! translated is not an error: the translator reports
//! [`translation::Translation::Unsupported`] and the method is bridged.
//! Missing optional input is logged through [`log`] and skipped.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use il2cpp_bridge::prelude::*;
///
/// let mut ctx = AppContext::new();
/// PassScheduler::from_config(&GeneratorConfig::minimal())?.run(&mut ctx)?;
/// # Ok::<(), il2cpp_bridge::Error>(())
/// ```
pub mod prelude;

/// The neutral bytecode model: opcodes, instruction lists, method bodies.
pub mod assembly;

/// Pass trait, scheduler and the run's event log.
pub mod compiler;

/// Generator configuration and well-known names.
pub mod config;

/// Metadata tokens.
pub mod metadata;

/// The application arena and its side tables.
pub mod model;

/// The generator passes, in execution order.
pub mod passes;

/// Mapping of companion signatures onto the arena.
pub mod resolver;

/// Handles to the interop runtime-support members generated code calls.
pub mod runtime;

/// Arena-independent signatures of companion assemblies.
pub mod signature;

/// Original-body recovery and instruction-level translation.
pub mod translation;

/// Type expressions and the folds over them.
pub mod typesystem;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use il2cpp_bridge::{AppContext, GeneratorConfig, PassScheduler, Result};
///
/// fn generate(ctx: &mut AppContext) -> Result<()> {
///     PassScheduler::from_config(&GeneratorConfig::default())?.run(ctx)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `il2cpp-bridge` Error type
///
/// Structural failures of a run. Per-method translation failures are not
/// errors; see [`translation::Translation`].
///
/// # Examples
///
/// ```rust,no_run
/// use il2cpp_bridge::{AppContext, Error, GeneratorConfig, PassScheduler};
///
/// let mut ctx = AppContext::new();
/// let scheduler = PassScheduler::from_config(&GeneratorConfig::default())?;
/// match scheduler.run(&mut ctx) {
///     Ok(()) => println!("done"),
///     Err(Error::AmbiguousMethod(name)) => println!("cannot tell {name} apart from its overloads"),
///     Err(e) => println!("Error: {e}"),
/// }
/// # Ok::<(), Error>(())
/// ```
pub use error::Error;

pub use compiler::PassScheduler;
pub use config::GeneratorConfig;
pub use model::AppContext;
