//! Relocation Journey Engine
//!
//! Task graph, journey phase resolution, polymorphic subtask completion, and
//! locale overlays for people moving to Germany.
//!
//! The static side (cities, phases, modules, tasks, platform directory, locale
//! trees) is loaded once into an immutable [`Journey`] snapshot. Everything a
//! user sees is derived from that snapshot plus a caller-owned
//! [`UserProgress`] record:
//!
//! - [`TaskGraph`] answers unlock and ordering queries over the dependency DAG
//! - [`subtask`] decides completion per variant behind [`CompletionCheckable`]
//! - [`phase`] maps elapsed time since arrival onto a [`JourneyPhase`]
//! - [`LocaleCatalog`] resolves dotted keys with overlay -> canonical -> key fallback
//!
//! # Example
//!
//! ```no_run
//! use journey_core::{ConfigLoader, UserContext, UserProgress};
//!
//! let journey = ConfigLoader::from_env().load()?;
//! let progress = UserProgress::default();
//! let ctx = UserContext::new(Some("berlin"), Some("tr"), None, chrono::Utc::now());
//! let view = journey.task_list(&ctx, &progress)?;
//! for task in &view.tasks {
//!     println!("{} locked={}", task.title, task.locked);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod graph;
pub mod journey;
pub mod locale;
pub mod phase;
pub mod platforms;
pub mod progress;
pub mod store;
pub mod subtask;
pub mod task;

pub use catalog::{CatalogStore, City, JourneyPhase, Module, PhaseWindow};
pub use config::loader::ConfigLoader;
pub use config::TaskConfig;
pub use error::{
    CatalogIssue, ConfigError, ConfigIssue, CycleError, InvalidFieldValue, LoadError,
    MissingTranslationKey, QueryError, Rule, UpdateError, ValidationError,
};
pub use graph::{TaskFilter, TaskGraph};
pub use journey::{DocumentView, Journey, JourneyView, SubtaskView, TaskView, UserContext};
pub use locale::{LocaleCatalog, LocaleMeta, TextDirection};
pub use phase::{resolve_current_phase, PhaseBucket};
pub use platforms::{PlatformCatalog, PlatformService};
pub use progress::{ProgressUpdate, TaskProgress, TaskStatus, UserProgress, ValidatedUpdate};
pub use store::{FileProgressStore, MemoryProgressStore, ProgressStore};
pub use subtask::{CompletionCheckable, CompletionContext, CompletionPolicy, FieldConstraint, Subtask};
pub use task::{ActionLink, DocumentItem, Importance, Repeat, Task};
