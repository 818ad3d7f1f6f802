pub mod error;
pub mod evaluator;
pub mod methods;
pub mod render;
pub mod scope;
pub mod slots;
pub mod text;
pub mod value;

pub use error::{RenderError, RuntimeError};
pub use evaluator::evaluate;
pub use render::{RenderOptions, render, render_template, render_with_options};
pub use scope::{Frame, Scope, ScopeBuilder};
pub use slots::{ContributedSource, SlotLookup, SlotRegistry, no_slots};
pub use value::{Lambda, Value, ValueKind};
