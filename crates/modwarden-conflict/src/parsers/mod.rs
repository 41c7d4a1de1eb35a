//! Source parsers feeding the script and tweak detectors
//!
//! Both are pure: text in, structured facts out.

pub mod redscript;
pub mod tweak;

pub use redscript::{parse_redscript, AnnotationKind, ScriptOverride};
pub use tweak::{parse_tweak_source, TweakOp, TweakOperation, TweakParseError};
