//! # FlowClaw Expressions
//!
//! The restricted expression language used by transform and condition steps —
//! the only user-authored code the engine ever evaluates.
//!
//! ## Accepted
//! | Form | Example |
//! |------|---------|
//! | Literals | `42`, `3.5`, `'text'`, `true`, `null`, `[1, 2]`, `{ok: true}` |
//! | Scope lookups | `input`, `plan` |
//! | Member access | `plan.files.length`, `items[0]`, `row['name']` |
//! | Comparison | `==` `===` `!=` `!==` `<` `<=` `>` `>=` |
//! | Logic | `&&` `\|\|` `!` (booleans only, short-circuit) |
//! | Arithmetic | `+ - * / %` (`+` concatenates strings) |
//! | Ternary | `cond ? a : b` |
//!
//! ## Refused
//! Function calls, assignment, iteration, computed bracket indices, and any
//! property named `__proto__`, `constructor`, or `prototype` — refused at
//! parse time, so prototype access is structurally impossible.

mod eval;
mod parser;
mod path;
mod token;

pub use eval::evaluate;
pub use parser::{contains_forbidden_name, parse, BinaryOp, Expr, MemberKey, UnaryOp, FORBIDDEN_NAMES};
pub use path::lookup_path;
pub use token::{tokenize, Token};
