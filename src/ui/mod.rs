//! Terminal output helpers
//!
//! Interactive terminals get `cliclack` styled steps and `indicatif` bars.
//! Pipes and CI get plain, line-oriented text.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, remark, step_error_detail,
    step_info, step_ok, step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::FetchProgress;
