//! Timeline rendering decisions

mod bucket;
mod merger;

pub use bucket::{TODAY, YESTERDAY, bucket_label};
pub use merger::{MergeView, RenderOp, RenderPlan, merge_batch, merge_local, render_history};
