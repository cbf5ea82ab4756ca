pub mod icons;
pub mod report;

pub use report::{print_dispatch_report, print_run_report, print_state};
