/// Exit codes for CI/automation.
pub const SUCCESS: i32 = 0;
pub const USAGE: i32 = 1;
pub const GENDOC_FAILED: i32 = 2;
/// Compilation errors present, or test failures at run time.
pub const ERRORS: i32 = 3;
