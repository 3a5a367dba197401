//! User-visible message strings, collected in one place so operations and
//! handlers share the exact wording.

pub const ANALYZER_READY: &str = "Analyzer is ready";
pub const INDEXER_READY: &str = "Indexer is ready";
pub const TYPECHECKING: &str = "Typechecking...";
pub const FAILED_REFACTORING: &str =
  "The refactoring could not be applied (more info in the logs)";
pub const FULL_TYPES_ENABLED_ON: &str = "Qualified type display enabled";
pub const FULL_TYPES_ENABLED_OFF: &str = "Qualified type display disabled";
pub const TRANSPORT_WARNING: &str =
  "A transport error occurred, we'll try to recover... For more information, have a look at the logs in the cache directory";
pub const SYMBOL_SEARCH_SYMBOL_REQUIRED: &str = "Must provide a keyword to search for";
pub const SYMBOL_NAME_REQUIRED: &str = "Must provide a fully-qualified symbol name";
pub const UNKNOWN_SYMBOL: &str = "Symbol not found";
pub const NOT_A_SYMBOL: &str = "Not a valid symbol under the cursor";
pub const PACKAGE_INSPECT_CURRENT: &str = "Inspecting the package of the current file";
pub const NOTIFY_BREAK: &str = "Execution stopped at";
pub const MISSING_DEBUG_CLASS: &str = "You must specify a class to debug";
pub const GO_TO: &str = "Go to";
