//! Applying server-computed refactorings: each request gets its own
//! monotonic id, and the diff that comes back is applied to the recorded
//! target file with the external diff tool.

use std::{
  collections::HashMap,
  path::{
    Path,
    PathBuf,
  },
  process::Command,
};

use tempfile::TempDir;
use tether_protocol::RefactorDiff;
use tracing::{
  debug,
  warn,
};

use crate::{
  editor::Editor,
  feedback,
};

const SUPPORTED_REFACTORINGS: [&str; 4] = ["Rename", "InlineLocal", "AddImport", "OrganizeImports"];

const DEFAULT_PATCH_PROGRAM: &str = "patch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefactorState {
  Requested,
  Applied,
  Failed,
}

#[derive(Debug)]
struct RefactorRecord {
  file:  PathBuf,
  state: RefactorState,
}

pub struct RefactorWorkflow {
  next_id:       u64,
  records:       HashMap<u64, RefactorRecord>,
  scratch:       Option<TempDir>,
  patch_program: String,
}

impl RefactorWorkflow {
  pub fn new() -> Self {
    let scratch = match tempfile::Builder::new().prefix("tether-diffs-").tempdir() {
      Ok(dir) => Some(dir),
      Err(err) => {
        warn!(error = %err, "could not create diff scratch directory");
        None
      },
    };
    Self {
      next_id: 1,
      records: HashMap::new(),
      scratch,
      patch_program: DEFAULT_PATCH_PROGRAM.to_string(),
    }
  }

  /// Substitute the external diff tool. The program is invoked as
  /// `<program> --reject-file=<path>.rej --prefix=<dir>/ <target> <diff>`
  /// and reports success through its exit status.
  pub fn set_patch_program(&mut self, program: impl Into<String>) {
    self.patch_program = program.into();
  }

  /// Allocate the next refactor id and record the file the eventual diff
  /// targets. Ids start at 1 and are never reused; records are never
  /// collected, an accepted bounded leak for session-lifetime processes.
  pub fn begin(&mut self, target: &Path) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    self.records.insert(id, RefactorRecord {
      file:  target.to_path_buf(),
      state: RefactorState::Requested,
    });
    id
  }

  pub fn state(&self, id: u64) -> Option<RefactorState> {
    self.records.get(&id).map(|record| record.state)
  }

  /// Apply a diff-bearing refactor response. Whatever the outcome, the
  /// editor reloads its buffer afterwards: the diff tool may have written a
  /// partial patch, and the on-disk state and the in-editor view must not
  /// diverge.
  pub fn apply(&mut self, editor: &dyn Editor, diff: &RefactorDiff) {
    let kind = diff.refactor_type.typehint.as_str();
    if !SUPPORTED_REFACTORINGS.contains(&kind) {
      warn!(%kind, "unsupported refactoring kind");
      return;
    }
    let Some(record) = self.records.get_mut(&diff.procedure_id) else {
      warn!(
        proc_id = diff.procedure_id,
        "refactor response with no matching request"
      );
      return;
    };

    let scratch = self
      .scratch
      .as_ref()
      .map(|dir| dir.path().to_path_buf())
      .unwrap_or_else(std::env::temp_dir);
    let base = record
      .file
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| "buffer".to_string());
    let reject = format!("--reject-file={}.rej", scratch.join(&base).display());
    let backup = format!("--prefix={}/", scratch.display());

    let outcome = Command::new(&self.patch_program)
      .arg(&reject)
      .arg(&backup)
      .arg(&record.file)
      .arg(&diff.diff)
      .output();

    record.state = match outcome {
      Ok(output) if output.status.success() => {
        debug!(proc_id = diff.procedure_id, %kind, "refactoring applied");
        RefactorState::Applied
      },
      Ok(output) => {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
          proc_id = diff.procedure_id,
          status = ?output.status.code(),
          stderr = %stderr.trim(),
          "diff tool reported failure"
        );
        editor.message(feedback::FAILED_REFACTORING);
        RefactorState::Failed
      },
      Err(err) => {
        warn!(error = %err, program = %self.patch_program, "could not run diff tool");
        editor.message(feedback::FAILED_REFACTORING);
        RefactorState::Failed
      },
    };

    editor.reload_buffer();
  }

  /// Drop the scratch directory; faults during cleanup are ignored.
  pub fn teardown(&mut self) {
    if let Some(dir) = self.scratch.take() {
      let _ = dir.close();
    }
  }
}

impl Default for RefactorWorkflow {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn refactor_ids_are_strictly_increasing_from_one() {
    let mut workflow = RefactorWorkflow::new();
    let ids: Vec<u64> = (0..4)
      .map(|_| workflow.begin(Path::new("/src/a.rs")))
      .collect();
    assert_eq!(ids, [1, 2, 3, 4]);
  }

  #[test]
  fn begin_records_the_target_in_requested_state() {
    let mut workflow = RefactorWorkflow::new();
    let id = workflow.begin(Path::new("/src/a.rs"));
    assert_eq!(workflow.state(id), Some(RefactorState::Requested));
    assert_eq!(workflow.state(id + 1), None);
  }
}
