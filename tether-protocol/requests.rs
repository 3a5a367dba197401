//! Builders for outbound request payloads. Each returns the bare request
//! object; the protocol variant wraps it in the call-id envelope on send.

use serde_json::{
  Value,
  json,
};

/// Handshake request, issued immediately after a successful connect.
pub fn connection_info() -> Value {
  json!({ "typehint": "ConnectionInfoReq" })
}

/// File identity plus its current (possibly unsaved) contents, for requests
/// that must see the live buffer rather than the on-disk file.
pub fn file_info(path: &str, contents: &str) -> Value {
  json!({
    "file": path,
    "contents": contents,
  })
}

pub fn completions(point: u64, file_info: Value, max_results: u64) -> Value {
  json!({
    "typehint": "CompletionsReq",
    "point": point,
    "maxResults": max_results,
    "caseSens": true,
    "fileInfo": file_info,
    "reload": false,
  })
}

pub fn typecheck_files(files: &[&str]) -> Value {
  json!({
    "typehint": "TypecheckFilesReq",
    "files": files,
  })
}

/// An operation at a single point, e.g. `SymbolAtPointReq`, `DocUriAtPointReq`.
/// `what` is the typehint prefix.
pub fn at_point(what: &str, file: Value, point: u64) -> Value {
  json!({
    "typehint": format!("{what}AtPointReq"),
    "file": file,
    "point": point,
  })
}

/// An operation over a character range. `range_key` names the property
/// holding the range; most requests call it `range`, some call it `point`.
pub fn at_range(what: &str, file: &str, beg: u64, end: u64, range_key: &str) -> Value {
  let mut req = json!({
    "typehint": format!("{what}AtPointReq"),
    "file": file,
  });
  req[range_key] = json!({ "from": beg, "to": end });
  req
}

pub fn inspect_type_at_point(file: &str, point: u64) -> Value {
  json!({
    "typehint": "InspectTypeAtPointReq",
    "file": file,
    "point": point,
    "range": { "from": point, "to": point },
  })
}

pub fn symbol_at_point(file: &str, point: u64) -> Value {
  json!({
    "typehint": "SymbolAtPointReq",
    "file": file,
    "point": point,
  })
}

pub fn symbol_by_name(type_full_name: &str, member_name: Option<&str>) -> Value {
  let mut req = json!({
    "typehint": "SymbolByNameReq",
    "typeFullName": type_full_name,
  });
  if let Some(member) = member_name {
    req["memberName"] = json!(member);
  }
  req
}

pub fn import_suggestions(file: &str, point: u64, names: &[&str], max_results: u64) -> Value {
  json!({
    "typehint": "ImportSuggestionsReq",
    "file": file,
    "point": point,
    "names": names,
    "maxResults": max_results,
  })
}

pub fn public_symbol_search(keywords: &[String], max_results: u64) -> Value {
  json!({
    "typehint": "PublicSymbolSearchReq",
    "keywords": keywords,
    "maxResults": max_results,
  })
}

pub fn inspect_package_by_path(path: &str) -> Value {
  json!({
    "typehint": "InspectPackageByPathReq",
    "path": path,
  })
}

pub fn uses_of_symbol(file: &str, point: u64) -> Value {
  at_point("UsesOfSymbol", json!(file), point)
}

/// The refactor envelope: a kind-specific descriptor under `params`, plus a
/// separate monotonic `procId` the server echoes back with the diff.
pub fn refactor(proc_id: u64, params: Value, interactive: bool) -> Value {
  json!({
    "typehint": "RefactorReq",
    "procId": proc_id,
    "params": params,
    "interactive": interactive,
  })
}

pub fn rename_descriptor(new_name: &str, file: &str, start: u64, end: u64) -> Value {
  json!({
    "typehint": "RenameRefactorDesc",
    "newName": new_name,
    "file": file,
    "start": start,
    "end": end,
  })
}

pub fn inline_local_descriptor(file: &str, start: u64, end: u64) -> Value {
  json!({
    "typehint": "InlineLocalRefactorDesc",
    "file": file,
    "start": start,
    "end": end,
  })
}

pub fn organize_imports_descriptor(file: &str) -> Value {
  json!({
    "typehint": "OrganiseImportsRefactorDesc",
    "file": file,
  })
}

pub fn add_import_descriptor(file: &str, qualified_name: &str) -> Value {
  json!({
    "typehint": "AddImportRefactorDesc",
    "file": file,
    "qualifiedName": qualified_name,
  })
}

pub fn debug_set_break(file: &str, line: u64) -> Value {
  json!({
    "typehint": "DebugSetBreakReq",
    "file": file,
    "line": line,
    "maxResults": 10,
  })
}

pub fn debug_clear_all_breaks() -> Value {
  json!({ "typehint": "DebugClearAllBreaksReq" })
}

pub fn debug_attach(hostname: &str, port: &str) -> Value {
  json!({
    "typehint": "DebugAttachReq",
    "hostname": hostname,
    "port": port,
  })
}

pub fn debug_continue(thread_id: &str) -> Value {
  json!({
    "typehint": "DebugContinueReq",
    "threadId": thread_id,
  })
}

pub fn debug_backtrace(thread_id: &str) -> Value {
  json!({
    "typehint": "DebugBacktraceReq",
    "threadId": thread_id,
    "index": 0,
    "count": 100,
  })
}
