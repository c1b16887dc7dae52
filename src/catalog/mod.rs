//! Script discovery and per-script metadata extracted from file text.
//!
//! A keyword name is the script's path relative to the scripts root with
//! separators replaced by dots and the extension stripped, so `Sub/b.script`
//! is addressed as `Sub.b`. Files with a leading underscore are internal and
//! never listed.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::value::{infer_scalar, Value};

const SCRIPT_SUFFIX: &str = ".script";
const QUALIFIER: char = '.';
const LINE_COMMENT_STARTERS: [&str; 3] = ["//", "#", "--"];
const BLOCK_COMMENT_START: &str = "(*";
const BLOCK_COMMENT_END: &str = "*)";
const PARAMS_KEYWORD: &str = "params ";
const DEFAULT_SEPARATOR: char = ':';

/// One declared script parameter; the default, when present, is already
/// converted to a number, boolean or quote-stripped string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub default: Option<Value>,
}

/// Read-only view over the scripts directory of a suite.
///
/// Nothing is cached; signature and documentation reads parse the file text
/// on every call, so edits on disk are picked up immediately.
#[derive(Debug, Clone)]
pub struct ScriptCatalog {
    root: PathBuf,
}

impl ScriptCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All script keyword names under the root, subfolders included.
    pub fn keyword_names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        collect_scripts(&self.root, "", &mut names)?;
        debug!(count = names.len(), root = %self.root.display(), "collected scripts");
        Ok(names)
    }

    /// Real file path behind a qualified keyword name.
    pub fn script_path(&self, name: &str) -> PathBuf {
        let relative = name.replace(QUALIFIER, "/");
        self.root.join(format!("{relative}{SCRIPT_SUFFIX}"))
    }

    /// The script's leading comment block with comment markers stripped.
    ///
    /// Line comments (`//`, `#`, `--`) and `(*`..`*)` blocks both count and
    /// may be combined; the block ends at the first line that is neither
    /// blank nor a comment.
    pub fn documentation(&self, name: &str) -> Result<String> {
        let path = self.script_path(name);
        debug!(script = name, path = %path.display(), "reading top comments");
        let text = fs::read_to_string(&path)?;

        let mut result = String::new();
        let mut inside_block = false;
        for line in text.lines() {
            let stripped = strip_unreadable_start(line);

            if stripped.is_empty() {
                continue;
            }

            // a '*)' standing alone on its own line still closes the block
            if stripped.starts_with(BLOCK_COMMENT_END) {
                result.push('\n');
                inside_block = false;
                continue;
            }

            if inside_block {
                let mut body = stripped;
                if let Some(before) = body.strip_suffix(BLOCK_COMMENT_END) {
                    inside_block = false;
                    body = before;
                }
                result.push_str(body);
                result.push('\n');
                continue;
            }

            if let Some(starter) = LINE_COMMENT_STARTERS
                .iter()
                .find(|s| stripped.starts_with(**s))
            {
                result.push_str(&stripped[starter.len()..]);
                result.push('\n');
                continue;
            }

            if let Some(after) = stripped.strip_prefix(BLOCK_COMMENT_START) {
                let mut body = after;
                if let Some(before) = body.strip_suffix(BLOCK_COMMENT_END) {
                    body = before;
                } else {
                    inside_block = true;
                }
                result.push_str(body);
                result.push('\n');
                continue;
            }

            // first real code line - drop the trailing newline and stop
            if let Some(idx) = result.rfind('\n') {
                result.truncate(idx);
            }
            break;
        }
        Ok(result)
    }

    /// The script's declared parameter list.
    ///
    /// The `params` line can only be preceded by comments and blank lines;
    /// scanning stops one line past the comment block (the extra line covers
    /// a standalone block close), so scripts without parameters are not read
    /// to the bottom.
    pub fn parameters(&self, name: &str) -> Result<Vec<Param>> {
        let path = self.script_path(name);
        debug!(script = name, path = %path.display(), "reading parameters");
        let comment_lines = self.documentation(name)?.lines().count();
        let text = fs::read_to_string(&path)?;

        let mut line_counter = 0usize;
        for line in text.lines() {
            let stripped = strip_unreadable_start(line);
            if stripped.is_empty() {
                continue;
            }
            line_counter += 1;

            if stripped.to_lowercase().starts_with(PARAMS_KEYWORD) {
                let declarations = &stripped[PARAMS_KEYWORD.len()..];
                return Ok(declarations.split(',').map(parse_declaration).collect());
            }

            if line_counter > comment_lines + 1 {
                break;
            }
        }
        Ok(Vec::new())
    }
}

fn parse_declaration(item: &str) -> Param {
    let declaration = item.trim();
    match declaration.split_once(DEFAULT_SEPARATOR) {
        Some((name, raw_default)) => {
            let default = match infer_scalar(raw_default) {
                // defaults are written quoted in scripts; the quotes are
                // declaration syntax, not value content
                Value::Str(s) => Value::Str(s.replace('"', "")),
                other => other,
            };
            Param {
                name: name.to_string(),
                default: Some(default),
            }
        }
        None => Param {
            name: declaration.to_string(),
            default: None,
        },
    }
}

fn collect_scripts(dir: &Path, prefix: &str, out: &mut BTreeSet<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.ends_with(SCRIPT_SUFFIX) {
            // leading underscore marks internal scripts
            if !file_name.starts_with('_') {
                let stem = file_name.split(QUALIFIER).next().unwrap_or(&file_name);
                if prefix.is_empty() {
                    out.insert(stem.to_string());
                } else {
                    out.insert(format!("{prefix}{QUALIFIER}{stem}"));
                }
            }
        } else if entry.path().is_dir() {
            let sub_prefix = if prefix.is_empty() {
                file_name
            } else {
                format!("{prefix}{QUALIFIER}{file_name}")
            };
            collect_scripts(&entry.path(), &sub_prefix, out)?;
        }
    }
    Ok(())
}

/// Drops blank edges and any non-ASCII noise at the line start; script files
/// often begin with a byte-order marker or similar.
fn strip_unreadable_start(line: &str) -> &str {
    let trimmed = line.trim();
    let start = trimmed
        .char_indices()
        .find(|(_, c)| (*c as u32) > 0 && (*c as u32) < 127)
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    &trimmed[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_script(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn lists_scripts_with_qualified_names() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "a.script", "put 1");
        write_script(dir.path(), "_hidden.script", "put 1");
        write_script(dir.path(), "Sub/b.script", "put 1");

        let catalog = ScriptCatalog::new(dir.path());
        let names: Vec<String> = catalog.keyword_names().unwrap().into_iter().collect();
        assert_eq!(names, vec!["Sub.b".to_string(), "a".to_string()]);
    }

    #[test]
    fn maps_qualified_names_back_to_paths() {
        let catalog = ScriptCatalog::new("/suite/Scripts");
        assert_eq!(
            catalog.script_path("Sub.b"),
            PathBuf::from("/suite/Scripts/Sub/b.script")
        );
    }

    #[test]
    fn reads_line_comment_documentation() {
        let dir = tempfile::tempdir().unwrap();
        write_script(
            dir.path(),
            "doc.script",
            "// first line\n# second line\n-- third line\nput 1\n// not docs\n",
        );
        let catalog = ScriptCatalog::new(dir.path());
        assert_eq!(
            catalog.documentation("doc").unwrap(),
            " first line\n second line\n third line"
        );
    }

    #[test]
    fn reads_block_comments_with_standalone_close() {
        let dir = tempfile::tempdir().unwrap();
        write_script(
            dir.path(),
            "block.script",
            "(* opening line\nmiddle line\n*)\nput 1\n",
        );
        let catalog = ScriptCatalog::new(dir.path());
        assert_eq!(
            catalog.documentation("block").unwrap(),
            " opening line\nmiddle line\n"
        );
    }

    #[test]
    fn mixes_comment_styles_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        write_script(
            dir.path(),
            "mixed.script",
            "\n\n(* block *)\n// line\nput 1\n",
        );
        let catalog = ScriptCatalog::new(dir.path());
        assert_eq!(catalog.documentation("mixed").unwrap(), " block \n line");
    }

    #[test]
    fn comment_only_script_keeps_whole_block() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "only.script", "// all there is\n");
        let catalog = ScriptCatalog::new(dir.path());
        assert_eq!(catalog.documentation("only").unwrap(), " all there is\n");
    }

    #[test]
    fn strips_leading_bom_noise() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "bom.script", "\u{feff}// docs\nput 1\n");
        let catalog = ScriptCatalog::new(dir.path());
        assert_eq!(catalog.documentation("bom").unwrap(), " docs");
    }

    #[test]
    fn parses_parameters_with_typed_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_script(
            dir.path(),
            "args.script",
            "// docs\nparams first, second:5, third:\"text\", fourth:true\nput 1\n",
        );
        let catalog = ScriptCatalog::new(dir.path());
        let params = catalog.parameters("args").unwrap();
        assert_eq!(
            params,
            vec![
                Param {
                    name: "first".into(),
                    default: None
                },
                Param {
                    name: "second".into(),
                    default: Some(Value::Int(5))
                },
                Param {
                    name: "third".into(),
                    default: Some(Value::Str("text".into()))
                },
                Param {
                    name: "fourth".into(),
                    default: Some(Value::Bool(true))
                },
            ]
        );
    }

    #[test]
    fn params_keyword_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "upper.script", "PARAMS one\nput 1\n");
        let catalog = ScriptCatalog::new(dir.path());
        assert_eq!(
            catalog.parameters("upper").unwrap(),
            vec![Param {
                name: "one".into(),
                default: None
            }]
        );
    }

    #[test]
    fn missing_params_line_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        write_script(
            dir.path(),
            "none.script",
            "// doc one\nput 1\nput 2\nparams too, late\n",
        );
        let catalog = ScriptCatalog::new(dir.path());
        assert!(catalog.parameters("none").unwrap().is_empty());
    }
}
