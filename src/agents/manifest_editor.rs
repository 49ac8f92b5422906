use crate::error::{Result, RippleError};
use std::fs;
use std::path::Path;
use toml_edit::{DocumentMut, Item, Value};

/// Result of applying the target version to a declaration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Updated { previous: Option<String> },
    AlreadyCurrent,
}

/// Format-preserving reader/writer for a dependent's dependency
/// declaration file: a TOML document whose `[dependencies]` table maps
/// module ids to either a bare version string or a table with a
/// `version` key.
pub struct ManifestEditor;

impl ManifestEditor {
    /// The version the file declares for `module`, or `None` when the
    /// module is not declared.
    pub fn read_declared_version(path: &Path, module: &str) -> Result<Option<String>> {
        let doc = Self::load_document(path)?;

        let Some(deps) = doc.get("dependencies").and_then(|v| v.as_table()) else {
            return Ok(None);
        };

        Ok(deps.get(module).and_then(Self::extract_version))
    }

    /// Rewrite the declaration for `module` to `version`, preserving the
    /// existing entry shape. An undeclared module is added as a bare
    /// version string. Nothing is written when already current.
    pub fn apply_version(path: &Path, module: &str, version: &str) -> Result<EditOutcome> {
        let mut doc = Self::load_document(path)?;

        let deps = doc
            .get_mut("dependencies")
            .and_then(|v| v.as_table_mut())
            .ok_or_else(|| {
                RippleError::Declaration(format!(
                    "'{}' has no [dependencies] table",
                    path.display()
                ))
            })?;

        let previous = deps.get(module).and_then(Self::extract_version);
        if previous.as_deref() == Some(version) {
            return Ok(EditOutcome::AlreadyCurrent);
        }

        match deps.get_mut(module) {
            Some(item) => {
                if !Self::update_version(item, version) {
                    return Err(RippleError::Declaration(format!(
                        "unsupported declaration form for '{module}' in '{}'",
                        path.display()
                    )));
                }
            }
            None => {
                deps.insert(module, toml_edit::value(version));
            }
        }

        fs::write(path, doc.to_string()).map_err(|e| {
            RippleError::Declaration(format!("failed to write '{}': {e}", path.display()))
        })?;

        Ok(EditOutcome::Updated { previous })
    }

    fn load_document(path: &Path) -> Result<DocumentMut> {
        let content = fs::read_to_string(path).map_err(|e| {
            RippleError::Declaration(format!("failed to read '{}': {e}", path.display()))
        })?;

        content.parse::<DocumentMut>().map_err(|e| {
            RippleError::Declaration(format!("failed to parse '{}': {e}", path.display()))
        })
    }

    fn extract_version(item: &Item) -> Option<String> {
        if let Some(version) = item.as_str() {
            return Some(version.to_string());
        }

        if let Some(inline_table) = item.as_inline_table() {
            return inline_table
                .get("version")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
        }

        if let Some(table) = item.as_table() {
            return table
                .get("version")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
        }

        None
    }

    fn update_version(item: &mut Item, new_version: &str) -> bool {
        if item.as_str().is_some() {
            *item = Item::Value(Value::from(new_version));
            return true;
        }

        if let Some(inline_table) = item.as_inline_table_mut() {
            inline_table.insert("version", Value::from(new_version));
            return true;
        }

        if let Some(table) = item.as_table_mut() {
            table.insert("version", Item::Value(Value::from(new_version)));
            return true;
        }

        false
    }
}
