//! This module provides the `MachineLoader` struct, responsible for loading machines from
//! files and strings: definition sources (`.auto`) are compiled, serialized definitions
//! (`.json`) are validated.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::compiler::compile;
use crate::machine::Machine;
use crate::types::{AutomataError, MAX_SOURCE_SIZE};

/// Extension of machine definition sources.
pub const SOURCE_EXTENSION: &str = "auto";
/// Extension of serialized machine definitions.
pub const DEFINITION_EXTENSION: &str = "json";

/// `MachineLoader` is a utility struct for loading machines.
pub struct MachineLoader;

impl MachineLoader {
    /// Reads a file into a string, refusing anything larger than [`MAX_SOURCE_SIZE`].
    pub fn read_source(path: &Path) -> Result<String, AutomataError> {
        let content = fs::read_to_string(path).map_err(|e| {
            AutomataError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        if content.len() > MAX_SOURCE_SIZE {
            return Err(AutomataError::ValidationError(format!(
                "{} is too large ({} bytes, maximum is {})",
                path.display(),
                content.len(),
                MAX_SOURCE_SIZE
            )));
        }

        Ok(content)
    }

    /// Loads a single machine from `path`.
    ///
    /// `.json` files are read as serialized definitions; anything else is compiled as a
    /// definition source.
    pub fn load_machine(path: &Path) -> Result<Machine, AutomataError> {
        let content = Self::read_source(path)?;
        let machine = if is_definition(path) {
            Self::load_definition(&content)?
        } else {
            Self::load_from_string(&content)?
        };

        info!(path = %path.display(), kind = %machine.kind(), "loaded machine");
        Ok(machine)
    }

    /// Compiles a definition source. Warnings are dropped; errors become
    /// [`AutomataError::CompileError`].
    pub fn load_from_string(content: &str) -> Result<Machine, AutomataError> {
        compile(content).into_result()
    }

    /// Reads a serialized definition, validating it the same way compiled machines are.
    pub fn load_definition(content: &str) -> Result<Machine, AutomataError> {
        serde_json::from_str(content).map_err(|e| AutomataError::InvalidDefinition(e.to_string()))
    }

    /// Serializes a machine into its JSON definition.
    pub fn to_definition(machine: &Machine) -> Result<String, AutomataError> {
        serde_json::to_string_pretty(machine)
            .map_err(|e| AutomataError::InvalidDefinition(e.to_string()))
    }

    /// Loads every `.auto` and `.json` file directly inside `directory`.
    ///
    /// Each file yields its own result, so one bad file does not hide the others. Entries come
    /// back sorted by path.
    pub fn load_machines(directory: &Path) -> Vec<Result<(PathBuf, Machine), AutomataError>> {
        if !directory.exists() {
            return vec![Err(AutomataError::FileError(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(AutomataError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut paths = Vec::new();
        let mut results = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => results.push(Err(AutomataError::FileError(format!(
                    "Failed to read directory entry: {}",
                    e
                )))),
            }
        }
        paths.sort();

        for path in paths {
            if path.is_dir() || !(is_source(&path) || is_definition(&path)) {
                continue;
            }

            match Self::load_machine(&path) {
                Ok(machine) => results.push(Ok((path, machine))),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping machine");
                    results.push(Err(AutomataError::FileError(format!(
                        "Failed to load machine from {}: {}",
                        path.display(),
                        e
                    ))))
                }
            }
        }

        results
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

fn is_source(path: &Path) -> bool {
    has_extension(path, SOURCE_EXTENSION)
}

fn is_definition(path: &Path) -> bool {
    has_extension(path, DEFINITION_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineKind;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const DFA: &str = "type = DFA\nQ = {q0, q1}\nE = {a}\nF = {q1}\nq0 = q0\nd(q0, a) = q1";

    fn write(path: &Path, content: &str) {
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_valid_machine() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.auto");
        write(&file_path, DFA);

        let machine = MachineLoader::load_machine(&file_path).unwrap();
        assert_eq!(machine.kind(), MachineKind::Fa);
        assert_eq!(machine.states().len(), 2);
    }

    #[test]
    fn test_load_invalid_machine() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("invalid.auto");
        write(&file_path, "type = DFA\nQ = {q0}");

        let result = MachineLoader::load_machine(&file_path);
        assert!(matches!(result, Err(AutomataError::CompileError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = MachineLoader::load_machine(Path::new("/definitely/not/here.auto"));
        assert!(matches!(result, Err(AutomataError::FileError(_))));
    }

    #[test]
    fn test_json_definition_round_trip() {
        let dir = tempdir().unwrap();
        let machine = MachineLoader::load_from_string(DFA).unwrap();
        let json = MachineLoader::to_definition(&machine).unwrap();

        let file_path = dir.path().join("dfa.json");
        write(&file_path, &json);

        let loaded = MachineLoader::load_machine(&file_path).unwrap();
        assert_eq!(loaded.definition(), machine.definition());
    }

    #[test]
    fn test_json_definition_is_validated() {
        let json = r#"{
            "type": "tm",
            "initial_state": "q0",
            "blank": "B",
            "states": ["q0"],
            "symbols": ["a"],
            "final_states": [],
            "transitions": []
        }"#;

        let error = MachineLoader::load_definition(json).unwrap_err();
        assert!(matches!(error, AutomataError::InvalidDefinition(_)));
        assert!(error.to_string().contains("blank symbol 'B' is not declared"));
    }

    #[test]
    fn test_load_machines_from_directory() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a.auto"), DFA);
        write(&dir.path().join("b.auto"), "not a machine");
        write(&dir.path().join("notes.txt"), "ignored");
        std::fs::create_dir(dir.path().join("nested.auto")).unwrap();

        let results = MachineLoader::load_machines(dir.path());
        assert_eq!(results.len(), 2);

        let (path, machine) = results[0].as_ref().unwrap();
        assert!(path.ends_with("a.auto"));
        assert_eq!(machine.kind(), MachineKind::Fa);
        assert!(results[1].is_err());
    }

    #[test]
    fn test_load_machines_missing_directory() {
        let results = MachineLoader::load_machines(Path::new("/definitely/not/here"));
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(AutomataError::FileError(_))));
    }

    #[test]
    fn test_oversized_source_is_rejected() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("big.auto");
        write(&file_path, &" ".repeat(MAX_SOURCE_SIZE + 1));

        let result = MachineLoader::read_source(&file_path);
        assert!(matches!(result, Err(AutomataError::ValidationError(_))));
    }
}
