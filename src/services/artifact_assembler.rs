//! Deterministic assembly of accepted candidates into one test file.

use std::path::{Component, Path, PathBuf};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AcceptedArtifact, FunctionDescriptor, OutputArtifact, OutputConfig};

/// Builds the output file text and its destination path. Never touches
/// storage.
#[derive(Debug, Clone)]
pub struct ArtifactAssembler {
    output: OutputConfig,
}

impl ArtifactAssembler {
    /// Assembler writing under the configured output layout.
    pub const fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    /// Assemble `accepted` (already in plan order) under a framework
    /// preamble.
    pub fn assemble(
        &self,
        descriptor: &FunctionDescriptor,
        accepted: &[AcceptedArtifact],
    ) -> DomainResult<OutputArtifact> {
        let function = descriptor.function_name();
        if function.trim().is_empty() {
            return Err(DomainError::AssemblyFailure(
                "function name is empty".to_string(),
            ));
        }

        let (dirs, stem) = split_source_path(descriptor.source_path())?;
        let path = self.output_path(&dirs, &stem, function);

        let mut text = self.preamble(&dirs, &stem, descriptor);
        let bodies: Vec<&str> = accepted.iter().map(|a| a.text.trim_end()).collect();
        if bodies.is_empty() {
            text.truncate(text.trim_end().len());
        } else {
            text.push_str(&bodies.join("\n\n"));
        }
        text.push('\n');

        Ok(OutputArtifact {
            path,
            text,
            test_count: accepted.len(),
        })
    }

    /// `import <framework>` plus the import of the code under test,
    /// followed by a blank line.
    fn preamble(&self, dirs: &[String], stem: &str, descriptor: &FunctionDescriptor) -> String {
        let module = dirs
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(stem))
            .collect::<Vec<_>>()
            .join(".");
        // Methods are reached through their top-level owner.
        let import = descriptor
            .qualified_name
            .split('.')
            .next()
            .unwrap_or(descriptor.function_name());
        format!(
            "import {}\nfrom {module} import {import}\n\n",
            self.output.test_framework
        )
    }

    fn output_path(&self, dirs: &[String], stem: &str, function: &str) -> PathBuf {
        let mut path = PathBuf::from(&self.output.root);
        path.extend(dirs);
        path.push(stem);
        path.push(format!("test_{function}.{}", self.output.extension));
        path
    }
}

/// Relative directory components and file stem of a source path.
fn split_source_path(source: &Path) -> DomainResult<(Vec<String>, String)> {
    let mut parts = Vec::new();
    for component in source.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(DomainError::AssemblyFailure(format!(
                    "source path {} escapes the project root",
                    source.display()
                )))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(DomainError::AssemblyFailure(format!(
                    "source path {} is absolute",
                    source.display()
                )))
            }
        }
    }

    let file = parts.pop().ok_or_else(|| {
        DomainError::AssemblyFailure(format!("source path {} has no file", source.display()))
    })?;
    let stem = Path::new(&file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            DomainError::AssemblyFailure(format!("source path {} has no file stem", source.display()))
        })?;
    Ok((parts, stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::descriptor::fixtures::add_descriptor;

    fn artifact(id: &str, text: &str) -> AcceptedArtifact {
        AcceptedArtifact {
            scenario_id: id.to_string(),
            text: text.to_string(),
            attempts: 1,
        }
    }

    #[test]
    fn test_assemble_mirrors_source_path() {
        let assembler = ArtifactAssembler::new(OutputConfig::default());
        let output = assembler
            .assemble(
                &add_descriptor(),
                &[
                    artifact("typical-1", "def test_add_positive():\n    assert add(1, 2) == 3\n"),
                    artifact("error-1", "def test_add_rejects_string():\n    with pytest.raises(TypeError):\n        add(\"x\", 5)"),
                ],
            )
            .unwrap();

        assert_eq!(output.path, PathBuf::from("tests/example_code/code/test_add.py"));
        assert_eq!(output.test_count, 2);
        assert_eq!(
            output.text,
            "import pytest\n\
             from example_code.code import add\n\
             \n\
             def test_add_positive():\n    assert add(1, 2) == 3\n\
             \n\
             def test_add_rejects_string():\n    with pytest.raises(TypeError):\n        add(\"x\", 5)\n"
        );
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let assembler = ArtifactAssembler::new(OutputConfig::default());
        let accepted = [artifact("typical-1", "def test_a():\n    pass")];
        let first = assembler.assemble(&add_descriptor(), &accepted).unwrap();
        let second = assembler.assemble(&add_descriptor(), &accepted).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_artifact_keeps_preamble() {
        let assembler = ArtifactAssembler::new(OutputConfig::default());
        let output = assembler.assemble(&add_descriptor(), &[]).unwrap();
        assert!(output.is_empty());
        assert_eq!(output.text, "import pytest\nfrom example_code.code import add\n");
    }

    #[test]
    fn test_top_level_module_and_custom_output() {
        let assembler = ArtifactAssembler::new(OutputConfig {
            root: "generated".to_string(),
            extension: "py".to_string(),
            test_framework: "pytest".to_string(),
        });
        let mut descriptor = add_descriptor();
        descriptor.source_path = PathBuf::from("./calc.py");
        let output = assembler.assemble(&descriptor, &[]).unwrap();
        assert_eq!(output.path, PathBuf::from("generated/calc/test_add.py"));
        assert!(output.text.contains("from calc import add"));
    }

    #[test]
    fn test_method_imports_owner() {
        let assembler = ArtifactAssembler::new(OutputConfig::default());
        let mut descriptor = add_descriptor();
        descriptor.qualified_name = "Calculator.add".to_string();
        let output = assembler.assemble(&descriptor, &[]).unwrap();
        assert!(output.text.contains("from example_code.code import Calculator"));
        assert!(output.path.ends_with("test_add.py"));
    }

    #[test]
    fn test_rejects_unsafe_source_paths() {
        let assembler = ArtifactAssembler::new(OutputConfig::default());
        for bad in ["/abs/code.py", "../outside/code.py", "pkg/.."] {
            let mut descriptor = add_descriptor();
            descriptor.source_path = PathBuf::from(bad);
            let err = assembler.assemble(&descriptor, &[]).unwrap_err();
            assert_eq!(err.stage(), "assembly", "{bad}");
        }

        let mut descriptor = add_descriptor();
        descriptor.source_path = PathBuf::new();
        assert!(assembler.assemble(&descriptor, &[]).is_err());

        let mut descriptor = add_descriptor();
        descriptor.qualified_name = String::new();
        assert!(assembler.assemble(&descriptor, &[]).is_err());
    }
}
