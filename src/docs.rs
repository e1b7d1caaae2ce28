//! Documentation generator collaborator
//!
//! Generation itself is outside the pipeline core; this module runs the
//! configured command and turns its output directory into artifacts.

use crate::error::{DocforgeError, DocforgeResult};
use crate::graph::stage::Artifact;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Produces a directory of generated documentation for a checked-out
/// source tree.
#[async_trait]
pub trait DocGenerator: Send + Sync {
    /// Generate documentation and return the output directory.
    async fn generate(&self, workspace: &Path) -> DocforgeResult<PathBuf>;
}

/// Runs the configured documentation command in the workspace.
pub struct CommandDocGenerator {
    command: Vec<String>,
    output_dir: PathBuf,
}

impl CommandDocGenerator {
    pub fn new(command: Vec<String>, output_dir: PathBuf) -> Self {
        Self {
            command,
            output_dir,
        }
    }
}

#[async_trait]
impl DocGenerator for CommandDocGenerator {
    async fn generate(&self, workspace: &Path) -> DocforgeResult<PathBuf> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(DocforgeError::command_exec(
                "docs.command",
                "no documentation command configured",
            ));
        };
        let cmd_display = self.command.join(" ");

        info!(command = %cmd_display, "generating documentation");
        let output = Command::new(program)
            .args(args)
            .current_dir(workspace)
            .output()
            .await
            .map_err(|e| DocforgeError::command_failed(cmd_display.clone(), e))?;

        if !output.status.success() {
            return Err(DocforgeError::command_exec(
                cmd_display,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let out = workspace.join(&self.output_dir);
        if !out.is_dir() {
            return Err(DocforgeError::PathNotFound(out));
        }
        Ok(out)
    }
}

/// Read a generated tree into artifacts.
///
/// Files are walked in sorted order and mapped to logical paths under
/// `prefix`, with separators normalized so the artifact list is the same
/// on every platform.
pub fn collect_tree(root: &Path, prefix: &str) -> DocforgeResult<Vec<Artifact>> {
    let mut artifacts = vec![];

    for entry in walkdir::WalkDir::new(root)
        .sort_by(|a, b| a.path().cmp(b.path()))
        .into_iter()
    {
        let entry =
            entry.map_err(|e| DocforgeError::io(format!("walking {}", root.display()), e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| DocforgeError::Internal("walked path escaped its root".to_string()))?;
        let rel = rel.to_string_lossy().replace('\\', "/");
        let logical = if prefix.is_empty() {
            rel
        } else {
            format!("{prefix}/{rel}")
        };

        let bytes = std::fs::read(entry.path())
            .map_err(|e| DocforgeError::io(format!("reading {}", entry.path().display()), e))?;
        artifacts.push(Artifact::new(logical, bytes));
    }

    debug!(root = %root.display(), files = artifacts.len(), "collected generated tree");
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn command_generator_runs_and_returns_output_dir() {
        let temp = TempDir::new().unwrap();
        let generator = CommandDocGenerator::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "mkdir -p out && printf '<html/>' > out/index.html".to_string(),
            ],
            PathBuf::from("out"),
        );

        let out = generator.generate(temp.path()).await.unwrap();
        assert!(out.join("index.html").exists());
    }

    #[tokio::test]
    async fn failing_command_surfaces_stderr() {
        let temp = TempDir::new().unwrap();
        let generator = CommandDocGenerator::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo broken >&2; exit 3".to_string(),
            ],
            PathBuf::from("out"),
        );

        let err = generator.generate(temp.path()).await.unwrap_err();
        match err {
            DocforgeError::CommandExecution { stderr, .. } => assert!(stderr.contains("broken")),
            other => panic!("expected command error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_output_dir_is_an_error() {
        let temp = TempDir::new().unwrap();
        let generator =
            CommandDocGenerator::new(vec!["true".to_string()], PathBuf::from("never-created"));

        let err = generator.generate(temp.path()).await.unwrap_err();
        assert!(matches!(err, DocforgeError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let temp = TempDir::new().unwrap();
        let generator = CommandDocGenerator::new(vec![], PathBuf::from("out"));
        assert!(generator.generate(temp.path()).await.is_err());
    }

    #[test]
    fn collect_tree_sorts_and_prefixes() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("z.html"), "z").unwrap();
        std::fs::write(temp.path().join("a.html"), "a").unwrap();
        std::fs::write(temp.path().join("sub/inner.html"), "i").unwrap();

        let artifacts = collect_tree(temp.path(), "apidocs").unwrap();
        let paths: Vec<_> = artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["apidocs/a.html", "apidocs/sub/inner.html", "apidocs/z.html"]);
    }

    #[test]
    fn collect_tree_without_prefix_uses_relative_paths() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.html"), "x").unwrap();

        let artifacts = collect_tree(temp.path(), "").unwrap();
        assert_eq!(artifacts[0].path, "index.html");
    }
}
