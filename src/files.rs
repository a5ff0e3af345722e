//! Reading deployment content from disk and writing prepared files back out

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use deploy_core::{ContentFileHash, DeploymentPreparationData, NamedFile, NamedHash};

#[derive(Error, Debug)]
pub enum FilesError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("File name is not valid UTF-8: {0}")]
    NonUtf8Name(PathBuf),

    #[error("Expected NAME=HASH, got {0:?}")]
    InvalidContentArg(String),
}

/// Collect every regular file under `root`
///
/// Names are paths relative to `root` with `/` separators, sorted so the
/// resulting entity does not depend on directory iteration order. Symbolic
/// links are skipped.
pub fn collect_files(root: &Path) -> Result<Vec<NamedFile>, FilesError> {
    let mut paths = Vec::new();
    walk(root, &mut paths)?;
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let name = relative_name(root, &path)?;
        let content = fs::read(&path).map_err(|source| FilesError::Read {
            path: path.clone(),
            source,
        })?;
        debug!(file = %name, bytes = content.len(), "collected file");
        files.push((name, content));
    }

    Ok(files)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), FilesError> {
    let read_err = |source| FilesError::Read {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        // file_type() does not follow links
        let file_type = entry.file_type().map_err(|source| FilesError::Read {
            path: path.clone(),
            source,
        })?;

        if file_type.is_symlink() {
            warn!(path = %path.display(), "skipping symbolic link");
        } else if file_type.is_dir() {
            walk(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn relative_name(root: &Path, path: &Path) -> Result<String, FilesError> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .ok_or_else(|| FilesError::NonUtf8Name(path.to_path_buf()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("/"))
}

/// Parse a `NAME=HASH` reference to previously uploaded content
///
/// Splits on the last `=` so file names may contain one.
pub fn parse_content_arg(arg: &str) -> Result<NamedHash, FilesError> {
    match arg.rsplit_once('=') {
        Some((name, hash)) if !name.is_empty() && !hash.is_empty() => {
            Ok((name.to_string(), ContentFileHash::new(hash)))
        }
        _ => Err(FilesError::InvalidContentArg(arg.to_string())),
    }
}

/// Write every prepared file to `out_dir`, named by its content hash
pub fn write_deployment(
    prepared: &DeploymentPreparationData,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, FilesError> {
    fs::create_dir_all(out_dir).map_err(|source| FilesError::Write {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(prepared.files.len());
    for (hash, content) in &prepared.files {
        let path = out_dir.join(hash.as_str());
        fs::write(&path, content).map_err(|source| FilesError::Write {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    use deploy_core::{hash_content, DeploymentBuilder, EntityType, FixedClock};

    #[test]
    fn test_collect_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("models/trees")).unwrap();
        fs::write(dir.path().join("scene.json"), b"{}").unwrap();
        fs::write(dir.path().join("models/trees/oak.glb"), b"glTF").unwrap();
        fs::write(dir.path().join("models/rock.glb"), b"rock").unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec!["models/rock.glb", "models/trees/oak.glb", "scene.json"]
        );
        assert_eq!(files[2].1, b"{}");
    }

    #[test]
    fn test_collect_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, FilesError::Read { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_skips_symlinks() {
        use std::os::unix::fs::symlink;

        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), b"not content").unwrap();

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scene.json"), b"{}").unwrap();
        symlink(dir.path(), dir.path().join("loop")).unwrap();
        symlink(outside.path(), dir.path().join("outside")).unwrap();
        symlink(
            outside.path().join("secret.txt"),
            dir.path().join("secret.txt"),
        )
        .unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["scene.json"]);
    }

    #[test]
    fn test_parse_content_arg() {
        let (name, hash) = parse_content_arg("body.png=bafkreiabc").unwrap();
        assert_eq!(name, "body.png");
        assert_eq!(hash.as_str(), "bafkreiabc");

        let (name, _) = parse_content_arg("a=b.png=bafkreiabc").unwrap();
        assert_eq!(name, "a=b.png");

        assert!(parse_content_arg("body.png").is_err());
        assert!(parse_content_arg("=bafkreiabc").is_err());
        assert!(parse_content_arg("body.png=").is_err());
    }

    #[test]
    fn test_write_deployment_named_by_hash() {
        let prepared = DeploymentBuilder::new()
            .with_clock(FixedClock(1))
            .build_entity(
                EntityType::Scene,
                vec!["0,0".to_string()],
                vec![("scene.json".to_string(), b"{}".to_vec())],
                None,
                None,
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let written = write_deployment(&prepared, dir.path()).unwrap();
        assert_eq!(written.len(), 2);

        for path in written {
            let content = fs::read(&path).unwrap();
            let name = path.file_name().unwrap().to_str().unwrap();
            assert_eq!(hash_content(&content).unwrap().as_str(), name);
        }
    }
}
