use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

use crate::error::PreconditionError;

pub const DEFAULT_IN_DIR: &str = ".";
pub const DEFAULT_OUT_PATH: &str = "./gvoice-all.xml";
const OUTPUT_EXTENSION: &str = "xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionPaths {
    pub in_dir: PathBuf,
    pub out_path: PathBuf,
}

/// Resolves both paths against `cwd` and checks them before any work starts.
pub fn resolve_conversion_paths(
    in_dir: &Path,
    out_path: &Path,
    cwd: &Path,
) -> Result<ConversionPaths> {
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }
    let cwd = normalize_lexical(cwd);

    let in_dir = resolve_user_path(in_dir, &cwd);
    if !in_dir.is_dir() {
        return Err(PreconditionError::MissingInputDirectory(in_dir).into());
    }

    let out_path = resolve_user_path(out_path, &cwd);
    if out_path.extension().and_then(|ext| ext.to_str()) != Some(OUTPUT_EXTENSION) {
        return Err(PreconditionError::OutputNotXml(out_path).into());
    }
    match out_path.parent() {
        Some(parent) if parent.is_dir() => {}
        _ => return Err(PreconditionError::MissingOutputDirectory(out_path).into()),
    }

    Ok(ConversionPaths { in_dir, out_path })
}

fn resolve_user_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_lexical(path)
    } else {
        normalize_lexical(&cwd.join(path))
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{DEFAULT_IN_DIR, DEFAULT_OUT_PATH, resolve_conversion_paths};
    use crate::error::PreconditionError;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("{prefix}-{nanos}"))
    }

    #[test]
    fn defaults_resolve_inside_cwd() {
        let cwd = unique_temp_dir("gvbackup-config-defaults");
        std::fs::create_dir_all(&cwd).expect("cwd should be creatable");

        let paths = resolve_conversion_paths(
            Path::new(DEFAULT_IN_DIR),
            Path::new(DEFAULT_OUT_PATH),
            &cwd,
        )
        .expect("defaults should resolve");

        assert_eq!(paths.in_dir, cwd);
        assert_eq!(paths.out_path, cwd.join("gvoice-all.xml"));
    }

    #[test]
    fn normalizes_parent_segments() {
        let cwd = unique_temp_dir("gvbackup-config-parents");
        std::fs::create_dir_all(cwd.join("takeout/Calls")).expect("dirs should be creatable");

        let paths = resolve_conversion_paths(
            Path::new("./takeout/../takeout/Calls"),
            Path::new("takeout/out.xml"),
            &cwd,
        )
        .expect("relative paths should resolve");

        assert_eq!(paths.in_dir, cwd.join("takeout/Calls"));
        assert_eq!(paths.out_path, cwd.join("takeout/out.xml"));
    }

    #[test]
    fn rejects_missing_input_directory() {
        let cwd = unique_temp_dir("gvbackup-config-missing-in");
        std::fs::create_dir_all(&cwd).expect("cwd should be creatable");

        let err = resolve_conversion_paths(Path::new("nope"), Path::new("out.xml"), &cwd)
            .expect_err("missing input must fail");

        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::MissingInputDirectory(_))
        ));
    }

    #[test]
    fn rejects_non_xml_output() {
        let cwd = unique_temp_dir("gvbackup-config-extension");
        std::fs::create_dir_all(&cwd).expect("cwd should be creatable");

        for out in ["out.txt", "out.XML", "out"] {
            let err = resolve_conversion_paths(Path::new("."), Path::new(out), &cwd)
                .expect_err("non-xml output must fail");
            assert!(
                matches!(
                    err.downcast_ref::<PreconditionError>(),
                    Some(PreconditionError::OutputNotXml(_))
                ),
                "unexpected error for {out}: {err}"
            );
        }
    }

    #[test]
    fn rejects_missing_output_directory() {
        let cwd = unique_temp_dir("gvbackup-config-missing-out");
        std::fs::create_dir_all(&cwd).expect("cwd should be creatable");

        let err = resolve_conversion_paths(Path::new("."), Path::new("absent/out.xml"), &cwd)
            .expect_err("missing output parent must fail");

        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::MissingOutputDirectory(_))
        ));
    }

    #[test]
    fn rejects_relative_cwd() {
        let err = resolve_conversion_paths(Path::new("."), Path::new("out.xml"), Path::new("work"))
            .expect_err("relative cwd must fail");

        assert!(
            err.to_string().contains("cwd must be absolute"),
            "unexpected error: {err}"
        );
    }
}
