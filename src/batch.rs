//! Folder mode: expand inputs into conversion jobs with output paths.
//!
//! ```text
//! report.pdf            ──▶ report.txt next to it   (or stdout when alone)
//! scans/                ──▶ scans/*.pdf             (top level only)
//! scans/ + recursive    ──▶ scans/**/*.pdf
//! --output-dir out/     ──▶ out/<path relative to the input dir>.txt
//! ```
//!
//! A destination that already exists is skipped unless `overwrite` is set.
//! Two inputs that would land on the same file are rejected before any
//! conversion starts.

use crate::error::Pdf2TxtError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where one transcript is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

/// One document to convert and where its transcript goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub input: PathBuf,
    pub destination: Destination,
}

/// How inputs are expanded and where transcripts land.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Explicit output file; only valid when the inputs expand to one job.
    pub output: Option<PathBuf>,
    /// Root that mirrors each input directory's layout.
    pub output_dir: Option<PathBuf>,
    /// Descend into subdirectories of directory inputs.
    pub recursive: bool,
    /// Replace destinations that already exist.
    pub overwrite: bool,
    /// Extension of the written files, without the dot.
    pub extension: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output: None,
            output_dir: None,
            recursive: false,
            overwrite: false,
            extension: "txt".to_string(),
        }
    }
}

/// The expanded run: jobs to convert and jobs left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    pub jobs: Vec<BatchJob>,
    /// Jobs whose destination already exists.
    pub skipped: Vec<BatchJob>,
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// PDF files in `dir`, sorted; subdirectories only when `recursive`.
///
/// Symlinked directories are not followed.
pub fn find_pdfs(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, Pdf2TxtError> {
    let mut found = Vec::new();
    collect_pdfs(dir, recursive, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_pdfs(
    dir: &Path,
    recursive: bool,
    found: &mut Vec<PathBuf>,
) -> Result<(), Pdf2TxtError> {
    let unreadable = |source| Pdf2TxtError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        let kind = entry.file_type().map_err(unreadable)?;
        if kind.is_dir() {
            if recursive {
                collect_pdfs(&path, recursive, found)?;
            }
        } else if is_pdf(&path) && path.is_file() {
            found.push(path);
        }
    }
    Ok(())
}

/// Expand `inputs` into jobs.
///
/// File inputs are taken as given (the converter reports anything that is
/// not a readable PDF). Directory inputs contribute their PDF files, each
/// mirrored under `output_dir` by its path relative to that directory, or
/// written next to the PDF when there is no `output_dir`.
pub fn plan(inputs: &[PathBuf], options: &BatchOptions) -> Result<BatchPlan, Pdf2TxtError> {
    let mut jobs = Vec::new();
    let mut has_dir = false;

    for input in inputs {
        if input.is_dir() {
            has_dir = true;
            let pdfs = find_pdfs(input, options.recursive)?;
            if pdfs.is_empty() {
                warn!("No PDF files found in {}", input.display());
            } else {
                debug!("Found {} PDF files in {}", pdfs.len(), input.display());
            }
            for pdf in pdfs {
                let relative = pdf.strip_prefix(input).unwrap_or(&pdf).to_path_buf();
                let base = options.output_dir.as_deref().unwrap_or(input);
                let destination =
                    Destination::File(base.join(relative).with_extension(&options.extension));
                jobs.push(BatchJob {
                    input: pdf,
                    destination,
                });
            }
        } else {
            jobs.push(BatchJob {
                input: input.clone(),
                destination: Destination::Stdout,
            });
        }
    }

    let to_stdout = options.output.is_none()
        && options.output_dir.is_none()
        && !has_dir
        && jobs.len() == 1;

    if let Some(ref output) = options.output {
        if jobs.len() != 1 {
            return Err(Pdf2TxtError::InvalidConfig(format!(
                "an explicit output file needs exactly one input document, found {}",
                jobs.len()
            )));
        }
        jobs[0].destination = Destination::File(output.clone());
    } else if !to_stdout {
        for job in jobs.iter_mut().filter(|j| j.destination == Destination::Stdout) {
            job.destination = Destination::File(file_destination(&job.input, options));
        }
    }

    check_unique(&jobs)?;

    if options.overwrite || options.output.is_some() {
        return Ok(BatchPlan {
            jobs,
            skipped: Vec::new(),
        });
    }
    let (skipped, jobs): (Vec<_>, Vec<_>) = jobs.into_iter().partition(|job| {
        matches!(job.destination, Destination::File(ref path) if path.exists())
    });
    for job in &skipped {
        debug!("Skipping existing output for {}", job.input.display());
    }
    Ok(BatchPlan { jobs, skipped })
}

/// Output path for a file named directly on the command line.
fn file_destination(input: &Path, options: &BatchOptions) -> PathBuf {
    match options.output_dir {
        Some(ref dir) => {
            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            dir.join(format!("{stem}.{}", options.extension))
        }
        None => input.with_extension(&options.extension),
    }
}

fn check_unique(jobs: &[BatchJob]) -> Result<(), Pdf2TxtError> {
    let mut seen: HashMap<&Path, &Path> = HashMap::new();
    for job in jobs {
        let Destination::File(ref path) = job.destination else {
            continue;
        };
        if let Some(first) = seen.insert(path.as_path(), job.input.as_path()) {
            return Err(Pdf2TxtError::DuplicateDestination {
                path: path.clone(),
                first: first.to_path_buf(),
                second: job.input.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"%PDF-1.7").unwrap();
        path
    }

    /// reports/ with a.pdf, B.PDF, notes.md and archive/2023/c.pdf.
    fn tree() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("reports");
        touch(&root, "a.pdf");
        touch(&root, "B.PDF");
        touch(&root, "notes.md");
        touch(&root, "archive/2023/c.pdf");
        dir
    }

    fn destinations(plan: &BatchPlan) -> Vec<Destination> {
        plan.jobs.iter().map(|j| j.destination.clone()).collect()
    }

    #[test]
    fn directory_lists_top_level_pdfs_only() {
        let dir = tree();
        let root = dir.path().join("reports");
        let found = find_pdfs(&root, false).unwrap();
        assert_eq!(found, vec![root.join("B.PDF"), root.join("a.pdf")]);
    }

    #[test]
    fn recursive_walk_descends_into_subdirectories() {
        let dir = tree();
        let root = dir.path().join("reports");
        let found = find_pdfs(&root, true).unwrap();
        assert_eq!(
            found,
            vec![
                root.join("B.PDF"),
                root.join("a.pdf"),
                root.join("archive/2023/c.pdf"),
            ]
        );
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_pdfs(&dir.path().join("nope"), false).unwrap_err();
        assert!(matches!(err, Pdf2TxtError::InputDirUnreadable { .. }));
    }

    #[test]
    fn output_dir_mirrors_relative_paths() {
        let dir = tree();
        let root = dir.path().join("reports");
        let out = dir.path().join("out");
        let options = BatchOptions {
            output_dir: Some(out.clone()),
            recursive: true,
            ..Default::default()
        };
        let plan = plan(&[root.clone()], &options).unwrap();
        assert_eq!(
            destinations(&plan),
            vec![
                Destination::File(out.join("B.txt")),
                Destination::File(out.join("a.txt")),
                Destination::File(out.join("archive/2023/c.txt")),
            ]
        );
        assert_eq!(plan.jobs[2].input, root.join("archive/2023/c.pdf"));
    }

    #[test]
    fn directory_without_output_dir_writes_next_to_each_pdf() {
        let dir = tree();
        let root = dir.path().join("reports");
        let plan = plan(&[root.clone()], &BatchOptions::default()).unwrap();
        assert_eq!(
            destinations(&plan),
            vec![
                Destination::File(root.join("B.txt")),
                Destination::File(root.join("a.txt")),
            ]
        );
    }

    #[test]
    fn single_file_goes_to_stdout() {
        let plan = plan(&["report.pdf".into()], &BatchOptions::default()).unwrap();
        assert_eq!(destinations(&plan), vec![Destination::Stdout]);
    }

    #[test]
    fn several_files_are_written_next_to_their_inputs() {
        let options = BatchOptions {
            extension: "json".into(),
            ..Default::default()
        };
        let plan = plan(&["a/q1.pdf".into(), "b/q2.pdf".into()], &options).unwrap();
        assert_eq!(
            destinations(&plan),
            vec![
                Destination::File("a/q1.json".into()),
                Destination::File("b/q2.json".into()),
            ]
        );
    }

    #[test]
    fn dotted_stems_keep_their_dots() {
        let options = BatchOptions {
            output_dir: Some("out".into()),
            ..Default::default()
        };
        let plan = plan(&["report.v2.pdf".into()], &options).unwrap();
        assert_eq!(
            destinations(&plan),
            vec![Destination::File("out/report.v2.txt".into())]
        );
    }

    #[test]
    fn same_stem_into_one_output_dir_is_rejected() {
        let options = BatchOptions {
            output_dir: Some("out".into()),
            ..Default::default()
        };
        let err = plan(&["a/report.pdf".into(), "b/report.pdf".into()], &options).unwrap_err();
        match err {
            Pdf2TxtError::DuplicateDestination {
                path,
                first,
                second,
            } => {
                assert_eq!(path, PathBuf::from("out/report.txt"));
                assert_eq!(first, PathBuf::from("a/report.pdf"));
                assert_eq!(second, PathBuf::from("b/report.pdf"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn same_name_in_different_subdirectories_is_kept_apart() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("in");
        touch(&root, "a/report.pdf");
        touch(&root, "b/report.pdf");
        let out = dir.path().join("out");
        let options = BatchOptions {
            output_dir: Some(out.clone()),
            recursive: true,
            ..Default::default()
        };
        let plan = plan(&[root], &options).unwrap();
        assert_eq!(
            destinations(&plan),
            vec![
                Destination::File(out.join("a/report.txt")),
                Destination::File(out.join("b/report.txt")),
            ]
        );
    }

    #[test]
    fn existing_outputs_are_skipped() {
        let dir = tree();
        let root = dir.path().join("reports");
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("a.txt"), "done earlier").unwrap();
        let options = BatchOptions {
            output_dir: Some(out.clone()),
            ..Default::default()
        };

        let plan = plan(&[root.clone()], &options).unwrap();
        assert_eq!(destinations(&plan), vec![Destination::File(out.join("B.txt"))]);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].input, root.join("a.pdf"));
    }

    #[test]
    fn overwrite_keeps_existing_outputs_in_the_plan() {
        let dir = tree();
        let root = dir.path().join("reports");
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("a.txt"), "done earlier").unwrap();
        let options = BatchOptions {
            output_dir: Some(out),
            overwrite: true,
            ..Default::default()
        };

        let plan = plan(&[root], &options).unwrap();
        assert_eq!(plan.jobs.len(), 2);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn explicit_output_needs_exactly_one_document() {
        let dir = tree();
        let options = BatchOptions {
            output: Some("all.txt".into()),
            ..Default::default()
        };
        let err = plan(&[dir.path().join("reports")], &options).unwrap_err();
        assert!(matches!(err, Pdf2TxtError::InvalidConfig(_)));

        let single = plan(&["one.pdf".into()], &options).unwrap();
        assert_eq!(destinations(&single), vec![Destination::File("all.txt".into())]);
    }

    #[test]
    fn empty_directory_yields_no_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(&[dir.path().to_path_buf()], &BatchOptions::default()).unwrap();
        assert!(plan.jobs.is_empty());
    }
}
