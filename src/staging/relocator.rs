use crate::config::StagingConfig;
use crate::session::RecordClass;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct RelocationSummary {
    pub files_moved: usize,
    pub moved: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl RelocationSummary {
    pub fn anything_moved(&self) -> bool {
        self.files_moved > 0
    }
}

/// Scans the candidate staging bases for completed transfers and moves
/// them into the working directory under class-tagged names
/// (`contact_<i>.vcf`, `callhist_<i>.vcf`).
///
/// Every move is best effort: a failure is recorded and the scan
/// continues with the remaining files.
pub struct TransferRelocator<'a> {
    staging: &'a StagingConfig,
    working_dir: PathBuf,
    contacts_bound: usize,
    call_history_bound: usize,
}

impl<'a> TransferRelocator<'a> {
    pub fn new(
        staging: &'a StagingConfig,
        working_dir: PathBuf,
        contacts_bound: usize,
        call_history_bound: usize,
    ) -> Self {
        Self {
            staging,
            working_dir,
            contacts_bound,
            call_history_bound,
        }
    }

    pub fn relocate(&self) -> RelocationSummary {
        let mut summary = RelocationSummary::default();

        for base in &self.staging.candidate_bases {
            let staging_dir = base.join(&self.staging.staging_subdir);

            if !staging_dir.is_dir() {
                continue;
            }

            self.drain_class(
                &staging_dir,
                RecordClass::Contacts,
                self.contacts_bound,
                &mut summary,
            );
            self.drain_class(
                &staging_dir,
                RecordClass::CallHistory,
                self.call_history_bound,
                &mut summary,
            );

            self.remove_if_empty(&staging_dir);
        }

        summary
    }

    fn drain_class(
        &self,
        staging_dir: &Path,
        class: RecordClass,
        bound: usize,
        summary: &mut RelocationSummary,
    ) {
        for index in 1..=bound {
            let staged_name = match class {
                RecordClass::Contacts => format!("{}.vcf", index),
                RecordClass::CallHistory => format!("CALL_{}.vcf", index),
            };
            let source = staging_dir.join(&staged_name);

            if !source.exists() {
                continue;
            }

            let destination = self
                .working_dir
                .join(format!("{}_{}.vcf", class.working_prefix(), index));

            match move_file(&source, &destination) {
                Ok(()) => {
                    summary.files_moved += 1;
                    summary.moved.push(destination);
                }
                Err(e) => {
                    summary
                        .errors
                        .push(format!("Error moving {}: {}", source.display(), e));
                }
            }
        }
    }

    fn remove_if_empty(&self, staging_dir: &Path) {
        let is_empty = fs::read_dir(staging_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);

        if is_empty {
            let _ = fs::remove_dir(staging_dir);
        }
    }
}

/// Rename with copy-and-delete fallback: the staging base and the working
/// directory may live on different filesystems.
fn move_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(source, destination)?;
            fs::remove_file(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn staging_config(bases: Vec<PathBuf>) -> StagingConfig {
        StagingConfig {
            staging_subdir: "uio".to_string(),
            candidate_bases: bases,
        }
    }

    #[test]
    fn test_relocates_and_renames_both_classes() {
        let base = TempDir::new().unwrap();
        let working = TempDir::new().unwrap();

        let uio = base.path().join("uio");
        fs::create_dir(&uio).unwrap();
        fs::write(uio.join("1.vcf"), "FN:Alice\n").unwrap();
        fs::write(uio.join("2.vcf"), "FN:Bob\n").unwrap();
        fs::write(uio.join("CALL_1.vcf"), "FN:Carol\n").unwrap();

        let config = staging_config(vec![base.path().to_path_buf()]);
        let relocator =
            TransferRelocator::new(&config, working.path().to_path_buf(), 1000, 20);

        let summary = relocator.relocate();

        assert_eq!(summary.files_moved, 3);
        assert!(summary.errors.is_empty());
        assert!(working.path().join("contact_1.vcf").exists());
        assert!(working.path().join("contact_2.vcf").exists());
        assert!(working.path().join("callhist_1.vcf").exists());

        // The drained staging directory is removed.
        assert!(!uio.exists());
    }

    #[test]
    fn test_missing_candidate_bases_are_skipped() {
        let base = TempDir::new().unwrap();
        let working = TempDir::new().unwrap();

        let uio = base.path().join("uio");
        fs::create_dir(&uio).unwrap();
        fs::write(uio.join("1.vcf"), "FN:Alice\n").unwrap();

        let config = staging_config(vec![
            PathBuf::from("/nonexistent/base"),
            base.path().to_path_buf(),
        ]);
        let relocator = TransferRelocator::new(&config, working.path().to_path_buf(), 10, 10);

        let summary = relocator.relocate();
        assert_eq!(summary.files_moved, 1);
        assert!(working.path().join("contact_1.vcf").exists());
    }

    #[test]
    fn test_nothing_to_relocate() {
        let base = TempDir::new().unwrap();
        let working = TempDir::new().unwrap();

        let config = staging_config(vec![base.path().to_path_buf()]);
        let relocator = TransferRelocator::new(&config, working.path().to_path_buf(), 10, 10);

        let summary = relocator.relocate();
        assert!(!summary.anything_moved());
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_non_empty_staging_dir_is_preserved() {
        let base = TempDir::new().unwrap();
        let working = TempDir::new().unwrap();

        let uio = base.path().join("uio");
        fs::create_dir(&uio).unwrap();
        fs::write(uio.join("1.vcf"), "FN:Alice\n").unwrap();
        // Not matched by either naming scheme, so it stays behind.
        fs::write(uio.join("unrelated.txt"), "leftover").unwrap();

        let config = staging_config(vec![base.path().to_path_buf()]);
        let relocator = TransferRelocator::new(&config, working.path().to_path_buf(), 10, 10);

        let summary = relocator.relocate();
        assert_eq!(summary.files_moved, 1);
        assert!(uio.exists());
        assert!(uio.join("unrelated.txt").exists());
    }

    #[test]
    fn test_call_history_bound_limits_scan() {
        let base = TempDir::new().unwrap();
        let working = TempDir::new().unwrap();

        let uio = base.path().join("uio");
        fs::create_dir(&uio).unwrap();
        fs::write(uio.join("CALL_1.vcf"), "a").unwrap();
        fs::write(uio.join("CALL_5.vcf"), "b").unwrap();

        let config = staging_config(vec![base.path().to_path_buf()]);
        let relocator = TransferRelocator::new(&config, working.path().to_path_buf(), 10, 3);

        let summary = relocator.relocate();
        assert_eq!(summary.files_moved, 1);
        assert!(working.path().join("callhist_1.vcf").exists());
        assert!(!working.path().join("callhist_5.vcf").exists());
        // CALL_5.vcf is beyond the bound and stays in staging.
        assert!(uio.join("CALL_5.vcf").exists());
    }
}
