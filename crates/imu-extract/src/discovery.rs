//! Trial discovery over `<root>/p<N>/p<N><no|yes>/<session>/*.csv`

use imu_core::{ImuResult, Intervention, TrialId};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One trial file and its identity
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSource {
    pub path: PathBuf,
    pub id: TrialId,
}

/// Sorted entries of `dir` matching `keep`; a missing directory is logged and yields nothing
fn list_dir(dir: &Path, keep: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| keep(path.as_path()))
        .collect();
    paths.sort();
    paths
}

fn is_csv(path: &Path) -> bool {
    path.is_file() && path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
}

/// Walk the patient range in order, conditions `no` then `yes`, sessions and files sorted
pub fn discover_trials(root: &Path, patients: RangeInclusive<u32>) -> Vec<TrialSource> {
    let mut trials = Vec::new();

    for patient in patients {
        let patient_id = format!("p{}", patient);
        let patient_dir = root.join(&patient_id);
        if !patient_dir.is_dir() {
            warn!("Patient directory {} not found", patient_dir.display());
            continue;
        }

        for intervention in Intervention::ALL {
            let condition_dir = patient_dir.join(format!("{}{}", patient_id, intervention.as_str()));
            if !condition_dir.is_dir() {
                warn!("Condition directory {} not found", condition_dir.display());
                continue;
            }

            for session_dir in list_dir(&condition_dir, Path::is_dir) {
                let session = file_name(&session_dir);
                for path in list_dir(&session_dir, is_csv) {
                    let id = TrialId::new(&patient_id, intervention, &session, &file_name(&path));
                    debug!("Discovered {}", id);
                    trials.push(TrialSource { path, id });
                }
            }
        }
    }

    trials
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Derive the identity of a single file from its position in the tree
pub fn trial_id_from_path(path: &Path) -> ImuResult<TrialId> {
    let csv_filename = file_name(path);
    let session_dir = path.parent();
    let condition_dir = session_dir.and_then(Path::parent);

    let (Some(session_dir), Some(condition_dir)) = (session_dir, condition_dir) else {
        return Err(imu_core::malformed!("{} is not inside <patient>/<condition>/<session>", path.display()));
    };
    let session = file_name(session_dir);
    let condition = file_name(condition_dir);

    let split = condition
        .rfind(|c: char| c.is_ascii_digit())
        .map(|i| i + 1)
        .filter(|&i| condition.starts_with('p') && i > 1);
    let Some(split) = split else {
        return Err(imu_core::malformed!("'{}' is not a p<N><no|yes> directory", condition));
    };

    let (patient_id, intervention) = condition.split_at(split);
    let intervention: Intervention = intervention.parse()?;
    Ok(TrialId::new(patient_id, intervention, &session, &csv_filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use imu_core::SensorId;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "programtime,ax,ay,az,gx,gy,gz\n").unwrap();
    }

    #[test]
    fn test_discovery_order_and_identity() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(root, "p2/p2yes/s1/imu_104_0.csv");
        touch(root, "p2/p2no/s2/imu_105_1.csv");
        touch(root, "p2/p2no/s1/imu_104_0.csv");
        touch(root, "p2/p2no/s1/notes.txt");
        touch(root, "p1/p1no/s1/imu_104_0.csv");

        let trials = discover_trials(root, 1..=3);
        let labels: Vec<String> = trials.iter().map(|t| t.id.to_string()).collect();

        assert_eq!(labels, vec![
            "p1/p1no/s1/imu_104_0.csv",
            "p2/p2no/s1/imu_104_0.csv",
            "p2/p2no/s2/imu_105_1.csv",
            "p2/p2yes/s1/imu_104_0.csv",
        ]);
        assert_eq!(trials[2].id.sensor, Some(SensorId { address: 105, bus: 1 }));
        assert_eq!(trials[3].id.intervention, Intervention::Yes);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        assert!(discover_trials(&dir.path().join("absent"), 1..=34).is_empty());
    }

    #[test]
    fn test_trial_id_from_path() {
        let id = trial_id_from_path(Path::new("csv/p12/p12yes/2024-05-01_10-00-00/imu_104_0.csv")).unwrap();
        assert_eq!(id.patient_id, "p12");
        assert_eq!(id.intervention, Intervention::Yes);
        assert_eq!(id.session, "2024-05-01_10-00-00");
        assert_eq!(id.csv_filename, "imu_104_0.csv");

        assert!(trial_id_from_path(Path::new("csv/p12/p12maybe/s/imu_104_0.csv")).is_err());
        assert!(trial_id_from_path(Path::new("imu_104_0.csv")).is_err());
    }
}
