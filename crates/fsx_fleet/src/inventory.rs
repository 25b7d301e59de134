use fleet_selector::{Candidate, ScoredCandidate, Weights};
use log::info;
use std::io::Error;
use std::str::FromStr;

use crate::fsx::{self, FileSystem, MetricQuery, ONTAP_FILE_SYSTEM_TYPE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub key: String,
    pub value: String,
}

impl TagFilter {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn matches(&self, fs: &FileSystem) -> bool {
        fs.file_system_type == ONTAP_FILE_SYSTEM_TYPE && fs.has_tag(&self.key, &self.value)
    }
}

impl std::fmt::Display for TagFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl FromStr for TagFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(Self::new(key, value)),
            _ => Err(format!("expected KEY=VALUE, got '{s}'")),
        }
    }
}

/// Read-only source of selection candidates.
pub trait Inventory {
    fn list_candidates(&self, filter: &TagFilter) -> Result<Vec<Candidate>, Error>;
}

pub struct AwsCliInventory {
    region: String,
    metric: MetricQuery,
}

impl AwsCliInventory {
    pub fn new(region: &str, metric: MetricQuery) -> Self {
        Self {
            region: region.to_string(),
            metric,
        }
    }

    fn throughput_of(&self, file_system_id: &str) -> Option<f64> {
        match fsx::get_metric_average(&self.region, &self.metric, file_system_id) {
            Ok(Some(v)) => Some(v),
            Ok(None) => {
                info!(
                    "No {} datapoints for {file_system_id}, using 0",
                    self.metric.metric_name
                );
                None
            }
            Err(e) => {
                info!(
                    "Error retrieving {} for {file_system_id}: {e}, using 0",
                    self.metric.metric_name
                );
                None
            }
        }
    }
}

impl Inventory for AwsCliInventory {
    fn list_candidates(&self, filter: &TagFilter) -> Result<Vec<Candidate>, Error> {
        info!("Retrieving FSx for ONTAP file systems with tag {filter}...");
        let file_systems = fsx::describe_file_systems(&self.region)?;
        let candidates = matching_file_systems(file_systems, filter)
            .into_iter()
            .map(|fs| {
                let throughput = self.throughput_of(&fs.file_system_id);
                to_candidate(&fs, throughput)
            })
            .collect();
        Ok(candidates)
    }
}

pub fn matching_file_systems(file_systems: Vec<FileSystem>, filter: &TagFilter) -> Vec<FileSystem> {
    file_systems
        .into_iter()
        .filter(|fs| filter.matches(fs))
        .collect()
}

pub fn to_candidate(fs: &FileSystem, throughput: Option<f64>) -> Candidate {
    Candidate::new(
        fs.file_system_id.clone(),
        throughput,
        fs.storage_capacity,
        fs.consumed_storage_capacity(),
    )
}

/// List and pick the least utilized candidate.
pub fn pick_least_utilized(
    inventory: &impl Inventory,
    filter: &TagFilter,
    weights: Weights,
) -> Result<ScoredCandidate, Error> {
    let candidates = inventory.list_candidates(filter)?;
    if candidates.is_empty() {
        return Err(Error::other(format!(
            "No FSx for ONTAP file systems found with tag {filter}"
        )));
    }

    info!("Determining the least utilized file system (IOPS and capacity)...");
    fleet_selector::select_least_utilized(&candidates, weights).map_err(|e| {
        Error::other(format!(
            "Failed to determine the least utilized file system: {e}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsx::{OntapConfiguration, Tag};

    struct FakeInventory(Vec<Candidate>);

    impl Inventory for FakeInventory {
        fn list_candidates(&self, _filter: &TagFilter) -> Result<Vec<Candidate>, Error> {
            Ok(self.0.clone())
        }
    }

    fn file_system(id: &str, fs_type: &str, tags: &[(&str, &str)]) -> FileSystem {
        FileSystem {
            file_system_id: id.to_string(),
            file_system_type: fs_type.to_string(),
            storage_capacity: 1024,
            tags: tags
                .iter()
                .map(|(k, v)| Tag {
                    key: k.to_string(),
                    value: v.to_string(),
                })
                .collect(),
            ontap_configuration: Some(OntapConfiguration {
                consumed_storage_capacity: Some(512),
                endpoints: None,
            }),
        }
    }

    #[test]
    fn test_tag_filter_from_str() {
        let filter: TagFilter = "myid=id111111".parse().unwrap();
        assert_eq!(filter, TagFilter::new("myid", "id111111"));
        let filter: TagFilter = "env=a=b".parse().unwrap();
        assert_eq!(filter.value, "a=b");
        assert!("novalue".parse::<TagFilter>().is_err());
        assert!("=x".parse::<TagFilter>().is_err());
    }

    #[test]
    fn test_matching_file_systems() {
        let filter = TagFilter::new("myid", "id111111");
        let fss = vec![
            file_system("fs-1", "ONTAP", &[("myid", "id111111")]),
            file_system("fs-2", "ONTAP", &[("myid", "other")]),
            file_system("fs-3", "OPENZFS", &[("myid", "id111111")]),
            file_system("fs-4", "ONTAP", &[("Name", "x"), ("myid", "id111111")]),
            file_system("fs-5", "ONTAP", &[]),
        ];
        let ids: Vec<String> = matching_file_systems(fss, &filter)
            .into_iter()
            .map(|fs| fs.file_system_id)
            .collect();
        assert_eq!(ids, vec!["fs-1", "fs-4"]);
    }

    #[test]
    fn test_to_candidate() {
        let fs = file_system("fs-1", "ONTAP", &[]);
        let c = to_candidate(&fs, Some(12.5));
        assert_eq!(c.id, "fs-1");
        assert_eq!(c.total_capacity, 1024);
        assert_eq!(c.consumed_capacity, Some(512));
        assert_eq!(c.capacity_used_ratio(), 50.0);
    }

    #[test]
    fn test_pick_least_utilized() {
        let inventory = FakeInventory(vec![
            Candidate::new("fs-a", Some(100.0), 100, Some(50)),
            Candidate::new("fs-b", Some(200.0), 100, Some(80)),
        ]);
        let filter = TagFilter::new("k", "v");
        let selected = pick_least_utilized(&inventory, &filter, Weights::default()).unwrap();
        assert_eq!(selected.id(), "fs-a");
    }

    #[test]
    fn test_pick_from_empty_inventory() {
        let filter = TagFilter::new("k", "v");
        let err = pick_least_utilized(&FakeInventory(vec![]), &filter, Weights::default())
            .unwrap_err();
        assert!(err.to_string().contains("k=v"));

        let zero = FakeInventory(vec![Candidate::new("fs-z", None, 0, None)]);
        let err = pick_least_utilized(&zero, &filter, Weights::default()).unwrap_err();
        assert!(err.to_string().contains("no eligible candidates"));
    }
}
