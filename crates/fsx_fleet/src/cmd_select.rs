use cmd_lib::*;
use std::fmt;
use std::io::Error;

use crate::config::FleetConfig;
use crate::fsx::{self, FileSystem, StorageVirtualMachine};
use crate::inventory::{AwsCliInventory, TagFilter, pick_least_utilized};

#[derive(clap::Args, Debug, Clone)]
pub struct SelectArgs {
    #[clap(short = 'c', long = "config", long_help = "Fleet config file (toml)")]
    pub config: Option<String>,

    #[clap(long, long_help = "AWS region (defaults to AWS_REGION / aws configure)")]
    pub region: Option<String>,

    #[clap(long, long_help = "Tag filter as KEY=VALUE")]
    pub tag: Option<TagFilter>,

    #[clap(long = "svm", long_help = "SVM name to report endpoints for")]
    pub svm_name: Option<String>,

    #[clap(short = 'o', long = "output", long_help = "Report file")]
    pub output: Option<String>,

    #[clap(long = "iops_weight")]
    pub iops_weight: Option<f64>,

    #[clap(long = "capacity_weight")]
    pub capacity_weight: Option<f64>,
}

impl SelectArgs {
    fn apply(&self, config: &mut FleetConfig) {
        if let Some(region) = &self.region {
            config.aws.region = Some(region.clone());
        }
        if let Some(tag) = &self.tag {
            config.selection.tag_key = Some(tag.key.clone());
            config.selection.tag_value = Some(tag.value.clone());
        }
        if let Some(svm_name) = &self.svm_name {
            config.selection.svm_name = svm_name.clone();
        }
        if let Some(output) = &self.output {
            config.output.file = output.clone();
        }
        if let Some(w) = self.iops_weight {
            config.selection.iops_weight = w;
        }
        if let Some(w) = self.capacity_weight {
            config.selection.capacity_weight = w;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub svm_name: String,
    pub file_system_id: String,
    pub management_ip: String,
    pub iscsi_ips: Vec<String>,
    pub intercluster_ips: Vec<String>,
    pub average_iops: f64,
    pub capacity_utilization: f64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Results for SVM '{}' in File System '{}':",
            self.svm_name, self.file_system_id
        )?;
        writeln!(f, "Cluster Management IP: {}", self.management_ip)?;
        writeln!(f, "SVM iSCSI IPs: {}", self.iscsi_ips.join(", "))?;
        writeln!(f, "Inter-Cluster IPs: {}", self.intercluster_ips.join(", "))?;
        writeln!(f, "Average IOPS: {:?}", self.average_iops)?;
        write!(f, "Capacity Utilization: {:.2}%", self.capacity_utilization)
    }
}

pub fn find_svm<'a>(
    svms: &'a [StorageVirtualMachine],
    svm_name: &str,
) -> Option<&'a StorageVirtualMachine> {
    svms.iter().find(|svm| svm.name == svm_name)
}

/// Management IP, iSCSI IPs and inter-cluster IPs for the report.
pub fn extract_endpoints(
    fs: &FileSystem,
    svm: &StorageVirtualMachine,
) -> Result<(String, Vec<String>, Vec<String>), Error> {
    let fs_endpoints = fs
        .ontap_configuration
        .as_ref()
        .and_then(|c| c.endpoints.as_ref())
        .ok_or_else(|| {
            Error::other(format!(
                "File system {} has no ONTAP endpoints",
                fs.file_system_id
            ))
        })?;
    let management_ip = fs_endpoints
        .management
        .as_ref()
        .and_then(|e| e.ip_addresses.first())
        .cloned()
        .ok_or_else(|| {
            Error::other(format!(
                "File system {} has no management IP",
                fs.file_system_id
            ))
        })?;
    let intercluster_ips = fs_endpoints
        .intercluster
        .as_ref()
        .map(|e| e.ip_addresses.clone())
        .unwrap_or_default();
    let iscsi_ips = svm
        .endpoints
        .as_ref()
        .and_then(|e| e.iscsi.as_ref())
        .map(|e| e.ip_addresses.clone())
        .unwrap_or_default();
    Ok((management_ip, iscsi_ips, intercluster_ips))
}

pub fn run_cmd_select(args: SelectArgs) -> CmdResult {
    let mut config = FleetConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    let region = match &config.aws.region {
        Some(region) => region.clone(),
        None => fsx::get_current_aws_region()?,
    };
    let filter = config.selection.tag_filter()?;
    let weights = config.selection.weights()?;
    let inventory = AwsCliInventory::new(&region, config.selection.metric_query()?);

    let selected = pick_least_utilized(&inventory, &filter, weights)?;
    let fs_id = selected.id().to_string();
    let average_iops = selected.candidate.throughput();
    let capacity_utilization = selected.candidate.capacity_used_ratio();
    info!(
        "Selected file system: {fs_id} (Average IOPS: {average_iops:?}, Capacity Utilization: {capacity_utilization:.2}%)"
    );

    let svm_name = &config.selection.svm_name;
    info!("Retrieving details for SVM named {svm_name} in file system {fs_id}...");
    let svms = fsx::describe_storage_virtual_machines(&region, &fs_id)?;
    let svm = find_svm(&svms, svm_name).ok_or_else(|| {
        Error::other(format!(
            "SVM named '{svm_name}' not found in file system {fs_id}"
        ))
    })?;

    let fs = fsx::describe_file_system(&region, &fs_id)?;
    let (management_ip, iscsi_ips, intercluster_ips) = extract_endpoints(&fs, svm)?;

    let report = Report {
        svm_name: svm_name.clone(),
        file_system_id: fs_id,
        management_ip,
        iscsi_ips,
        intercluster_ips,
        average_iops,
        capacity_utilization,
    };
    let output_file = &config.output.file;
    std::fs::write(output_file, report.to_string())
        .map_err(|e| Error::other(format!("Failed to write {output_file}: {e}")))?;

    println!("{report}");
    info!("Results saved to {output_file}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsx::{Endpoint, FileSystemEndpoints, OntapConfiguration, SvmEndpoints};

    fn endpoint(ips: &[&str]) -> Option<Endpoint> {
        Some(Endpoint {
            ip_addresses: ips.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn file_system(endpoints: Option<FileSystemEndpoints>) -> FileSystem {
        FileSystem {
            file_system_id: "fs-0123".to_string(),
            file_system_type: "ONTAP".to_string(),
            storage_capacity: 1024,
            tags: vec![],
            ontap_configuration: Some(OntapConfiguration {
                consumed_storage_capacity: Some(100),
                endpoints,
            }),
        }
    }

    fn svm(name: &str, iscsi: &[&str]) -> StorageVirtualMachine {
        StorageVirtualMachine {
            name: name.to_string(),
            endpoints: Some(SvmEndpoints {
                iscsi: endpoint(iscsi),
            }),
        }
    }

    #[test]
    fn test_report_format() {
        let report = Report {
            svm_name: "SVM1".to_string(),
            file_system_id: "fs-0123".to_string(),
            management_ip: "10.0.1.5".to_string(),
            iscsi_ips: vec!["10.0.1.20".to_string(), "10.0.2.20".to_string()],
            intercluster_ips: vec!["10.0.1.10".to_string(), "10.0.2.10".to_string()],
            average_iops: 152.5,
            capacity_utilization: 33.3333,
        };
        let expected = "Results for SVM 'SVM1' in File System 'fs-0123':
Cluster Management IP: 10.0.1.5
SVM iSCSI IPs: 10.0.1.20, 10.0.2.20
Inter-Cluster IPs: 10.0.1.10, 10.0.2.10
Average IOPS: 152.5
Capacity Utilization: 33.33%";
        assert_eq!(report.to_string(), expected);
    }

    #[test]
    fn test_report_zero_iops() {
        let report = Report {
            svm_name: "SVM1".to_string(),
            file_system_id: "fs-1".to_string(),
            management_ip: "10.0.0.1".to_string(),
            iscsi_ips: vec![],
            intercluster_ips: vec![],
            average_iops: 0.0,
            capacity_utilization: 0.0,
        };
        let text = report.to_string();
        assert!(text.contains("Average IOPS: 0.0\n"));
        assert!(text.ends_with("Capacity Utilization: 0.00%"));

        let whole = Report {
            average_iops: 100.0,
            ..report
        };
        assert!(whole.to_string().contains("Average IOPS: 100.0\n"));
    }

    #[test]
    fn test_find_svm() {
        let svms = vec![svm("SVM0", &[]), svm("SVM1", &["10.0.0.9"])];
        assert_eq!(
            find_svm(&svms, "SVM1")
                .and_then(|s| s.endpoints.as_ref())
                .and_then(|e| e.iscsi.as_ref())
                .map(|e| e.ip_addresses.clone()),
            Some(vec!["10.0.0.9".to_string()])
        );
        assert!(find_svm(&svms, "svm1").is_none());
    }

    #[test]
    fn test_extract_endpoints() {
        let fs = file_system(Some(FileSystemEndpoints {
            management: endpoint(&["10.0.1.5", "10.0.2.5"]),
            intercluster: endpoint(&["10.0.1.10", "10.0.2.10"]),
        }));
        let (mgmt, iscsi, ic) = extract_endpoints(&fs, &svm("SVM1", &["10.0.1.20"])).unwrap();
        assert_eq!(mgmt, "10.0.1.5");
        assert_eq!(iscsi, vec!["10.0.1.20"]);
        assert_eq!(ic, vec!["10.0.1.10", "10.0.2.10"]);
    }

    #[test]
    fn test_extract_endpoints_missing_management() {
        let fs = file_system(Some(FileSystemEndpoints {
            management: endpoint(&[]),
            intercluster: None,
        }));
        assert!(extract_endpoints(&fs, &svm("SVM1", &[])).is_err());
        assert!(extract_endpoints(&file_system(None), &svm("SVM1", &[])).is_err());
    }

    #[test]
    fn test_args_override_config() {
        let mut config = FleetConfig::default();
        let args = SelectArgs {
            config: None,
            region: Some("us-east-2".to_string()),
            tag: Some(TagFilter::new("myid", "id111111")),
            svm_name: None,
            output: Some("/tmp/ips.txt".to_string()),
            iops_weight: Some(0.2),
            capacity_weight: Some(0.8),
        };
        args.apply(&mut config);
        assert_eq!(config.aws.region.as_deref(), Some("us-east-2"));
        assert_eq!(config.selection.svm_name, "SVM1");
        assert_eq!(config.output.file, "/tmp/ips.txt");
        assert!(config.selection.tag_filter().is_ok());
        assert_eq!(config.selection.weights().unwrap().throughput(), 0.2);
    }
}
