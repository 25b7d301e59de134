//! Thin wrappers over the `aws fsx` / `aws cloudwatch` CLI. Every call asks
//! for `--output json` and is decoded into the typed records below.

use cmd_lib::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::io::Error;

pub const CLOUDWATCH_NAMESPACE: &str = "AWS/FSx";
pub const ONTAP_FILE_SYSTEM_TYPE: &str = "ONTAP";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeFileSystemsOutput {
    #[serde(default)]
    file_systems: Vec<FileSystem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileSystem {
    pub file_system_id: String,
    #[serde(default)]
    pub file_system_type: String,
    #[serde(default)]
    pub storage_capacity: u64,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub ontap_configuration: Option<OntapConfiguration>,
}

impl FileSystem {
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.iter().any(|t| t.key == key && t.value == value)
    }

    pub fn consumed_storage_capacity(&self) -> Option<u64> {
        self.ontap_configuration
            .as_ref()
            .and_then(|c| c.consumed_storage_capacity)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OntapConfiguration {
    #[serde(default)]
    pub consumed_storage_capacity: Option<u64>,
    #[serde(default)]
    pub endpoints: Option<FileSystemEndpoints>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileSystemEndpoints {
    #[serde(default)]
    pub management: Option<Endpoint>,
    #[serde(default, alias = "InterCluster")]
    pub intercluster: Option<Endpoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Endpoint {
    #[serde(default)]
    pub ip_addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStorageVirtualMachinesOutput {
    #[serde(default)]
    storage_virtual_machines: Vec<StorageVirtualMachine>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StorageVirtualMachine {
    pub name: String,
    #[serde(default)]
    pub endpoints: Option<SvmEndpoints>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SvmEndpoints {
    #[serde(default)]
    pub iscsi: Option<Endpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetMetricStatisticsOutput {
    #[serde(default)]
    datapoints: Vec<Datapoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Datapoint {
    #[serde(default)]
    average: Option<f64>,
}

/// CloudWatch query used to derive the throughput metric of a file system.
#[derive(Debug, Clone)]
pub struct MetricQuery {
    pub metric_name: String,
    pub period_secs: u64,
    pub window_secs: u64,
}

impl MetricQuery {
    /// Lookback window as a `TimeDelta`, rejecting values chrono can't hold.
    pub fn window(&self) -> Result<chrono::TimeDelta, Error> {
        i64::try_from(self.window_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .ok_or_else(|| {
                Error::other(format!("metric window of {}s is out of range", self.window_secs))
            })
    }
}

pub fn parse_json<T: DeserializeOwned>(what: &str, output: &str) -> Result<T, Error> {
    serde_json::from_str(output)
        .map_err(|e| Error::other(format!("Failed to parse {what} output: {e}")))
}

pub fn parse_file_systems(output: &str) -> Result<Vec<FileSystem>, Error> {
    let res: DescribeFileSystemsOutput = parse_json("describe-file-systems", output)?;
    Ok(res.file_systems)
}

pub fn parse_storage_virtual_machines(output: &str) -> Result<Vec<StorageVirtualMachine>, Error> {
    let res: DescribeStorageVirtualMachinesOutput =
        parse_json("describe-storage-virtual-machines", output)?;
    Ok(res.storage_virtual_machines)
}

/// Mean of the datapoint averages, `None` when CloudWatch has no data.
pub fn parse_metric_average(output: &str) -> Result<Option<f64>, Error> {
    let res: GetMetricStatisticsOutput = parse_json("get-metric-statistics", output)?;
    let values: Vec<f64> = res.datapoints.iter().filter_map(|d| d.average).collect();
    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
}

/// Region from the environment, falling back to the CLI profile.
pub fn get_current_aws_region() -> FunResult {
    for var in ["AWS_REGION", "AWS_DEFAULT_REGION"] {
        if let Ok(region) = std::env::var(var)
            && !region.is_empty()
        {
            return Ok(region);
        }
    }
    let region = run_fun!(aws configure get region)?;
    if region.is_empty() {
        return Err(Error::other(
            "AWS region not set (config, AWS_REGION or aws configure)",
        ));
    }
    Ok(region)
}

pub fn describe_file_systems(region: &str) -> Result<Vec<FileSystem>, Error> {
    let output = run_fun!(aws fsx describe-file-systems --region $region --output json)?;
    parse_file_systems(&output)
}

pub fn describe_file_system(region: &str, file_system_id: &str) -> Result<FileSystem, Error> {
    let output = run_fun! {
        aws fsx describe-file-systems
            --region $region
            --file-system-ids $file_system_id
            --output json
    }?;
    parse_file_systems(&output)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::other(format!("File system {file_system_id} not found")))
}

pub fn describe_storage_virtual_machines(
    region: &str,
    file_system_id: &str,
) -> Result<Vec<StorageVirtualMachine>, Error> {
    let filter = format!("Name=file-system-id,Values={file_system_id}");
    let output = run_fun! {
        aws fsx describe-storage-virtual-machines
            --region $region
            --filters $filter
            --output json
    }?;
    parse_storage_virtual_machines(&output)
}

pub fn get_metric_average(
    region: &str,
    query: &MetricQuery,
    file_system_id: &str,
) -> Result<Option<f64>, Error> {
    let end = chrono::Utc::now();
    let start = end - query.window()?;
    let start_time = start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let end_time = end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let dimensions = format!("Name=FileSystemId,Value={file_system_id}");
    let metric_name = &query.metric_name;
    let period = query.period_secs;

    let output = run_fun! {
        aws cloudwatch get-metric-statistics
            --region $region
            --namespace $CLOUDWATCH_NAMESPACE
            --metric-name $metric_name
            --dimensions $dimensions
            --start-time $start_time
            --end-time $end_time
            --period $period
            --statistics Average
            --output json
    }?;
    parse_metric_average(&output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE_SYSTEMS_JSON: &str = r#"{
  "FileSystems": [
    {
      "FileSystemId": "fs-0123456789abcdef0",
      "FileSystemType": "ONTAP",
      "StorageCapacity": 1024,
      "Tags": [{"Key": "myid", "Value": "id111111"}],
      "OntapConfiguration": {
        "ConsumedStorageCapacity": 256,
        "Endpoints": {
          "Intercluster": {"DNSName": "ic.fs-0123", "IpAddresses": ["10.0.1.10", "10.0.2.10"]},
          "Management": {"DNSName": "mgmt.fs-0123", "IpAddresses": ["10.0.1.5"]}
        }
      }
    },
    {
      "FileSystemId": "fs-0aaaaaaaaaaaaaaaa",
      "FileSystemType": "LUSTRE",
      "StorageCapacity": 1200
    }
  ]
}"#;

    #[test]
    fn test_parse_file_systems() {
        let fss = parse_file_systems(FILE_SYSTEMS_JSON).unwrap();
        assert_eq!(fss.len(), 2);
        let fs = &fss[0];
        assert_eq!(fs.file_system_type, ONTAP_FILE_SYSTEM_TYPE);
        assert!(fs.has_tag("myid", "id111111"));
        assert!(!fs.has_tag("myid", "other"));
        assert_eq!(fs.consumed_storage_capacity(), Some(256));
        let endpoints = fs
            .ontap_configuration
            .as_ref()
            .and_then(|c| c.endpoints.as_ref())
            .unwrap();
        assert_eq!(
            endpoints.intercluster.as_ref().unwrap().ip_addresses,
            vec!["10.0.1.10", "10.0.2.10"]
        );

        assert!(fss[1].tags.is_empty());
        assert_eq!(fss[1].consumed_storage_capacity(), None);
    }

    #[test]
    fn test_parse_intercluster_alias() {
        let json = r#"{"FileSystems": [{"FileSystemId": "fs-1", "OntapConfiguration": {
            "Endpoints": {"InterCluster": {"IpAddresses": ["10.9.9.9"]}}}}]}"#;
        let fss = parse_file_systems(json).unwrap();
        let ic = fss[0]
            .ontap_configuration
            .as_ref()
            .and_then(|c| c.endpoints.as_ref())
            .and_then(|e| e.intercluster.as_ref())
            .unwrap();
        assert_eq!(ic.ip_addresses, vec!["10.9.9.9"]);
    }

    #[test]
    fn test_parse_storage_virtual_machines() {
        let json = r#"{"StorageVirtualMachines": [
            {"Name": "SVM1", "StorageVirtualMachineId": "svm-01",
             "Endpoints": {"Iscsi": {"IpAddresses": ["10.0.1.20", "10.0.2.20"]}}},
            {"Name": "SVM2", "StorageVirtualMachineId": "svm-02"}
        ]}"#;
        let svms = parse_storage_virtual_machines(json).unwrap();
        assert_eq!(svms.len(), 2);
        assert_eq!(svms[0].name, "SVM1");
        assert_eq!(
            svms[0]
                .endpoints
                .as_ref()
                .and_then(|e| e.iscsi.as_ref())
                .map(|e| e.ip_addresses.len()),
            Some(2)
        );
        assert!(svms[1].endpoints.is_none());
    }

    #[test]
    fn test_parse_metric_average() {
        let json = r#"{"Label": "TotalIops", "Datapoints": [
            {"Timestamp": "2026-10-16T10:00:00Z", "Average": 100.0, "Unit": "Count"},
            {"Timestamp": "2026-10-16T11:00:00Z", "Average": 300.0, "Unit": "Count"}
        ]}"#;
        assert_eq!(parse_metric_average(json).unwrap(), Some(200.0));

        let empty = r#"{"Label": "TotalIops", "Datapoints": []}"#;
        assert_eq!(parse_metric_average(empty).unwrap(), None);

        assert!(parse_metric_average("not json").is_err());
    }

    #[test]
    fn test_metric_window() {
        let query = |window_secs| MetricQuery {
            metric_name: "TotalIops".to_string(),
            period_secs: 3600,
            window_secs,
        };
        assert_eq!(query(7200).window().unwrap(), chrono::TimeDelta::hours(2));
        assert!(query(1 << 62).window().is_err());
        assert!(query(u64::MAX).window().is_err());
    }
}
