use cmd_lib::*;
use std::io::Error;

use crate::ontap::OntapClient;

// 5% of the volume is kept as LUN overhead
const LUN_SPACE_PERCENT: u128 = 95;

#[derive(clap::Args, Debug, Clone)]
pub struct LunGrowArgs {
    #[clap(long, long_help = "ONTAP cluster management IP or hostname")]
    pub cluster: String,

    #[clap(long, long_help = "SVM name")]
    pub vserver: String,

    #[clap(long)]
    pub volume: String,

    #[clap(long = "lun_path", long_help = "LUN path (e.g. /vol/vol1/lun1)")]
    pub lun_path: String,

    #[clap(long, long_help = "New volume size in bytes")]
    pub size: u64,

    #[clap(long)]
    pub username: String,

    #[clap(long, env = "ONTAP_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[clap(long, long_help = "Skip TLS certificate verification")]
    pub insecure: bool,
}

pub fn lun_size_for(volume_size: u64) -> u64 {
    (volume_size as u128 * LUN_SPACE_PERCENT / 100) as u64
}

/// Rejects shrinking: both the new volume size and the derived LUN size must
/// not be smaller than what is currently provisioned.
pub fn check_grow(
    volume_size: u64,
    lun_size: u64,
    current_volume: Option<u64>,
    current_lun: Option<u64>,
) -> Result<(), Error> {
    if lun_size == 0 {
        return Err(Error::other(format!(
            "Volume size {volume_size} is too small for a LUN"
        )));
    }
    if let Some(current) = current_volume
        && volume_size < current
    {
        return Err(Error::other(format!(
            "New volume size {volume_size} is smaller than current size {current}, shrinking is not supported"
        )));
    }
    if let Some(current) = current_lun
        && lun_size < current
    {
        return Err(Error::other(format!(
            "New LUN size {lun_size} is smaller than current size {current}, shrinking is not supported"
        )));
    }
    Ok(())
}

pub fn run_cmd_lun_grow(args: LunGrowArgs) -> CmdResult {
    let client = OntapClient::new(&args.cluster, &args.username, &args.password, !args.insecure)?;
    let volume_size = args.size;
    let lun_size = lun_size_for(volume_size);

    let volume = client.get_volume(&args.vserver, &args.volume)?;
    let lun = client.get_lun(&args.vserver, &args.lun_path)?;
    check_grow(volume_size, lun_size, volume.size, lun.size())?;

    info!(
        "Modifying volume {} to size {volume_size} bytes",
        args.volume
    );
    let status = client.resize_volume(&volume.uuid, volume_size)?;
    info!("Volume modification successful: Status {status}");

    if lun.size() == Some(lun_size) {
        info!("LUN {} is already {lun_size} bytes", args.lun_path);
        return Ok(());
    }
    info!("Resizing LUN {} to size {lun_size} bytes", args.lun_path);
    let status = client.resize_lun(&lun.uuid, lun_size)?;
    info!("LUN resize successful: Status {status}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lun_size_for() {
        assert_eq!(lun_size_for(100), 95);
        assert_eq!(lun_size_for(107374182400), 102005473280);
        assert_eq!(lun_size_for(1), 0);
        assert_eq!(lun_size_for(0), 0);
    }

    #[test]
    fn test_check_grow() {
        assert!(check_grow(200, 190, Some(100), Some(95)).is_ok());
        assert!(check_grow(200, 190, None, None).is_ok());
        assert!(check_grow(100, 95, Some(100), Some(95)).is_ok());

        let err = check_grow(50, 47, Some(100), Some(95)).unwrap_err();
        assert!(err.to_string().contains("shrinking"));
        assert!(check_grow(200, 190, Some(100), Some(195)).is_err());
        assert!(check_grow(1, 0, None, None).is_err());
    }
}
