use cmd_lib::*;
use std::io::Error;

const GIB: f64 = (1u64 << 30) as f64;

#[derive(Debug, PartialEq, Eq)]
pub struct MountInfo {
    pub fs_type: String,
    pub source: String,
}

/// Parses `findmnt -n -o FSTYPE,SOURCE` output.
pub fn parse_findmnt(output: &str) -> Result<MountInfo, Error> {
    let mut fields = output.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(fs_type), Some(source)) => Ok(MountInfo {
            fs_type: fs_type.to_string(),
            source: source.to_string(),
        }),
        _ => Err(Error::other(format!("unexpected findmnt output: {output}"))),
    }
}

pub fn parse_bytes(what: &str, output: &str) -> Result<u64, Error> {
    output
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::other(format!("invalid {what}: {output}")))
}

fn mount_info(mount_point: &str) -> Result<MountInfo, Error> {
    let output = run_fun!(findmnt -n -o FSTYPE,SOURCE --mountpoint $mount_point)
        .map_err(|e| Error::other(format!("{mount_point} is not a mount point: {e}")))?;
    parse_findmnt(&output)
}

fn mount_size(mount_point: &str) -> Result<u64, Error> {
    let output = run_fun!(findmnt -bn -o SIZE --mountpoint $mount_point)?;
    parse_bytes("mount size", &output)
}

fn vg_free_bytes(lv_path: &str) -> Result<u64, Error> {
    let vg = run_fun!(lvs --noheadings -o vg_name $lv_path)
        .map_err(|e| Error::other(format!("{lv_path} is not an LVM logical volume: {e}")))?;
    let vg = vg.trim();
    let free = run_fun!(vgs --noheadings --nosuffix --units b -o vg_free $vg)?;
    parse_bytes("vg_free", &free)
}

pub fn run_cmd_grow_xfs(mount_point: &str, pvs: &[String]) -> CmdResult {
    let MountInfo { fs_type, source } = mount_info(mount_point)?;
    if fs_type != "xfs" {
        return Err(Error::other(format!(
            "{mount_point} is {fs_type}, only xfs is supported"
        )));
    }
    let size_before = mount_size(mount_point)?;
    info!(
        "{mount_point} ({source}) is {:.2} GiB before growing",
        size_before as f64 / GIB
    );

    if !pvs.is_empty() {
        run_cmd! {
            info "Resizing physical volumes ${pvs:?}";
            pvresize $[pvs];
        }?;
    }

    if vg_free_bytes(&source)? > 0 {
        run_cmd! {
            info "Extending $source into all free extents";
            lvextend -l "+100%FREE" $source;
        }?;
    } else {
        info!("No free extents for {source}, skipping lvextend");
    }

    run_cmd! {
        info "Growing XFS on $mount_point";
        xfs_growfs $mount_point >/dev/null;
    }?;

    let size_after = mount_size(mount_point)?;
    info!(
        "{mount_point} is {:.2} GiB after growing (+{:.2} GiB)",
        size_after as f64 / GIB,
        size_after.saturating_sub(size_before) as f64 / GIB
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_findmnt() {
        assert_eq!(
            parse_findmnt("xfs    /dev/mapper/vg_data-lv_data\n").unwrap(),
            MountInfo {
                fs_type: "xfs".to_string(),
                source: "/dev/mapper/vg_data-lv_data".to_string(),
            }
        );
        assert!(parse_findmnt("").is_err());
        assert!(parse_findmnt("xfs").is_err());
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(parse_bytes("size", "  10737418240\n").unwrap(), 10737418240);
        assert_eq!(parse_bytes("vg_free", "0").unwrap(), 0);
        assert!(parse_bytes("size", "10G").is_err());
    }
}
