mod cmd_grow_xfs;
mod cmd_lun_grow;
mod cmd_peer;
mod cmd_select;
mod config;
mod fsx;
mod inventory;
mod ontap;

use clap::Parser;
use cmd_lib::*;
use std::io::Write;

#[derive(Parser)]
#[clap(name = "fsx-fleet", about = "FSx for NetApp ONTAP fleet tasks")]
enum Cmd {
    #[clap(about = "Pick the least utilized ONTAP file system and report its SVM endpoints")]
    Select(cmd_select::SelectArgs),

    #[clap(about = "Resize an ONTAP volume and the LUN inside it")]
    LunGrow(cmd_lun_grow::LunGrowArgs),

    #[clap(about = "Peer two ONTAP clusters and their SVMs")]
    Peer {
        #[clap(short = 'c', long = "config", long_help = "Peering config file (toml)")]
        config: String,
    },

    #[clap(about = "Extend an LVM backed XFS mount into all free space")]
    GrowXfs {
        #[clap(short = 'm', long = "mount_point", long_help = "Mounted XFS filesystem")]
        mount_point: String,

        #[clap(
            long = "pv",
            long_help = "Physical volume to pvresize first (repeatable)"
        )]
        pvs: Vec<String>,
    },
}

#[cmd_lib::main]
fn main() -> CmdResult {
    env_logger::Builder::new()
        .format(|buf, record| {
            let timestamp = chrono::Local::now().format("%b %d %H:%M:%S").to_string();
            let process_name = std::env::current_exe()
                .ok()
                .and_then(|path| {
                    path.file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                })
                .unwrap_or_else(|| "fsx-fleet".to_string());
            writeln!(
                buf,
                "{} {}[{}]: {} {}",
                timestamp,
                process_name,
                std::process::id(),
                record.level(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match Cmd::parse() {
        Cmd::Select(args) => cmd_select::run_cmd_select(args)?,
        Cmd::LunGrow(args) => cmd_lun_grow::run_cmd_lun_grow(args)?,
        Cmd::Peer { config } => cmd_peer::run_cmd_peer(&config)?,
        Cmd::GrowXfs { mount_point, pvs } => cmd_grow_xfs::run_cmd_grow_xfs(&mount_point, &pvs)?,
    }
    Ok(())
}
