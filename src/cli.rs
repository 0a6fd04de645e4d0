use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
pub enum CliCommand {
    Status,
    Scan {
        cidr: String,
    },
    Devices {
        identified: Option<bool>,
        vendor: Option<String>,
        min_score: Option<u8>,
    },
    Identify {
        target: String,
    },
    Reclassify,
    UpdateVendors,
    Help,
    Version,
}

/// A fully parsed invocation: the command plus the global options.
#[derive(Debug, PartialEq, Eq)]
pub struct CliArgs {
    pub command: CliCommand,
    pub db_path: Option<PathBuf>,
}

pub fn version_text() -> String {
    format!("fleetmon {}", env!("CARGO_PKG_VERSION"))
}

pub fn usage_text() -> String {
    format!(
        "{version}
Device fleet monitor — discovery, classification and polling

Usage:
  fleetmon [status]
  fleetmon scan --cidr <RANGE>
  fleetmon devices [--identified | --unidentified] [--vendor <NAME>] [--min-score <N>]
  fleetmon identify --device <MAC|IP>
  fleetmon reclassify
  fleetmon update-vendors
  fleetmon --help
  fleetmon --version

Options:
      --cidr <RANGE>      Subnet to sweep, CIDR notation (e.g. 192.168.88.0/24)
      --device <MAC|IP>   Discovered device to classify
      --identified        Only devices with an assigned role
      --unidentified      Only devices still unclassified
      --vendor <NAME>     Filter by vendor substring
      --min-score <N>     Minimum identification score (1-100)
      --db <PATH>         Database file (default: platform data directory)
  -h, --help              Show this help text
  -V, --version           Show version",
        version = version_text()
    )
}

fn parse_score_arg(flag: &str, raw: &str) -> Result<u8> {
    raw.parse::<u8>()
        .ok()
        .filter(|v| (1..=100).contains(v))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid value for {}: '{}'. Expected an integer between 1 and 100.\n\n{}",
                flag,
                raw,
                usage_text()
            )
        })
}

pub fn parse_cli_args<I, S>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut cidr: Option<String> = None;
    let mut device: Option<String> = None;
    let mut identified: Option<bool> = None;
    let mut vendor: Option<String> = None;
    let mut min_score: Option<u8> = None;
    let mut db_path: Option<PathBuf> = None;

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => {
                return Ok(CliArgs {
                    command: CliCommand::Help,
                    db_path: None,
                });
            }
            "-V" | "--version" => {
                return Ok(CliArgs {
                    command: CliCommand::Version,
                    db_path: None,
                });
            }
            "status" | "scan" | "devices" | "identify" | "reclassify" | "update-vendors" => {
                if command.as_deref().is_some_and(|existing| existing != arg) {
                    return Err(anyhow::anyhow!(
                        "Multiple commands provided. Use only one command.\n\n{}",
                        usage_text()
                    ));
                }
                command = Some(arg.to_string());
            }
            "--cidr" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --cidr.\n\n{}", usage_text())
                })?;
                cidr = Some(value.as_ref().to_string());
            }
            "--device" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --device.\n\n{}", usage_text())
                })?;
                device = Some(value.as_ref().to_string());
            }
            "--vendor" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --vendor.\n\n{}", usage_text())
                })?;
                vendor = Some(value.as_ref().to_string());
            }
            "--min-score" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --min-score.\n\n{}", usage_text())
                })?;
                min_score = Some(parse_score_arg("--min-score", value.as_ref())?);
            }
            "--db" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --db.\n\n{}", usage_text())
                })?;
                db_path = Some(PathBuf::from(value.as_ref()));
            }
            "--identified" => {
                if identified == Some(false) {
                    return Err(anyhow::anyhow!(
                        "--identified and --unidentified are mutually exclusive.\n\n{}",
                        usage_text()
                    ));
                }
                identified = Some(true);
            }
            "--unidentified" => {
                if identified == Some(true) {
                    return Err(anyhow::anyhow!(
                        "--identified and --unidentified are mutually exclusive.\n\n{}",
                        usage_text()
                    ));
                }
                identified = Some(false);
            }
            _ if arg.starts_with("--cidr=") => {
                let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!("Missing value for --cidr.\n\n{}", usage_text()));
                }
                cidr = Some(value.to_string());
            }
            _ if arg.starts_with("--device=") => {
                let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!("Missing value for --device.\n\n{}", usage_text()));
                }
                device = Some(value.to_string());
            }
            _ if arg.starts_with("--vendor=") => {
                let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!("Missing value for --vendor.\n\n{}", usage_text()));
                }
                vendor = Some(value.to_string());
            }
            _ if arg.starts_with("--min-score=") => {
                let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!(
                        "Missing value for --min-score.\n\n{}",
                        usage_text()
                    ));
                }
                min_score = Some(parse_score_arg("--min-score", value)?);
            }
            _ if arg.starts_with("--db=") => {
                let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!("Missing value for --db.\n\n{}", usage_text()));
                }
                db_path = Some(PathBuf::from(value));
            }
            _ => {
                return Err(anyhow::anyhow!("Unknown argument: {arg}\n\n{}", usage_text()));
            }
        }
    }

    let command = match command.as_deref().unwrap_or("status") {
        "status" => {
            reject_filter_flags("status", &identified, &vendor, &min_score)?;
            reject_target_flags("status", &cidr, &device)?;
            CliCommand::Status
        }
        "scan" => {
            reject_filter_flags("scan", &identified, &vendor, &min_score)?;
            if device.is_some() {
                return Err(anyhow::anyhow!(
                    "--device is only valid with identify.\n\n{}",
                    usage_text()
                ));
            }
            let cidr = cidr.ok_or_else(|| {
                anyhow::anyhow!("scan requires --cidr <RANGE>.\n\n{}", usage_text())
            })?;
            CliCommand::Scan { cidr }
        }
        "devices" => {
            reject_target_flags("devices", &cidr, &device)?;
            CliCommand::Devices {
                identified,
                vendor,
                min_score,
            }
        }
        "identify" => {
            reject_filter_flags("identify", &identified, &vendor, &min_score)?;
            if cidr.is_some() {
                return Err(anyhow::anyhow!(
                    "--cidr is only valid with scan.\n\n{}",
                    usage_text()
                ));
            }
            let target = device.ok_or_else(|| {
                anyhow::anyhow!("identify requires --device <MAC|IP>.\n\n{}", usage_text())
            })?;
            CliCommand::Identify { target }
        }
        "reclassify" => {
            reject_filter_flags("reclassify", &identified, &vendor, &min_score)?;
            reject_target_flags("reclassify", &cidr, &device)?;
            CliCommand::Reclassify
        }
        "update-vendors" => {
            reject_filter_flags("update-vendors", &identified, &vendor, &min_score)?;
            reject_target_flags("update-vendors", &cidr, &device)?;
            CliCommand::UpdateVendors
        }
        _ => unreachable!(),
    };

    Ok(CliArgs { command, db_path })
}

fn reject_filter_flags(
    command: &str,
    identified: &Option<bool>,
    vendor: &Option<String>,
    min_score: &Option<u8>,
) -> Result<()> {
    if identified.is_some() || vendor.is_some() || min_score.is_some() {
        return Err(anyhow::anyhow!(
            "--identified/--unidentified/--vendor/--min-score are only valid with devices, not valid with {}.\n\n{}",
            command,
            usage_text()
        ));
    }
    Ok(())
}

fn reject_target_flags(
    command: &str,
    cidr: &Option<String>,
    device: &Option<String>,
) -> Result<()> {
    if cidr.is_some() || device.is_some() {
        return Err(anyhow::anyhow!(
            "--cidr/--device are not valid with {}.\n\n{}",
            command,
            usage_text()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_help_flag() {
        let args = ["fleetmon", "--help"];
        let parsed = parse_cli_args(args).expect("help args should parse");
        assert_eq!(parsed.command, CliCommand::Help);
    }

    #[test]
    fn parse_version_flag() {
        let args = ["fleetmon", "-V"];
        let parsed = parse_cli_args(args).expect("version args should parse");
        assert_eq!(parsed.command, CliCommand::Version);
    }

    #[test]
    fn parse_default_status_command() {
        let args = ["fleetmon"];
        let parsed = parse_cli_args(args).expect("default args should parse");
        assert_eq!(parsed.command, CliCommand::Status);
        assert_eq!(parsed.db_path, None);
    }

    #[test]
    fn parse_scan_with_cidr() {
        let args = ["fleetmon", "scan", "--cidr", "192.168.88.0/24"];
        let parsed = parse_cli_args(args).expect("scan should parse");
        assert_eq!(
            parsed.command,
            CliCommand::Scan {
                cidr: "192.168.88.0/24".to_string()
            }
        );
    }

    #[test]
    fn parse_scan_requires_cidr() {
        let args = ["fleetmon", "scan"];
        let err = parse_cli_args(args).expect_err("scan without --cidr should fail");
        assert!(err.to_string().contains("scan requires --cidr"));
    }

    #[test]
    fn parse_devices_with_filters() {
        let args = [
            "fleetmon",
            "devices",
            "--identified",
            "--vendor",
            "MikroTik",
            "--min-score",
            "50",
        ];
        let parsed = parse_cli_args(args).expect("devices with filters should parse");
        assert_eq!(
            parsed.command,
            CliCommand::Devices {
                identified: Some(true),
                vendor: Some("MikroTik".to_string()),
                min_score: Some(50),
            }
        );
    }

    #[test]
    fn parse_devices_equals_form_flags() {
        let args = ["fleetmon", "devices", "--vendor=Ubiquiti", "--min-score=30"];
        let parsed = parse_cli_args(args).expect("equals-form flags should parse");
        assert_eq!(
            parsed.command,
            CliCommand::Devices {
                identified: None,
                vendor: Some("Ubiquiti".to_string()),
                min_score: Some(30),
            }
        );
    }

    #[test]
    fn parse_devices_rejects_conflicting_identity_filters() {
        let args = ["fleetmon", "devices", "--identified", "--unidentified"];
        let err = parse_cli_args(args).expect_err("conflicting filters should fail");
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn parse_min_score_out_of_range_errors() {
        let args = ["fleetmon", "devices", "--min-score", "101"];
        let err = parse_cli_args(args).expect_err("out-of-range score should fail");
        assert!(err.to_string().contains("Invalid value for --min-score"));
    }

    #[test]
    fn parse_identify_with_device() {
        let args = ["fleetmon", "identify", "--device", "aa:bb:cc:dd:ee:ff"];
        let parsed = parse_cli_args(args).expect("identify should parse");
        assert_eq!(
            parsed.command,
            CliCommand::Identify {
                target: "aa:bb:cc:dd:ee:ff".to_string()
            }
        );
    }

    #[test]
    fn parse_identify_requires_device() {
        let args = ["fleetmon", "identify"];
        let err = parse_cli_args(args).expect_err("identify without --device should fail");
        assert!(err.to_string().contains("identify requires --device"));
    }

    #[test]
    fn parse_global_db_flag() {
        let args = ["fleetmon", "reclassify", "--db", "/tmp/fleet.db"];
        let parsed = parse_cli_args(args).expect("db flag should parse");
        assert_eq!(parsed.command, CliCommand::Reclassify);
        assert_eq!(parsed.db_path, Some(PathBuf::from("/tmp/fleet.db")));
    }

    #[test]
    fn parse_status_rejects_scan_flags() {
        let args = ["fleetmon", "status", "--cidr", "10.0.0.0/24"];
        let err = parse_cli_args(args).expect_err("status should reject scan flags");
        assert!(err.to_string().contains("not valid with status"));
    }

    #[test]
    fn parse_update_vendors_command() {
        let args = ["fleetmon", "update-vendors"];
        let parsed = parse_cli_args(args).expect("update-vendors should parse");
        assert_eq!(parsed.command, CliCommand::UpdateVendors);
    }

    #[test]
    fn parse_multiple_commands_errors() {
        let args = ["fleetmon", "scan", "devices"];
        let err = parse_cli_args(args).expect_err("two commands should fail");
        assert!(err.to_string().contains("Multiple commands"));
    }

    #[test]
    fn parse_unknown_argument_errors() {
        let args = ["fleetmon", "--frobnicate"];
        let err = parse_cli_args(args).expect_err("unknown flag should fail");
        assert!(err.to_string().contains("Unknown argument"));
    }
}
