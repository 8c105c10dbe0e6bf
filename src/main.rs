// ==========================================
// 定制制造扩展 - 命令行入口
// ==========================================
// 用法:
//   custom-manufacturing [--db PATH] init
//   custom-manufacturing [--db PATH] migrate
//   custom-manufacturing [--db PATH] reset-worked-hours <workstation>
//   custom-manufacturing [--db PATH] wear-info <workstation>
//   custom-manufacturing [--db PATH] manufactured-qty <work_order>
//   custom-manufacturing [--db PATH] report <shift-summary|breakdown-summary|parts-replacement>
//                                    [--from YYYY-MM-DD] [--to YYYY-MM-DD] [--plant P] [--csv]
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use custom_manufacturing::app::{get_default_db_path, AppState};
use custom_manufacturing::logging;
use custom_manufacturing::patches;
use custom_manufacturing::report::{ReportFilters, ReportKind};

const USAGE: &str = "usage: custom-manufacturing [--db PATH] \
<init | migrate | reset-worked-hours <ws> | wear-info <ws> | manufactured-qty <wo> | \
report <shift-summary|breakdown-summary|parts-replacement> [--from D] [--to D] [--plant P] [--csv]>";

fn main() -> Result<()> {
    logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = take_option(&mut args, "--db")?.unwrap_or_else(get_default_db_path);

    if args.is_empty() {
        bail!(USAGE);
    }
    let command = args.remove(0);

    tracing::info!(version = custom_manufacturing::VERSION, db = %db_path, command = %command, "启动");
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    state.apply_configured_locale();

    match command.as_str() {
        "init" => {
            println!("{}", serde_json::json!({ "db_path": state.db_path, "initialized": true }));
        }
        "migrate" => {
            let reports = patches::run_all(&state.patch_repo)?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        "reset-worked-hours" => {
            let workstation = args.first().map(String::as_str).unwrap_or("");
            let response = state.workstation_api.reset_worked_hours(workstation)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        "wear-info" => {
            let workstation = args.first().map(String::as_str).unwrap_or("");
            let info = state.workstation_api.get_workstation(workstation)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        "manufactured-qty" => {
            let total = state
                .work_order_api
                .get_total_manufactured_qty(args.first().map(String::as_str))?;
            println!("{}", total);
        }
        "report" => run_report(&state, args)?,
        other => bail!("unknown command `{}`\n{}", other, USAGE),
    }
    Ok(())
}

fn run_report(state: &AppState, mut args: Vec<String>) -> Result<()> {
    let csv = take_flag(&mut args, "--csv");
    let filters = ReportFilters {
        from_date: take_option(&mut args, "--from")?
            .map(|s| parse_date(&s))
            .transpose()?,
        to_date: take_option(&mut args, "--to")?
            .map(|s| parse_date(&s))
            .transpose()?,
        plant: take_option(&mut args, "--plant")?,
    };

    let name = args.first().ok_or_else(|| anyhow!(USAGE))?;
    let kind = ReportKind::from_str(name).ok_or_else(|| anyhow!("unknown report `{}`", name))?;

    let output = state.report_api.run(kind, &filters)?;
    if csv {
        output.write_csv(std::io::stdout().lock())?;
    } else {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("invalid date `{}`", raw))
}

/// 取出 `--name value` 并从参数列表移除
fn take_option(args: &mut Vec<String>, name: &str) -> Result<Option<String>> {
    match args.iter().position(|a| a == name) {
        Some(i) => {
            if i + 1 >= args.len() {
                bail!("{} requires a value", name);
            }
            let value = args.remove(i + 1);
            args.remove(i);
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn take_flag(args: &mut Vec<String>, name: &str) -> bool {
    match args.iter().position(|a| a == name) {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    }
}
