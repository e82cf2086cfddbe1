//! # Command-Line Interface / 命令行接口
//!
//! Builds the `wheel-matrix` command line with localized help text and
//! dispatches to the subcommands.
//!
//! 构建带有本地化帮助文本的 `wheel-matrix` 命令行，并分派到各子命令。

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf};

use crate::core::config::CONFIG_FILE_NAME;
use crate::core::models::Trigger;
use crate::infra::t;

pub mod commands {
    pub mod artifacts;
    pub mod init;
    pub mod plan;
    pub mod run;
}

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` or `--lang=<VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter().enumerate().find_map(|(pos, arg)| {
        if arg == "--lang" {
            args.get(pos + 1).cloned()
        } else {
            arg.strip_prefix("--lang=").map(str::to_string)
        }
    })
}

fn config_arg(locale: &str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help(t!("arg_config", locale = locale).to_string())
        .value_name("CONFIG")
        .default_value(CONFIG_FILE_NAME)
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn store_arg(locale: &str) -> Arg {
    Arg::new("store")
        .long("store")
        .help(t!("arg_store", locale = locale).to_string())
        .value_name("DIR")
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("wheel-matrix")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cmd_run_about", locale = locale).to_string())
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(config_arg(locale))
                .arg(
                    Arg::new("project-dir")
                        .long("project-dir")
                        .help(t!("arg_project_dir", locale = locale).to_string())
                        .value_name("PROJECT_DIR")
                        .default_value(".")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("event")
                        .long("event")
                        .help(t!("arg_event", locale = locale).to_string())
                        .value_name("EVENT")
                        .default_value("workflow_dispatch")
                        .value_parser(|s: &str| s.parse::<Trigger>().map_err(|e| e.to_string()))
                        .action(ArgAction::Set),
                )
                .arg(store_arg(locale))
                .arg(
                    Arg::new("total-runners")
                        .long("total-runners")
                        .help(t!("arg_total_runners", locale = locale).to_string())
                        .value_name("TOTAL_RUNNERS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("runner-index"),
                )
                .arg(
                    Arg::new("runner-index")
                        .long("runner-index")
                        .help(t!("arg_runner_index", locale = locale).to_string())
                        .value_name("RUNNER_INDEX")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("total-runners"),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about(t!("cmd_plan_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help(t!("arg_json", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("arg_output", locale = locale).to_string())
                        .value_name("OUTPUT")
                        .default_value(CONFIG_FILE_NAME)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("arg_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("artifacts")
                .about(t!("cmd_artifacts_about", locale = locale).to_string())
                .subcommand_required(true)
                .subcommand(
                    Command::new("list")
                        .about(t!("cmd_artifacts_list_about", locale = locale).to_string())
                        .arg(store_arg(locale).default_value("artifacts")),
                )
                .subcommand(
                    Command::new("download")
                        .about(t!("cmd_artifacts_download_about", locale = locale).to_string())
                        .arg(
                            Arg::new("name")
                                .help(t!("arg_artifact_name", locale = locale).to_string())
                                .value_name("NAME")
                                .required(true)
                                .action(ArgAction::Set),
                        )
                        .arg(
                            Arg::new("dest")
                                .long("dest")
                                .help(t!("arg_dest", locale = locale).to_string())
                                .value_name("DIR")
                                .default_value(".")
                                .value_parser(clap::value_parser!(PathBuf))
                                .action(ArgAction::Set),
                        )
                        .arg(store_arg(locale).default_value("artifacts")),
                ),
        )
}

/// Parses the process arguments and runs the selected subcommand.
pub async fn run() -> Result<()> {
    // Pre-parse language and initialize i18n first.
    let requested = pre_parse_language();
    let language = crate::resolve_locale(requested.as_deref());
    rust_i18n::set_locale(&language);

    let matches = build_cli(&language).get_matches();
    dispatch(&matches, requested.is_some(), &language).await
}

async fn dispatch(matches: &ArgMatches, lang_explicit: bool, language: &str) -> Result<()> {
    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let args = commands::run::RunArgs {
                jobs: run_matches.get_one::<usize>("jobs").copied(),
                config: path_arg(run_matches, "config"),
                project_dir: path_arg(run_matches, "project-dir"),
                event: run_matches
                    .get_one::<Trigger>("event")
                    .copied()
                    .unwrap_or(Trigger::WorkflowDispatch),
                store: run_matches.get_one::<PathBuf>("store").cloned(),
                total_runners: run_matches.get_one::<usize>("total-runners").copied(),
                runner_index: run_matches.get_one::<usize>("runner-index").copied(),
                html: run_matches.get_one::<PathBuf>("html").cloned(),
                language: lang_explicit.then(|| language.to_string()),
            };
            let summary = commands::run::execute(args).await?;
            if summary.failed > 0 {
                anyhow::bail!(
                    "{}",
                    t!("run.matrix_failed", failed = summary.failed, total = summary.total)
                );
            }
        }
        Some(("plan", plan_matches)) => {
            commands::plan::execute(
                &path_arg(plan_matches, "config"),
                plan_matches.get_flag("json"),
            )?;
        }
        Some(("init", init_matches)) => {
            if !lang_explicit {
                println!(
                    "🌐 {}",
                    t!("system_language_detected", locale = language, lang = language)
                );
            }
            commands::init::execute(
                &path_arg(init_matches, "output"),
                init_matches.get_flag("force"),
                init_matches.get_flag("non-interactive"),
                language,
            )?;
        }
        Some(("artifacts", artifacts_matches)) => match artifacts_matches.subcommand() {
            Some(("list", list_matches)) => {
                commands::artifacts::list(&path_arg(list_matches, "store"))?;
            }
            Some(("download", download_matches)) => {
                let name = download_matches
                    .get_one::<String>("name")
                    .map(String::as_str)
                    .unwrap_or_default();
                commands::artifacts::download(
                    &path_arg(download_matches, "store"),
                    name,
                    &path_arg(download_matches, "dest"),
                )?;
            }
            _ => {}
        },
        _ => {
            // `subcommand_required` makes clap print help and exit before we get here.
        }
    }
    Ok(())
}

/// Reads a path argument that always has a default value.
fn path_arg(matches: &ArgMatches, id: &str) -> PathBuf {
    matches.get_one::<PathBuf>(id).cloned().unwrap_or_default()
}
