use anyhow::{Result, anyhow};
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command, command};

pub const CONFIG_OPTION: &str = "config";

const METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

pub fn cmd() -> Command {
    command!()
        .name("schoolhub")
        .about("Talk to the school-management platform from the terminal")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(CONFIG_OPTION)
                .long("config")
                .global(true)
                .help("Path to the configuration file"),
        )
        .subcommand(
            Command::new("login")
                .about("Log in and remember the session")
                .arg(
                    Arg::new("username")
                        .long("username")
                        .short('u')
                        .required(true),
                )
                .arg(
                    Arg::new("password")
                        .long("password")
                        .short('p')
                        .env("SCHOOLHUB_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                ),
        )
        .subcommand(Command::new("logout").about("Forget the current session"))
        .subcommand(Command::new("whoami").about("Show the logged-in user"))
        .subcommand(
            Command::new("api")
                .about("Call an API endpoint with the current session")
                .arg(
                    Arg::new("method")
                        .required(true)
                        .ignore_case(true)
                        .value_parser(PossibleValuesParser::new(METHODS)),
                )
                .arg(Arg::new("path").required(true))
                .arg(
                    Arg::new("data")
                        .long("data")
                        .short('d')
                        .help("JSON request body"),
                )
                .arg(
                    Arg::new("query")
                        .long("query")
                        .short('q')
                        .action(ArgAction::Append)
                        .help("Query parameter as key=value, repeatable"),
                ),
        )
}

pub fn parse_query(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow!(r#"query parameter "{pair}" is not key=value"#))
        })
        .collect()
}
