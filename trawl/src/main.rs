use colored::Colorize;
use commands::command_argument_builder;
use trawl::handlers::{
    handle_batch, handle_domain, handle_init, handle_serve, handle_similar, handle_validate,
    handle_verify, init_tracing, load_config, print_banner,
};

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_tracing(chosen_command.get_flag("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let Some((name, primary_command)) = chosen_command.subcommand() else {
        // No subcommand provided, just show the banner
        return;
    };

    let result = match name {
        "init" => handle_init(primary_command),
        "validate" => handle_validate(primary_command),
        _ => {
            let config_path = chosen_command.get_one::<String>("config").map(String::as_str);
            match load_config(config_path) {
                Ok(config) => match name {
                    "verify" => handle_verify(primary_command, &config).await,
                    "domain" => handle_domain(primary_command, &config).await,
                    "batch" => handle_batch(primary_command, &config).await,
                    "similar" => handle_similar(primary_command, &config),
                    "serve" => handle_serve(primary_command, &config).await,
                    _ => unreachable!("clap should ensure we don't get here"),
                },
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
