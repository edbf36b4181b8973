use age_plugin_op::{config::Config, identity_string, plugin};
use gumdrop::Options;
use log::error;
use std::process;

#[derive(Debug, Options)]
struct PluginOptions {
    #[options(help = "print help message")]
    help: bool,

    #[options(help = "print version info and exit", short = "V")]
    version: bool,

    #[options(help = "run the given age plugin state machine", no_short)]
    age_plugin: Option<String>,
}

fn main() {
    env_logger::builder().format_timestamp(None).init();

    let opts = PluginOptions::parse_args_default_or_exit();

    if opts.version {
        println!("age-plugin-op {}", env!("CARGO_PKG_VERSION"));
    } else if let Some(state_machine) = opts.age_plugin {
        if let Err(e) = plugin::run(&state_machine, Config::from_env()) {
            error!("{}", e);
            process::exit(1);
        }
    } else {
        // Nothing is generated: the identity only tells age to run this plugin.
        println!("{}", identity_string());
    }
}
