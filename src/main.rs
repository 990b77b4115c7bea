use secl::{cli, commands, utils};

#[tokio::main]
async fn main() {
    // Parse cli and handle clap errors
    let options = cli::parse_from_args();

    // Override the default log_level if there is a greater verbosity flag
    secl::init_logger(options.override_log_level);

    match commands::run(options.command).await {
        Ok(_) => std::process::exit(0),
        Err(e) => {
            utils::report_error(&e);
            std::process::exit(1);
        }
    }
}
