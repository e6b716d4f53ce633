use clap::Parser;
use swrunner::cli::{self, Args};
use swrunner::logging::{self, LoggingConfig};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config_file = args.command.config_file();
    let base_dir = config_file.parent().map(|dir| dir.to_path_buf());
    let prints_output = args.command.prints_output();
    let _logging = match LoggingConfig::load(Some(&config_file))
        .and_then(|config| logging::init(&config, base_dir.as_deref(), prints_output))
    {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: logging disabled: {:#}", err);
            None
        }
    };

    if let Err(err) = cli::run(args).await {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}
